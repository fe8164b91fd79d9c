//! Config fragments registering a fine-tuned model and a variant that uses it.

use crate::config::VariantTemplates;
use crate::error::TrainingResult;
use serde::Serialize;
use std::collections::BTreeMap;

/// Provider used when no fine-tuning client is at hand, as for `refine emit`.
pub const DEFAULT_PROVIDER_NAME: &str = "openai";

#[derive(Debug, Serialize)]
struct ModelsFragment<'a> {
    models: BTreeMap<&'a str, ModelEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct ModelEntry<'a> {
    routing: Vec<&'a str>,
    providers: BTreeMap<&'a str, ProviderEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct ProviderEntry<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    model_name: &'a str,
}

#[derive(Debug, Serialize)]
struct FunctionsFragment<'a> {
    functions: BTreeMap<&'a str, FunctionEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct FunctionEntry<'a> {
    variants: BTreeMap<&'a str, VariantEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct VariantEntry<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    weight: u32,
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_template: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_template: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assistant_template: Option<&'a str>,
}

/// The two fragments printed after a successful job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigFragments {
    pub model: String,
    pub variant: String,
}

/// `[models.<id>]` routed to the single provider `provider` serving `fine_tuned_model`.
pub fn model_fragment(provider: &str, fine_tuned_model: &str) -> TrainingResult<String> {
    let fragment = ModelsFragment {
        models: BTreeMap::from([(
            fine_tuned_model,
            ModelEntry {
                routing: vec![provider],
                providers: BTreeMap::from([(
                    provider,
                    ProviderEntry { kind: provider, model_name: fine_tuned_model },
                )]),
            },
        )]),
    };
    Ok(toml::to_string(&fragment)?)
}

/// `[functions.<fn>.variants.<id>]`, disabled (weight 0), reusing `templates`.
pub fn variant_fragment(
    function_name: &str,
    fine_tuned_model: &str,
    templates: &VariantTemplates,
) -> TrainingResult<String> {
    let variant = VariantEntry {
        kind: "chat_completion",
        weight: 0,
        model: fine_tuned_model,
        system_template: templates.system_template.as_deref(),
        user_template: templates.user_template.as_deref(),
        assistant_template: templates.assistant_template.as_deref(),
    };
    let fragment = FunctionsFragment {
        functions: BTreeMap::from([(
            function_name,
            FunctionEntry { variants: BTreeMap::from([(fine_tuned_model, variant)]) },
        )]),
    };
    Ok(toml::to_string(&fragment)?)
}

pub fn config_fragments(
    provider: &str,
    function_name: &str,
    fine_tuned_model: &str,
    templates: &VariantTemplates,
) -> TrainingResult<ConfigFragments> {
    Ok(ConfigFragments {
        model: model_fragment(provider, fine_tuned_model)?,
        variant: variant_fragment(function_name, fine_tuned_model, templates)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = "ft:gpt-4o-mini-2024-07-18:acme::9x8y7z";

    #[test]
    fn test_model_fragment_routes_to_single_provider() {
        let text = model_fragment(DEFAULT_PROVIDER_NAME, MODEL).unwrap();
        let doc: toml::Value = toml::from_str(&text).unwrap();
        let model = &doc["models"][MODEL];
        assert_eq!(model["routing"].as_array().unwrap().len(), 1);
        assert_eq!(model["routing"][0].as_str(), Some("openai"));
        assert_eq!(model["providers"]["openai"]["type"].as_str(), Some("openai"));
        assert_eq!(model["providers"]["openai"]["model_name"].as_str(), Some(MODEL));
    }

    #[test]
    fn test_model_fragment_uses_given_provider() {
        let text = model_fragment("azure", MODEL).unwrap();
        let doc: toml::Value = toml::from_str(&text).unwrap();
        let model = &doc["models"][MODEL];
        assert_eq!(model["routing"][0].as_str(), Some("azure"));
        assert_eq!(model["providers"]["azure"]["type"].as_str(), Some("azure"));
        assert!(model["providers"].get("openai").is_none());
    }

    #[test]
    fn test_variant_fragment_reuses_template_references() {
        let templates = VariantTemplates {
            system_template: Some("functions/extract_entities/system.minijinja".to_string()),
            user_template: None,
            assistant_template: Some("functions/extract_entities/assistant.minijinja".to_string()),
        };
        let text = variant_fragment("extract_entities", MODEL, &templates).unwrap();
        let doc: toml::Value = toml::from_str(&text).unwrap();
        let variant = &doc["functions"]["extract_entities"]["variants"][MODEL];

        assert_eq!(variant["type"].as_str(), Some("chat_completion"));
        assert_eq!(variant["weight"].as_integer(), Some(0));
        assert_eq!(variant["model"].as_str(), Some(MODEL));
        assert_eq!(variant["system_template"].as_str(), Some("functions/extract_entities/system.minijinja"));
        assert!(variant.get("user_template").is_none());
        assert_eq!(
            variant["assistant_template"].as_str(),
            Some("functions/extract_entities/assistant.minijinja")
        );
    }

    #[test]
    fn test_variant_without_templates() {
        let text = variant_fragment("chat", MODEL, &VariantTemplates::default()).unwrap();
        let doc: toml::Value = toml::from_str(&text).unwrap();
        let variant = doc["functions"]["chat"]["variants"][MODEL].as_table().unwrap();
        assert_eq!(variant.len(), 3);
    }
}
