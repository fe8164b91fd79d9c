//! Recipe configuration: the metric, function and variant definitions a run
//! is built from.
//!
//! The file is the gateway's TOML config. Only `metrics.<name>` and
//! `functions.<name>` are read; every other section is ignored. Type strings are
//! kept raw at parse time and resolved when an entry is selected, so unrelated
//! entries with types this tool does not handle never cause a failure.

use crate::error::{TrainingError, TrainingResult};
use crate::template::TemplateSources;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionType {
    Chat,
    Json,
}

impl FunctionType {
    #[must_use]
    pub const fn inference_table_name(self) -> &'static str {
        match self {
            Self::Chat => "ChatInference",
            Self::Json => "JsonInference",
        }
    }
}

impl FromStr for FunctionType {
    type Err = TrainingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(Self::Chat),
            "json" => Ok(Self::Json),
            other => Err(TrainingError::InvalidConfig(format!("Unsupported function type: {other}"))),
        }
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Chat => "chat",
            Self::Json => "json",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Float,
    Boolean,
}

impl MetricType {
    #[must_use]
    pub const fn feedback_table_name(self) -> &'static str {
        match self {
            Self::Float => "FloatMetricFeedback",
            Self::Boolean => "BooleanMetricFeedback",
        }
    }
}

impl FromStr for MetricType {
    type Err = TrainingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "float" => Ok(Self::Float),
            "boolean" => Ok(Self::Boolean),
            other => Err(TrainingError::InvalidConfig(format!("Unsupported metric type: {other}"))),
        }
    }
}

/// Whether feedback targets single inferences or whole episodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricLevel {
    Inference,
    Episode,
}

impl MetricLevel {
    /// Column of the inference table that feedback `target_id` refers to.
    #[must_use]
    pub const fn join_key(self) -> &'static str {
        match self {
            Self::Inference => "id",
            Self::Episode => "episode_id",
        }
    }
}

impl FromStr for MetricLevel {
    type Err = TrainingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inference" => Ok(Self::Inference),
            "episode" => Ok(Self::Episode),
            other => Err(TrainingError::InvalidConfig(format!("Unsupported metric level: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Optimize {
    Max,
    Min,
}

impl Optimize {
    #[must_use]
    pub const fn comparator(self) -> &'static str {
        match self {
            Self::Max => ">=",
            Self::Min => "<=",
        }
    }
}

impl FromStr for Optimize {
    type Err = TrainingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "max" => Ok(Self::Max),
            "min" => Ok(Self::Min),
            other => Err(TrainingError::InvalidConfig(format!("Unsupported metric optimize direction: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDefinition {
    pub name: String,
    pub metric_type: MetricType,
    pub level: MetricLevel,
    pub optimize: Optimize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDefinition {
    pub name: String,
    pub function_type: FunctionType,
}

/// Template references of a variant, exactly as written in the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantTemplates {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_template: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantDefinition {
    pub name: String,
    pub templates: VariantTemplates,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawMetric {
    #[serde(rename = "type")]
    kind: Option<String>,
    level: Option<String>,
    optimize: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawFunction {
    #[serde(rename = "type")]
    kind: Option<String>,
    variants: Option<BTreeMap<String, VariantTemplates>>,
}

/// The parts of the gateway config a recipe reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipeConfig {
    metrics: Option<BTreeMap<String, RawMetric>>,
    functions: Option<BTreeMap<String, RawFunction>>,
    /// Directory template paths are resolved against.
    #[serde(skip)]
    base_dir: PathBuf,
}

impl RecipeConfig {
    /// Load the config file at `path`.
    pub fn load(path: &Path) -> TrainingResult<Self> {
        if !path.is_file() {
            return Err(TrainingError::InvalidConfig(format!("{} is not a file", path.display())));
        }

        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(config)
    }

    /// Parse config text; template paths resolve against the current directory.
    pub fn from_toml_str(content: &str) -> TrainingResult<Self> {
        Ok(toml::from_str(content)?)
    }

    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn metric(&self, name: &str) -> TrainingResult<MetricDefinition> {
        let metrics = self
            .metrics
            .as_ref()
            .ok_or_else(|| TrainingError::InvalidConfig("No `[metrics]` section found in config".to_string()))?;
        let raw = metrics
            .get(name)
            .ok_or_else(|| TrainingError::InvalidConfig(format!("No metric named `{name}` found in config")))?;

        let field = |value: &Option<String>, field: &str| {
            value
                .clone()
                .ok_or_else(|| TrainingError::InvalidConfig(format!("Metric `{name}` is missing the `{field}` field")))
        };

        Ok(MetricDefinition {
            name: name.to_string(),
            metric_type: field(&raw.kind, "type")?.parse()?,
            level: field(&raw.level, "level")?.parse()?,
            optimize: field(&raw.optimize, "optimize")?.parse()?,
        })
    }

    fn raw_function(&self, name: &str) -> TrainingResult<&RawFunction> {
        self.functions
            .as_ref()
            .ok_or_else(|| TrainingError::InvalidConfig("No `[functions]` section found in config".to_string()))?
            .get(name)
            .ok_or_else(|| TrainingError::InvalidConfig(format!("No function named `{name}` found in config")))
    }

    pub fn function(&self, name: &str) -> TrainingResult<FunctionDefinition> {
        let raw = self.raw_function(name)?;
        let kind = raw
            .kind
            .as_deref()
            .ok_or_else(|| TrainingError::InvalidConfig(format!("Function `{name}` is missing the `type` field")))?;

        Ok(FunctionDefinition { name: name.to_string(), function_type: kind.parse()? })
    }

    pub fn variant(&self, function_name: &str, variant_name: &str) -> TrainingResult<VariantDefinition> {
        let variants = self.raw_function(function_name)?.variants.as_ref().ok_or_else(|| {
            TrainingError::InvalidConfig(format!("No variants section found for function `{function_name}`"))
        })?;
        let templates = variants.get(variant_name).ok_or_else(|| {
            TrainingError::InvalidConfig(format!(
                "No variant named `{variant_name}` found in function `{function_name}`"
            ))
        })?;

        Ok(VariantDefinition { name: variant_name.to_string(), templates: templates.clone() })
    }

    /// Read the template files a variant references.
    pub fn load_templates(&self, variant: &VariantDefinition) -> TrainingResult<TemplateSources> {
        let read = |role: &str, reference: &Option<String>| -> TrainingResult<Option<String>> {
            let Some(reference) = reference else {
                return Ok(None);
            };
            let path = self.base_dir.join(reference);
            std::fs::read_to_string(&path).map(Some).map_err(|e| {
                TrainingError::InvalidConfig(format!("failed to read {role} template {}: {e}", path.display()))
            })
        };

        Ok(TemplateSources {
            system: read("system", &variant.templates.system_template)?,
            user: read("user", &variant.templates.user_template)?,
            assistant: read("assistant", &variant.templates.assistant_template)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
[gateway]
observability.enabled = true

[models.gpt_4o_mini]
routing = ["openai"]

[metrics.exact_match]
type = "boolean"
level = "inference"
optimize = "max"

[metrics.jaccard]
type = "float"
level = "episode"
optimize = "min"

[metrics.odd]
type = "comment"
level = "inference"
optimize = "max"

[functions.extract_entities]
type = "json"
output_schema = "functions/extract_entities/output_schema.json"

[functions.extract_entities.variants.gpt_4o_mini]
type = "chat_completion"
model = "gpt_4o_mini"
system_template = "templates/system.minijinja"

[functions.tool_use]
type = "chat"

[functions.weird]
type = "streaming"
"#;

    #[test]
    fn test_metric_resolution() {
        let config = RecipeConfig::from_toml_str(CONFIG).unwrap();
        let metric = config.metric("exact_match").unwrap();
        assert_eq!(metric.metric_type, MetricType::Boolean);
        assert_eq!(metric.level.join_key(), "id");
        assert_eq!(metric.optimize.comparator(), ">=");

        let metric = config.metric("jaccard").unwrap();
        assert_eq!(metric.metric_type.feedback_table_name(), "FloatMetricFeedback");
        assert_eq!(metric.level.join_key(), "episode_id");
        assert_eq!(metric.optimize.comparator(), "<=");
    }

    #[test]
    fn test_unsupported_entries_only_fail_when_selected() {
        let config = RecipeConfig::from_toml_str(CONFIG).unwrap();
        let err = config.metric("odd").unwrap_err();
        assert!(err.to_string().contains("Unsupported metric type: comment"));

        let err = config.function("weird").unwrap_err();
        assert!(err.to_string().contains("Unsupported function type: streaming"));

        assert_eq!(config.function("tool_use").unwrap().function_type, FunctionType::Chat);
    }

    #[test]
    fn test_missing_entries_are_descriptive() {
        let config = RecipeConfig::from_toml_str(CONFIG).unwrap();
        assert!(config.metric("nope").unwrap_err().to_string().contains("No metric named `nope`"));
        assert!(config.function("nope").unwrap_err().to_string().contains("No function named `nope`"));
        assert!(config
            .variant("tool_use", "v")
            .unwrap_err()
            .to_string()
            .contains("No variants section found for function `tool_use`"));
        assert!(config
            .variant("extract_entities", "v")
            .unwrap_err()
            .to_string()
            .contains("No variant named `v`"));

        let empty = RecipeConfig::from_toml_str("").unwrap();
        assert!(empty.metric("x").unwrap_err().to_string().contains("No `[metrics]` section"));
        assert!(empty.function("x").unwrap_err().to_string().contains("No `[functions]` section"));
    }

    #[test]
    fn test_metric_missing_optimize() {
        let config = RecipeConfig::from_toml_str("[metrics.m]\ntype = \"float\"\nlevel = \"episode\"\n").unwrap();
        let err = config.metric("m").unwrap_err();
        assert!(err.to_string().contains("missing the `optimize` field"));
    }

    #[test]
    fn test_load_templates_relative_to_config_dir() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("templates")).unwrap();
        std::fs::write(temp.path().join("templates/system.minijinja"), "You extract entities.").unwrap();
        let config_path = temp.path().join("tensorzero.toml");
        std::fs::write(&config_path, CONFIG).unwrap();

        let config = RecipeConfig::load(&config_path).unwrap();
        let variant = config.variant("extract_entities", "gpt_4o_mini").unwrap();
        assert_eq!(variant.templates.system_template.as_deref(), Some("templates/system.minijinja"));

        let sources = config.load_templates(&variant).unwrap();
        assert_eq!(sources.system.as_deref(), Some("You extract entities."));
        assert!(sources.user.is_none());
        assert!(sources.assistant.is_none());
    }

    #[test]
    fn test_missing_template_file_is_config_error() {
        let config = RecipeConfig::from_toml_str(CONFIG).unwrap();
        let variant = config.variant("extract_entities", "gpt_4o_mini").unwrap();
        assert!(matches!(config.load_templates(&variant), Err(TrainingError::InvalidConfig(_))));
    }

    #[test]
    fn test_load_rejects_directory() {
        let temp = TempDir::new().unwrap();
        assert!(RecipeConfig::load(temp.path()).is_err());
    }
}
