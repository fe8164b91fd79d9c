//! Role-keyed prompt templates.

use crate::dataset::Role;
use crate::error::{TrainingError, TrainingResult};
use minijinja::{AutoEscape, Environment};
use serde::{Deserialize, Serialize};

/// Raw template sources for each role a variant may template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSources {
    pub system: Option<String>,
    pub user: Option<String>,
    pub assistant: Option<String>,
}

/// Renders structured arguments into literal text for a role.
pub trait TemplateRenderer: Send + Sync {
    fn has_template(&self, role: Role) -> bool;

    fn render(&self, role: Role, args: &serde_json::Value) -> TrainingResult<String>;
}

/// Jinja-backed renderer. Templates are compiled once at construction.
#[derive(Debug)]
pub struct JinjaTemplates {
    env: Environment<'static>,
}

impl JinjaTemplates {
    pub fn new(sources: &TemplateSources) -> TrainingResult<Self> {
        let mut env = Environment::new();
        // Prompts are plain text; escaping would corrupt them.
        env.set_auto_escape_callback(|_| AutoEscape::None);

        for (role, source) in [
            (Role::System, &sources.system),
            (Role::User, &sources.user),
            (Role::Assistant, &sources.assistant),
        ] {
            if let Some(source) = source {
                env.add_template_owned(role.as_str(), source.clone()).map_err(|e| {
                    TrainingError::Template(format!("failed to compile {} template: {e}", role.as_str()))
                })?;
            }
        }

        Ok(Self { env })
    }
}

impl TemplateRenderer for JinjaTemplates {
    fn has_template(&self, role: Role) -> bool {
        self.env.get_template(role.as_str()).is_ok()
    }

    fn render(&self, role: Role, args: &serde_json::Value) -> TrainingResult<String> {
        let template = self.env.get_template(role.as_str()).map_err(|_| {
            TrainingError::Template(format!(
                "structured {} content requires a {} template",
                role.as_str(),
                role.as_str()
            ))
        })?;

        template
            .render(args)
            .map_err(|e| TrainingError::Template(format!("failed to render {} template: {e}", role.as_str())))
    }
}
