//! Command implementations for the Refine CLI.

pub mod emit;
pub mod poll;
pub mod run;
pub mod types;

pub use types::{EmitArgs, PollArgs, ProviderArgs, RecipeArgs, RunArgs};

use crate::config::CliConfig;
use anyhow::{Context, Result, anyhow};
use colored::Colorize;
use refine_abstraction::FineTuningProvider;
use refine_providers::{ProviderConfig, ProviderFactory, ProviderType};
use refine_training::{ConfigFragments, ProgressSink, StdoutProgressSink, TracingProgressSink};
use std::sync::Arc;

/// Build the fine-tuning client from flags, environment and settings.
pub fn create_provider(args: &ProviderArgs, settings: &CliConfig) -> Result<Arc<dyn FineTuningProvider>> {
    let name = args.provider.as_deref().or(settings.provider.as_deref()).unwrap_or("openai");
    let provider_type: ProviderType =
        name.parse().map_err(|()| anyhow!("Unknown provider: {name}. Supported: openai, mock"))?;

    let mut config = ProviderConfig::new(provider_type);
    if let Some(base_url) = args.openai_base_url.clone().or_else(|| settings.openai_base_url.clone()) {
        config = config.with_base_url(base_url);
    }

    ProviderFactory::create(config).context("Failed to create fine-tuning provider")
}

/// Human progress goes to stdout; with `--json` it goes to the log so stdout
/// carries only the final document.
pub fn progress_sink(json: bool) -> Box<dyn ProgressSink> {
    if json { Box::new(TracingProgressSink) } else { Box::new(StdoutProgressSink) }
}

pub fn print_fragments(fragments: &ConfigFragments) {
    println!();
    println!("{}", "Add the fine-tuned model to your config:".bold().cyan());
    println!();
    println!("{}", fragments.model);
    println!("{}", "Then add a variant that uses it (disabled until you give it weight):".bold().cyan());
    println!();
    println!("{}", fragments.variant);
}
