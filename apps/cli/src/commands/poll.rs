//! `refine poll`: wait for an existing job and emit config for its model.

use super::types::PollArgs;
use super::{create_provider, print_fragments, progress_sink};
use crate::config::CliConfig;
use anyhow::{Context, Result};
use colored::Colorize;
use refine_training::{await_job, JobPoller, RecipeConfig};
use std::time::Duration;

pub async fn execute(args: PollArgs, settings: &CliConfig) -> Result<()> {
    let config = RecipeConfig::load(&args.recipe.config).context("Failed to load config")?;
    let variant = config.variant(&args.recipe.function, &args.recipe.variant)?;

    let provider = create_provider(&args.provider, settings)?;
    let sink = progress_sink(args.provider.json);
    let poller = JobPoller::new(Duration::from_secs(args.provider.poll_interval));

    let outcome = await_job(
        provider.as_ref(),
        &args.job_id,
        &args.recipe.function,
        &variant.templates,
        &poller,
        sink.as_ref(),
    )
    .await?;

    if args.provider.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!();
    println!("{}", "Fine-tuning complete".bold().green());
    println!("  Model: {}", outcome.fine_tuned_model.cyan());
    print_fragments(&outcome.fragments);
    Ok(())
}
