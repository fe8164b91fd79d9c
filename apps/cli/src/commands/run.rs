//! `refine run`: curate, fine-tune and emit config for one function.

use super::types::RunArgs;
use super::{create_provider, print_fragments, progress_sink};
use crate::config::CliConfig;
use anyhow::{Context, Result};
use colored::Colorize;
use refine_providers::ClickHouseStore;
use refine_training::{RecipeSpec, ResolvedRecipe, SplitReport, DEFAULT_BASE_MODEL};
use std::time::Duration;

pub async fn execute(args: RunArgs, settings: &CliConfig) -> Result<()> {
    let json_output = args.provider.json;

    let mut spec = RecipeSpec::new(
        args.recipe.config.clone(),
        args.recipe.function.clone(),
        args.metric.clone(),
        args.recipe.variant.clone(),
    );
    spec.float_threshold = args.threshold;
    spec.val_fraction = args.val_fraction;
    spec.max_samples = args.max_samples;
    spec.seed = args.seed;
    spec.poll_interval = Duration::from_secs(args.provider.poll_interval);
    spec.base_model = args
        .model
        .clone()
        .or_else(|| settings.base_model.clone())
        .unwrap_or_else(|| DEFAULT_BASE_MODEL.to_string());

    // Everything local is checked before the store or provider is contacted.
    let recipe = ResolvedRecipe::resolve(spec).context("Failed to resolve recipe")?;

    let dsn = args
        .clickhouse_url
        .clone()
        .or_else(|| settings.clickhouse_url.clone())
        .context("No ClickHouse URL configured. Set CLICKHOUSE_URL or pass --clickhouse-url")?;
    let store = ClickHouseStore::from_dsn(&dsn).context("Invalid ClickHouse URL")?;

    if args.dry_run {
        let output_dir = args.output_dir.context("--dry-run requires --output-dir")?;
        let report = recipe.dry_run(&store, &output_dir).await.context("Dry run failed")?;

        if json_output {
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }

        print_split(&report.split);
        println!("  Train:      {}", report.train_path.display().to_string().dimmed());
        println!("  Validation: {}", report.validation_path.display().to_string().dimmed());
        println!();
        return Ok(());
    }

    let provider = create_provider(&args.provider, settings)?;
    let sink = progress_sink(json_output);
    let report = recipe.run(&store, provider.as_ref(), sink.as_ref()).await.context("Fine-tuning run failed")?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_split(&report.split);
    println!("{}", "Fine-tuning complete".bold().green());
    println!("  Job:   {}", report.outcome.job_id.cyan());
    println!("  Model: {}", report.outcome.fine_tuned_model.cyan());
    print_fragments(&report.outcome.fragments);
    Ok(())
}

fn print_split(split: &SplitReport) {
    println!();
    println!("{}", "Dataset".bold().cyan());
    println!("  Fetched:    {}", split.fetched);
    if split.dropped > 0 {
        println!("  Dropped:    {}", split.dropped.to_string().yellow());
    }
    println!("  Train:      {} examples ({} episodes)", split.train_examples, split.train_episodes);
    println!("  Validation: {} examples ({} episodes)", split.validation_examples, split.validation_episodes);
    println!("  Realized validation fraction: {:.3}", split.realized_validation_fraction);
    println!();
}
