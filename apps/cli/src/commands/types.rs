//! Command type definitions shared between main.rs and the command modules.

use clap::Args;
use std::path::PathBuf;

/// Which function and variant of a gateway config to work with.
#[derive(Args, Debug, Clone)]
pub struct RecipeArgs {
    /// Path to the gateway config file (tensorzero.toml)
    #[arg(short, long)]
    pub config: PathBuf,

    /// Function whose inferences are curated
    #[arg(short, long)]
    pub function: String,

    /// Variant whose templates render the examples
    #[arg(short, long)]
    pub variant: String,
}

#[derive(Args, Debug, Clone)]
pub struct ProviderArgs {
    /// Fine-tuning provider (openai, mock)
    #[arg(long)]
    pub provider: Option<String>,

    /// Fine-tuning API root
    #[arg(long, env = "OPENAI_BASE_URL")]
    pub openai_base_url: Option<String>,

    /// Seconds between job status checks
    #[arg(long, default_value_t = 10)]
    pub poll_interval: u64,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub recipe: RecipeArgs,

    /// Metric whose feedback selects the examples
    #[arg(short, long)]
    pub metric: String,

    /// Minimum (or maximum, for minimized metrics) value of a float metric
    #[arg(long, default_value_t = 0.5)]
    pub threshold: f64,

    /// Share of episodes held out for validation
    #[arg(long, default_value_t = 0.2)]
    pub val_fraction: f64,

    /// Maximum number of inferences to fetch
    #[arg(long, default_value_t = 100_000)]
    pub max_samples: u64,

    /// Base model to fine-tune
    #[arg(long)]
    pub model: Option<String>,

    /// Seed for the train/validation shuffle
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// ClickHouse DSN
    #[arg(long, env = "CLICKHOUSE_URL")]
    pub clickhouse_url: Option<String>,

    /// Render and split only, writing JSONL files instead of uploading
    #[arg(long, requires = "output_dir")]
    pub dry_run: bool,

    /// Directory for the dry-run JSONL files
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    #[command(flatten)]
    pub provider: ProviderArgs,
}

#[derive(Args, Debug, Clone)]
pub struct PollArgs {
    /// Fine-tuning job ID
    pub job_id: String,

    #[command(flatten)]
    pub recipe: RecipeArgs,

    #[command(flatten)]
    pub provider: ProviderArgs,
}

#[derive(Args, Debug, Clone)]
pub struct EmitArgs {
    /// Fine-tuned model ID
    pub model_id: String,

    #[command(flatten)]
    pub recipe: RecipeArgs,
}
