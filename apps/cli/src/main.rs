//! Refine CLI - supervised fine-tuning from curated production inferences
//!
//! This CLI provides a `refine` command that turns inferences with good
//! feedback into a fine-tuning dataset, runs the job, and prints the config
//! needed to try the resulting model.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{emit, poll, run, EmitArgs, PollArgs, RunArgs};

/// Refine - fine-tune models on your best production inferences
#[derive(Parser, Debug)]
#[command(
    name = "refine",
    author,
    version,
    about = "Refine - supervised fine-tuning from curated inferences",
    long_about = "Refine selects inferences whose latest feedback passes a metric threshold, renders them into chat examples with a variant's templates, fine-tunes a model on them, and prints the config fragments for the result."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Curate a dataset, fine-tune on it, and print config for the new model
    ///
    /// Fetches inferences of the function whose latest feedback for the metric
    /// passes the threshold, renders them with the variant's templates, splits
    /// them by episode, uploads both splits, and waits for the job.
    Run(RunArgs),

    /// Wait for an existing fine-tuning job and print config for its model
    Poll(PollArgs),

    /// Print config fragments for an already fine-tuned model
    Emit(EmitArgs),
}

fn parse_level(level: &str) -> Level {
    match level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Settings files are read before logging starts so they can set the level.
    let settings = config::CliConfig::discover_and_load()?;

    let level = parse_level(args.log_level.as_deref().or(settings.log_level.as_deref()).unwrap_or("info"));
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Run(run_args) => run::execute(run_args, &settings).await?,
        Command::Poll(poll_args) => poll::execute(poll_args, &settings).await?,
        Command::Emit(emit_args) => emit::execute(&emit_args)?,
    }

    Ok(())
}
