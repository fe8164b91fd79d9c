//! Refine Training
//!
//! Supervised fine-tuning from curated production inferences:
//! - Resolving a recipe against the gateway config (`ResolvedRecipe`)
//! - Fetching inferences whose latest feedback passes a metric threshold
//! - Rendering stored inputs and outputs into chat examples
//! - Splitting by episode, uploading, and polling the fine-tuning job
//! - Emitting config fragments for the resulting model

pub mod config;
pub mod content;
pub mod dataset;
pub mod emit;
pub mod error;
pub mod job;
pub mod jsonl;
pub mod pipeline;
pub mod poller;
pub mod progress;
pub mod query;
pub mod render;
pub mod split;
pub mod template;
pub mod upload;

pub use config::{
    FunctionDefinition, FunctionType, MetricDefinition, MetricLevel, MetricType, Optimize, RecipeConfig,
    VariantDefinition, VariantTemplates,
};
pub use dataset::{compute_dataset_id, ChatMessage, Dataset, DatasetId, Role, TrainingExample};
pub use emit::{config_fragments, model_fragment, variant_fragment, ConfigFragments, DEFAULT_PROVIDER_NAME};
pub use error::{TrainingError, TrainingResult};
pub use job::{RecipeSpec, DEFAULT_BASE_MODEL, DEFAULT_VAL_FRACTION};
pub use jsonl::{read_jsonl_dataset, write_jsonl_dataset};
pub use pipeline::{await_job, DryRunReport, JobOutcome, PreparedDataset, ResolvedRecipe, RunReport, SplitReport};
pub use poller::{JobPoller, DEFAULT_POLL_INTERVAL};
pub use progress::{ProgressEvent, ProgressSink, StdoutProgressSink, TracingProgressSink};
pub use query::{build_query, fetch_records, FetchParams, InferenceRecord};
pub use render::{DropReason, ExampleRenderer, RenderOutcome};
pub use split::{split_by_key, DatasetSplit, DEFAULT_SEED};
pub use template::{JinjaTemplates, TemplateRenderer, TemplateSources};
pub use upload::{submit_job, upload_examples};
