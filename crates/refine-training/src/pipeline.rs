//! The recipe end to end: fetch, render, split, upload, poll, emit.

use crate::config::{FunctionDefinition, MetricDefinition, RecipeConfig, VariantDefinition, VariantTemplates};
use crate::dataset::{compute_dataset_id, TrainingExample};
use crate::emit::{config_fragments, ConfigFragments};
use crate::error::{TrainingError, TrainingResult};
use crate::job::RecipeSpec;
use crate::jsonl::write_jsonl_dataset;
use crate::poller::JobPoller;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::query::{build_query, fetch_records};
use crate::render::ExampleRenderer;
use crate::split::split_by_key;
use crate::template::JinjaTemplates;
use crate::upload::submit_job;
use refine_abstraction::{FineTuningProvider, JobStatus, ObservabilityStore, ParameterizedQuery};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Counts describing how fetched records turned into the two splits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitReport {
    pub fetched: usize,
    pub dropped: usize,
    pub train_examples: usize,
    pub validation_examples: usize,
    pub train_episodes: usize,
    pub validation_episodes: usize,
    pub realized_validation_fraction: f64,
}

#[derive(Debug, Clone)]
pub struct PreparedDataset {
    pub report: SplitReport,
    pub train: Vec<TrainingExample>,
    pub validation: Vec<TrainingExample>,
}

/// A finished, successful job and the fragments for its model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobOutcome {
    pub job_id: String,
    pub fine_tuned_model: String,
    pub fragments: ConfigFragments,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub split: SplitReport,
    #[serde(flatten)]
    pub outcome: JobOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DryRunReport {
    pub split: SplitReport,
    pub train_path: PathBuf,
    pub validation_path: PathBuf,
}

/// A recipe whose config, templates and parameters have all been checked.
///
/// Resolution reads only local files, so every configuration problem surfaces
/// before the store or the provider is contacted.
#[derive(Debug)]
pub struct ResolvedRecipe {
    pub spec: RecipeSpec,
    pub function: FunctionDefinition,
    pub metric: MetricDefinition,
    pub variant: VariantDefinition,
    templates: JinjaTemplates,
}

impl ResolvedRecipe {
    pub fn resolve(spec: RecipeSpec) -> TrainingResult<Self> {
        spec.validate()?;
        let config = RecipeConfig::load(&spec.config_path)?;
        Self::from_config(&config, spec)
    }

    pub fn from_config(config: &RecipeConfig, spec: RecipeSpec) -> TrainingResult<Self> {
        spec.validate()?;
        let metric = config.metric(&spec.metric_name)?;
        let function = config.function(&spec.function_name)?;
        let variant = config.variant(&spec.function_name, &spec.variant_name)?;
        let templates = JinjaTemplates::new(&config.load_templates(&variant)?)?;

        info!(
            function = %function.name,
            function_type = %function.function_type,
            metric = %metric.name,
            variant = %variant.name,
            "Resolved recipe"
        );
        Ok(Self { spec, function, metric, variant, templates })
    }

    #[must_use]
    pub fn query(&self) -> ParameterizedQuery {
        build_query(&self.function, &self.metric, &self.spec.fetch_params())
    }

    #[must_use]
    pub fn poller(&self) -> JobPoller {
        JobPoller::new(self.spec.poll_interval)
    }

    /// Fetch, render and split, without touching the provider.
    pub async fn prepare(&self, store: &dyn ObservabilityStore) -> TrainingResult<PreparedDataset> {
        let records = fetch_records(store, &self.query()).await?;
        let fetched = records.len();

        let renderer = ExampleRenderer::new(&self.templates, self.function.function_type);
        let (rendered, dropped) = renderer.render_records(&records);
        info!(fetched, rendered = rendered.len(), dropped, "Rendered examples");

        let split = split_by_key(
            rendered,
            |r| r.episode_id.as_str(),
            self.spec.val_fraction,
            self.spec.seed,
        )?;
        let report = SplitReport {
            fetched,
            dropped,
            train_examples: split.train.len(),
            validation_examples: split.validation.len(),
            train_episodes: split.train_keys.len(),
            validation_episodes: split.validation_keys.len(),
            realized_validation_fraction: split.realized_validation_fraction(),
        };
        info!(
            train = report.train_examples,
            validation = report.validation_examples,
            train_episodes = report.train_episodes,
            validation_episodes = report.validation_episodes,
            realized_validation_fraction = report.realized_validation_fraction,
            "Split dataset"
        );

        Ok(PreparedDataset {
            report,
            train: split.train.into_iter().map(|r| r.example).collect(),
            validation: split.validation.into_iter().map(|r| r.example).collect(),
        })
    }

    pub async fn run(
        &self,
        store: &dyn ObservabilityStore,
        provider: &dyn FineTuningProvider,
        sink: &dyn ProgressSink,
    ) -> TrainingResult<RunReport> {
        let prepared = self.prepare(store).await?;
        let job = submit_job(provider, &self.spec.base_model, &prepared.train, &prepared.validation).await?;
        sink.on_event(ProgressEvent::Submitted { job_id: job.id.clone() });

        let outcome = await_job(
            provider,
            &job.id,
            &self.function.name,
            &self.variant.templates,
            &self.poller(),
            sink,
        )
        .await?;
        Ok(RunReport { split: prepared.report, outcome })
    }

    /// Write `train.jsonl` and `validation.jsonl` into `output_dir` instead of uploading.
    pub async fn dry_run(&self, store: &dyn ObservabilityStore, output_dir: &Path) -> TrainingResult<DryRunReport> {
        let prepared = self.prepare(store).await?;
        std::fs::create_dir_all(output_dir)?;

        let train_path = output_dir.join("train.jsonl");
        let validation_path = output_dir.join("validation.jsonl");
        for (path, examples) in [(&train_path, &prepared.train), (&validation_path, &prepared.validation)] {
            write_jsonl_dataset(path, examples)?;
            info!(
                path = %path.display(),
                examples = examples.len(),
                dataset_id = %compute_dataset_id(examples)?,
                "Wrote dataset split"
            );
        }

        Ok(DryRunReport { split: prepared.report, train_path, validation_path })
    }
}

/// Poll `job_id` to completion and build the config fragments for its model.
///
/// A job that ends in any state but `succeeded` is an error.
pub async fn await_job(
    provider: &dyn FineTuningProvider,
    job_id: &str,
    function_name: &str,
    templates: &VariantTemplates,
    poller: &JobPoller,
    sink: &dyn ProgressSink,
) -> TrainingResult<JobOutcome> {
    let job = poller.poll_until_terminal(provider, job_id, sink).await;

    let fine_tuned_model = match (job.status, job.fine_tuned_model) {
        (JobStatus::Succeeded, Some(model)) => model,
        (status, _) => {
            if let Some(failure) = &job.error {
                info!(job_id, code = ?failure.code, message = ?failure.message, "Job reported an error");
            }
            return Err(TrainingError::JobNotSucceeded { job_id: job.id, status });
        }
    };

    let fragments = config_fragments(provider.provider_id(), function_name, &fine_tuned_model, templates)?;
    Ok(JobOutcome { job_id: job.id, fine_tuned_model, fragments })
}
