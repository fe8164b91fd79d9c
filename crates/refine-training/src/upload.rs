//! Uploading dataset splits and creating the fine-tuning job.

use crate::dataset::{compute_dataset_id, TrainingExample};
use crate::error::{TrainingError, TrainingResult};
use crate::jsonl::write_jsonl;
use refine_abstraction::{FilePurpose, FineTuningJob, FineTuningJobRequest, FineTuningProvider, UploadedFile};
use tracing::info;

/// Serialize `examples` to a temporary JSONL file and upload it.
///
/// The temporary file is removed when this returns, whether or not the upload
/// succeeded.
pub async fn upload_examples(
    provider: &dyn FineTuningProvider,
    label: &str,
    examples: &[TrainingExample],
) -> TrainingResult<UploadedFile> {
    let dataset_id = compute_dataset_id(examples)?;

    let mut file = tempfile::Builder::new().prefix(&format!("refine-{label}-")).suffix(".jsonl").tempfile()?;
    write_jsonl(file.as_file_mut(), examples)?;
    let contents = std::fs::read(file.path())?;

    info!(
        split = label,
        examples = examples.len(),
        bytes = contents.len(),
        dataset_id = %dataset_id,
        "Uploading dataset split"
    );

    let uploaded = provider.upload_file(&format!("{label}.jsonl"), contents, FilePurpose::FineTune).await?;
    file.close()?;

    info!(split = label, file_id = %uploaded.id, "Uploaded dataset split");
    Ok(uploaded)
}

/// Upload both splits and create a job fine-tuning `base_model` on them.
///
/// An empty validation split is not uploaded and the job is created without one.
pub async fn submit_job(
    provider: &dyn FineTuningProvider,
    base_model: &str,
    train: &[TrainingExample],
    validation: &[TrainingExample],
) -> TrainingResult<FineTuningJob> {
    if train.is_empty() {
        return Err(TrainingError::Dataset("training split is empty; nothing to fine-tune on".to_string()));
    }

    let training_file = upload_examples(provider, "train", train).await?;
    let validation_file = if validation.is_empty() {
        info!("Validation split is empty; creating job without a validation file");
        None
    } else {
        Some(upload_examples(provider, "validation", validation).await?)
    };

    let request = FineTuningJobRequest {
        model: base_model.to_string(),
        training_file: training_file.id,
        validation_file: validation_file.map(|f| f.id),
    };
    let job = provider.create_job(&request).await?;

    info!(job_id = %job.id, model = %request.model, status = %job.status, "Created fine-tuning job");
    Ok(job)
}
