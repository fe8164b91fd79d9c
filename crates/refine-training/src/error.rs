use refine_abstraction::{ClientError, JobStatus};
use thiserror::Error;

pub type TrainingResult<T> = std::result::Result<T, TrainingError>;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("provider error: {0}")]
    Provider(#[from] ClientError),

    #[error("fine-tuning job {job_id} ended with status {status}")]
    JobNotSucceeded { job_id: String, status: JobStatus },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    TomlParse(#[from] toml::de::Error),

    #[error(transparent)]
    TomlWrite(#[from] toml::ser::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
