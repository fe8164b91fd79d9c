//! Client abstraction layer for Refine.
//!
//! This module defines the traits and types for talking to the two external
//! services a fine-tuning run depends on: the observability store that holds
//! historical inferences and feedback, and the provider that hosts
//! fine-tuning jobs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Represents an error that can occur when talking to an external service.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientError {
    /// An error occurred while sending the request (e.g., network issues).
    #[error("Request Error: {0}")]
    RequestError(String),

    /// The service answered with an error status or an unusable body.
    #[error("Response Error: {0}")]
    ResponseError(String),

    /// An error occurred during serialization or deserialization.
    #[error("Serialization Error: {0}")]
    SerializationError(String),

    /// A credential or connection setting is missing or malformed.
    #[error("Missing Credential: {0}")]
    MissingCredential(String),

    /// Other unexpected errors.
    #[error("Other Client Error: {0}")]
    Other(String),
}

/// A named parameter value bound into a store query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    String(String),
    Float(f64),
    UInt(u64),
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Float(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
        }
    }
}

/// A query string plus the named parameters it references.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParameterizedQuery {
    /// The query text with placeholders for every parameter.
    pub sql: String,
    /// Parameter values keyed by placeholder name.
    pub params: BTreeMap<String, QueryValue>,
}

impl ParameterizedQuery {
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into(), params: BTreeMap::new() }
    }

    #[must_use]
    pub fn bind(mut self, name: &str, value: QueryValue) -> Self {
        self.params.insert(name.to_string(), value);
        self
    }
}

/// A read-only store of inference and feedback records.
#[async_trait]
pub trait ObservabilityStore: Send + Sync {
    /// Runs the query and returns each result row as a JSON object.
    ///
    /// # Errors
    /// Returns a `ClientError` if the store cannot be reached or rejects the query.
    async fn query(&self, query: &ParameterizedQuery) -> Result<Vec<serde_json::Value>, ClientError>;
}

/// Purpose tag attached to an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilePurpose {
    #[serde(rename = "fine-tune")]
    FineTune,
}

impl FilePurpose {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FineTune => "fine-tune",
        }
    }
}

/// A file accepted by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Opaque provider identifier.
    pub id: String,
    /// Name the file was uploaded under.
    #[serde(default)]
    pub filename: String,
    /// Size reported by the provider.
    #[serde(default)]
    pub bytes: u64,
}

/// Request body for creating a fine-tuning job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FineTuningJobRequest {
    /// Base model to fine-tune.
    pub model: String,
    /// File id of the training split.
    pub training_file: String,
    /// File id of the validation split, if there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_file: Option<String>,
}

/// Lifecycle state of a fine-tuning job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    ValidatingFiles,
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    /// Whether the provider will never move the job out of this state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ValidatingFiles => "validating_files",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Error details the provider attaches to a failed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// A snapshot of a fine-tuning job as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FineTuningJob {
    pub id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub model: Option<String>,
    /// Identifier of the resulting model, present once the job has succeeded.
    #[serde(default)]
    pub fine_tuned_model: Option<String>,
    #[serde(default)]
    pub training_file: Option<String>,
    #[serde(default)]
    pub validation_file: Option<String>,
    #[serde(default)]
    pub trained_tokens: Option<u64>,
    #[serde(default)]
    pub error: Option<JobFailure>,
}

/// A provider that hosts supervised fine-tuning jobs.
///
/// Implementations must be `Send + Sync` so they can be shared behind an `Arc`.
#[async_trait]
pub trait FineTuningProvider: Send + Sync {
    /// Uploads `contents` under `filename` and returns the provider's file handle.
    ///
    /// # Errors
    /// Returns a `ClientError` if the upload is rejected or the request fails.
    async fn upload_file(
        &self,
        filename: &str,
        contents: Vec<u8>,
        purpose: FilePurpose,
    ) -> Result<UploadedFile, ClientError>;

    /// Creates a fine-tuning job referencing previously uploaded files.
    ///
    /// # Errors
    /// Returns a `ClientError` if job creation fails.
    async fn create_job(&self, request: &FineTuningJobRequest) -> Result<FineTuningJob, ClientError>;

    /// Fetches the current state of a job.
    ///
    /// # Errors
    /// Returns a `ClientError` if the status call fails.
    async fn retrieve_job(&self, job_id: &str) -> Result<FineTuningJob, ClientError>;

    /// Gateway provider type serving this provider's fine-tuned models (e.g., "openai").
    ///
    /// Used as the routing key and provider type of the emitted model config.
    fn provider_id(&self) -> &str;
}
