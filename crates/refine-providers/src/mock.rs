//! Scripted in-memory stand-ins for the external services.
//!
//! Used by tests and by `--provider mock` runs that exercise the pipeline
//! without creating a real job.

use async_trait::async_trait;
use refine_abstraction::{
    ClientError, FilePurpose, FineTuningJob, FineTuningJobRequest, FineTuningProvider, JobStatus,
    ObservabilityStore, ParameterizedQuery, QueryValue, UploadedFile,
};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::debug;

/// An upload captured by [`MockFineTuningProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpload {
    pub filename: String,
    pub contents: Vec<u8>,
    pub purpose: FilePurpose,
}

/// A fine-tuning provider that replays a scripted sequence of status results.
///
/// Each `retrieve_job` call consumes one script entry; once the script is
/// exhausted the job reports `succeeded`.
#[derive(Debug)]
pub struct MockFineTuningProvider {
    fine_tuned_model: String,
    provider_id: String,
    script: Mutex<VecDeque<Result<JobStatus, ClientError>>>,
    uploads: Mutex<Vec<RecordedUpload>>,
    jobs: Mutex<Vec<FineTuningJobRequest>>,
    retrievals: Mutex<usize>,
    fail_uploads: bool,
}

impl Default for MockFineTuningProvider {
    fn default() -> Self {
        Self::new("ft:mock-model:refine::0001", Vec::new())
    }
}

impl MockFineTuningProvider {
    #[must_use]
    pub fn new(fine_tuned_model: &str, script: Vec<Result<JobStatus, ClientError>>) -> Self {
        Self {
            fine_tuned_model: fine_tuned_model.to_string(),
            provider_id: "openai".to_string(),
            script: Mutex::new(script.into()),
            uploads: Mutex::new(Vec::new()),
            jobs: Mutex::new(Vec::new()),
            retrievals: Mutex::new(0),
            fail_uploads: false,
        }
    }

    /// Reports `provider_id` instead of `openai`.
    #[must_use]
    pub fn with_provider_id(mut self, provider_id: &str) -> Self {
        self.provider_id = provider_id.to_string();
        self
    }

    /// Makes every upload fail with a response error.
    #[must_use]
    pub fn failing_uploads(mut self) -> Self {
        self.fail_uploads = true;
        self
    }

    #[must_use]
    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().map(|u| u.clone()).unwrap_or_default()
    }

    #[must_use]
    pub fn job_requests(&self) -> Vec<FineTuningJobRequest> {
        self.jobs.lock().map(|j| j.clone()).unwrap_or_default()
    }

    #[must_use]
    pub fn retrieval_count(&self) -> usize {
        self.retrievals.lock().map(|r| *r).unwrap_or_default()
    }

    fn job(&self, job_id: &str, status: JobStatus) -> FineTuningJob {
        let request = self.jobs.lock().ok().and_then(|j| j.last().cloned());
        FineTuningJob {
            id: job_id.to_string(),
            status,
            model: request.as_ref().map(|r| r.model.clone()),
            fine_tuned_model: (status == JobStatus::Succeeded).then(|| self.fine_tuned_model.clone()),
            training_file: request.as_ref().map(|r| r.training_file.clone()),
            validation_file: request.and_then(|r| r.validation_file),
            trained_tokens: None,
            error: None,
        }
    }
}

#[async_trait]
impl FineTuningProvider for MockFineTuningProvider {
    async fn upload_file(
        &self,
        filename: &str,
        contents: Vec<u8>,
        purpose: FilePurpose,
    ) -> Result<UploadedFile, ClientError> {
        if self.fail_uploads {
            return Err(ClientError::ResponseError("API error (500): upload rejected".to_string()));
        }

        let mut uploads = self.uploads.lock().map_err(|e| ClientError::Other(e.to_string()))?;
        let bytes = contents.len() as u64;
        uploads.push(RecordedUpload { filename: filename.to_string(), contents, purpose });
        debug!(filename, bytes, "MockFineTuningProvider accepted upload");

        Ok(UploadedFile { id: format!("file-mock-{}", uploads.len()), filename: filename.to_string(), bytes })
    }

    async fn create_job(&self, request: &FineTuningJobRequest) -> Result<FineTuningJob, ClientError> {
        let mut jobs = self.jobs.lock().map_err(|e| ClientError::Other(e.to_string()))?;
        jobs.push(request.clone());
        let id = format!("ftjob-mock-{}", jobs.len());
        drop(jobs);
        Ok(self.job(&id, JobStatus::ValidatingFiles))
    }

    async fn retrieve_job(&self, job_id: &str) -> Result<FineTuningJob, ClientError> {
        if let Ok(mut count) = self.retrievals.lock() {
            *count += 1;
        }

        let next = self
            .script
            .lock()
            .map_err(|e| ClientError::Other(e.to_string()))?
            .pop_front()
            .unwrap_or(Ok(JobStatus::Succeeded));

        next.map(|status| self.job(job_id, status))
    }

    fn provider_id(&self) -> &str {
        &self.provider_id
    }
}

/// An observability store that serves a fixed set of rows.
///
/// Honors a bound `max_samples` parameter the way `LIMIT` would and records
/// every query it receives.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Vec<serde_json::Value>,
    queries: Mutex<Vec<ParameterizedQuery>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(rows: Vec<serde_json::Value>) -> Self {
        Self { rows, queries: Mutex::new(Vec::new()) }
    }

    #[must_use]
    pub fn queries(&self) -> Vec<ParameterizedQuery> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ObservabilityStore for MemoryStore {
    async fn query(&self, query: &ParameterizedQuery) -> Result<Vec<serde_json::Value>, ClientError> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.clone());
        }

        let limit = match query.params.get("max_samples") {
            Some(QueryValue::UInt(n)) => usize::try_from(*n).unwrap_or(usize::MAX),
            _ => usize::MAX,
        };
        Ok(self.rows.iter().take(limit).cloned().collect())
    }
}
