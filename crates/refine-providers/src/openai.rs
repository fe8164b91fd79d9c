//! OpenAI fine-tuning client.
//!
//! This module provides an implementation of the `FineTuningProvider` trait
//! for OpenAI's files and fine-tuning endpoints.

use async_trait::async_trait;
use refine_abstraction::{
    ClientError, FilePurpose, FineTuningJob, FineTuningJobRequest, FineTuningProvider, UploadedFile,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::env;
use tracing::{debug, error};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI fine-tuning client.
#[derive(Debug, Clone)]
pub struct OpenAIFineTuning {
    /// The API key for authentication.
    api_key: String,
    /// The base URL for the OpenAI API.
    base_url: String,
    /// HTTP client for making requests.
    client: Client,
}

impl OpenAIFineTuning {
    /// Creates a new client using `OPENAI_API_KEY` (and `OPENAI_BASE_URL` if set).
    ///
    /// # Errors
    /// Returns a `ClientError` if the API key is not found in environment variables.
    #[allow(clippy::disallowed_methods)] // env::var is needed for API key loading
    pub fn new() -> Result<Self, ClientError> {
        let api_key = env::var("OPENAI_API_KEY").map_err(|_| {
            ClientError::MissingCredential("OPENAI_API_KEY environment variable not set".to_string())
        })?;
        let base_url = env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Ok(Self::with_api_key(api_key).with_base_url(base_url))
    }

    /// Creates a new client with an explicit API key.
    #[must_use]
    pub fn with_api_key(api_key: String) -> Self {
        Self { api_key, base_url: DEFAULT_BASE_URL.to_string(), client: Client::new() }
    }

    /// Points the client at a different API root (proxies, tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn parse<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, error = %error_text, what, "OpenAI API returned error status");
            return Err(ClientError::ResponseError(format!("API error ({status}): {error_text}")));
        }

        response.json::<T>().await.map_err(|e| {
            error!(error = %e, what, "Failed to parse OpenAI API response");
            ClientError::SerializationError(format!("Failed to parse {what} response: {e}"))
        })
    }
}

fn network_error(e: &reqwest::Error) -> ClientError {
    error!(error = %e, "Failed to send request to OpenAI API");
    ClientError::RequestError(format!("Network error: {e}"))
}

#[async_trait]
impl FineTuningProvider for OpenAIFineTuning {
    async fn upload_file(
        &self,
        filename: &str,
        contents: Vec<u8>,
        purpose: FilePurpose,
    ) -> Result<UploadedFile, ClientError> {
        debug!(filename, bytes = contents.len(), purpose = purpose.as_str(), "Uploading file to OpenAI");

        let part = Part::bytes(contents)
            .file_name(filename.to_string())
            .mime_str("application/jsonl")
            .map_err(|e| ClientError::RequestError(format!("Invalid upload part: {e}")))?;
        let form = Form::new().text("purpose", purpose.as_str()).part("file", part);

        let response = self
            .client
            .post(format!("{}/files", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| network_error(&e))?;

        Self::parse(response, "file upload").await
    }

    async fn create_job(&self, request: &FineTuningJobRequest) -> Result<FineTuningJob, ClientError> {
        debug!(
            model = %request.model,
            training_file = %request.training_file,
            validation_file = ?request.validation_file,
            "Creating OpenAI fine-tuning job"
        );

        let response = self
            .client
            .post(format!("{}/fine_tuning/jobs", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| network_error(&e))?;

        Self::parse(response, "job creation").await
    }

    async fn retrieve_job(&self, job_id: &str) -> Result<FineTuningJob, ClientError> {
        let response = self
            .client
            .get(format!("{}/fine_tuning/jobs/{job_id}", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| network_error(&e))?;

        Self::parse(response, "job status").await
    }

    fn provider_id(&self) -> &str {
        "openai"
    }
}
