//! Provider factory for creating fine-tuning clients from configuration.
//!
//! This module provides functionality to create provider instances based on configuration,
//! handling API key loading from environment variables.

use crate::{MockFineTuningProvider, OpenAIFineTuning};
use refine_abstraction::{ClientError, FineTuningProvider};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Provider type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    /// Scripted provider that succeeds immediately.
    Mock,
    /// OpenAI fine-tuning API.
    OpenAI,
}

impl FromStr for ProviderType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "openai" => Ok(Self::OpenAI),
            _ => Err(()),
        }
    }
}

/// Provider configuration.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// The type of provider to create.
    pub provider_type: ProviderType,
    /// Optional API key (if not provided, will be loaded from environment).
    pub api_key: Option<String>,
    /// Optional API root override.
    pub base_url: Option<String>,
}

impl ProviderConfig {
    #[must_use]
    pub fn new(provider_type: ProviderType) -> Self {
        Self { provider_type, api_key: None, base_url: None }
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.api_key = Some(api_key);
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }
}

/// Factory for creating provider instances.
pub struct ProviderFactory;

impl ProviderFactory {
    /// Creates a provider instance from the given configuration.
    ///
    /// # Errors
    /// Returns a `ClientError` if provider creation fails (e.g., missing API key).
    pub fn create(config: ProviderConfig) -> Result<Arc<dyn FineTuningProvider>, ClientError> {
        debug!(provider_type = ?config.provider_type, "Creating fine-tuning provider");

        match config.provider_type {
            ProviderType::Mock => Ok(Arc::new(MockFineTuningProvider::default())),
            ProviderType::OpenAI => {
                let client = match config.api_key {
                    Some(api_key) => OpenAIFineTuning::with_api_key(api_key),
                    None => OpenAIFineTuning::new()?,
                };
                let client = match config.base_url {
                    Some(base_url) => client.with_base_url(base_url),
                    None => client,
                };
                Ok(Arc::new(client))
            }
        }
    }
}
