//! Service clients for Refine.
//!
//! This crate provides concrete implementations of the `ObservabilityStore`
//! and `FineTuningProvider` traits.
//!
//! # Supported Services
//!
//! - **ClickHouse**: inference and feedback store, over the HTTP interface
//! - **OpenAI**: file uploads and supervised fine-tuning jobs (API key required)
//! - **Mock**: scripted in-memory store and provider for testing

pub mod clickhouse;
pub mod factory;
pub mod mock;
pub mod openai;

pub use clickhouse::ClickHouseStore;
pub use factory::{ProviderConfig, ProviderFactory, ProviderType};
pub use mock::{MemoryStore, MockFineTuningProvider, RecordedUpload};
pub use openai::OpenAIFineTuning;
