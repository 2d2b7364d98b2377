//! Pluggable local AI backend abstraction
//!
//! Backends answer the two collaborator questions detection may ask: what
//! merchant a raw bank description belongs to, and whether a group of
//! inconsistent amounts is still one recurring bill. All backends run
//! locally (no cloud APIs).
//!
//! # Architecture
//!
//! - `AIBackend` trait: async interface every backend implements
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - `CollaboratorAdapter`: blocks on a backend so it can be handed to the
//!   synchronous detector as a resolver and/or confirmer
//!
//! # Usage
//!
//! ```rust,ignore
//! let client = AIClient::from_env().expect("AI backend configured");
//! let adapter = CollaboratorAdapter::new(client, &config.ai)?;
//! let detector = PatternDetector::new()
//!     .with_resolver(&adapter)
//!     .with_confirmer(&adapter);
//! ```
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_BACKEND`: Backend to use (ollama, mock). Default: ollama
//! - `OLLAMA_HOST`: Ollama server URL (required for ollama backend)
//! - `OLLAMA_MODEL`: Default model name (default: llama3.2)

mod adapter;
mod budget;
mod mock;
mod ollama;
pub mod parsing;
pub mod prompts;
pub mod types;

pub use adapter::CollaboratorAdapter;
pub use budget::CostBudget;
pub use mock::MockBackend;
pub use ollama::OllamaBackend;
pub use types::*;

use async_trait::async_trait;

use crate::collaborators::{AmountConfirmation, MerchantResolution};
use crate::error::Result;

/// Trait defining the interface for all AI backends
///
/// Backends should be Send + Sync so one instance can serve a whole run.
#[async_trait]
pub trait AIBackend: Send + Sync {
    /// Resolve a raw bank description to a canonical merchant
    async fn resolve_merchant(&self, raw_name: &str) -> Result<MerchantResolution>;

    /// Judge whether inconsistent amounts still form one recurring bill
    ///
    /// `amounts` are magnitudes, oldest first. `observed_date_pattern` is a
    /// short description of the detected cadence and gaps.
    async fn confirm_recurring(
        &self,
        merchant: &str,
        amounts: &[f64],
        observed_date_pattern: &str,
    ) -> Result<AmountConfirmation>;

    /// Check if the backend is available
    async fn health_check(&self) -> bool;

    /// Get the model name being used
    fn model(&self) -> &str;

    /// Get the host URL
    fn host(&self) -> &str;
}

/// Concrete AI client wrapper
#[derive(Clone)]
pub enum AIClient {
    Ollama(OllamaBackend),
    Mock(MockBackend),
}

impl AIClient {
    /// Create an AI client from environment variables
    ///
    /// Returns None if the selected backend is not configured.
    pub fn from_env() -> Option<Self> {
        let backend = std::env::var("AI_BACKEND").unwrap_or_else(|_| "ollama".to_string());

        match backend.to_lowercase().as_str() {
            "ollama" => OllamaBackend::from_env().map(AIClient::Ollama),
            "mock" => Some(AIClient::Mock(MockBackend::new())),
            _ => {
                tracing::warn!(backend = %backend, "Unknown AI_BACKEND, falling back to ollama");
                OllamaBackend::from_env().map(AIClient::Ollama)
            }
        }
    }

    /// Create an Ollama client directly
    pub fn ollama(host: &str, model: &str) -> Self {
        AIClient::Ollama(OllamaBackend::new(host, model))
    }

    /// Create a mock client for testing
    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }

    /// Create a new client with a different model
    pub fn with_model(&self, model: &str) -> Self {
        match self {
            AIClient::Ollama(b) => AIClient::Ollama(b.with_model(model)),
            AIClient::Mock(b) => AIClient::Mock(b.with_model(model)),
        }
    }
}

// Implement AIBackend for AIClient by delegating to the inner backend
#[async_trait]
impl AIBackend for AIClient {
    async fn resolve_merchant(&self, raw_name: &str) -> Result<MerchantResolution> {
        match self {
            AIClient::Ollama(b) => b.resolve_merchant(raw_name).await,
            AIClient::Mock(b) => b.resolve_merchant(raw_name).await,
        }
    }

    async fn confirm_recurring(
        &self,
        merchant: &str,
        amounts: &[f64],
        observed_date_pattern: &str,
    ) -> Result<AmountConfirmation> {
        match self {
            AIClient::Ollama(b) => {
                b.confirm_recurring(merchant, amounts, observed_date_pattern)
                    .await
            }
            AIClient::Mock(b) => {
                b.confirm_recurring(merchant, amounts, observed_date_pattern)
                    .await
            }
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::Ollama(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::Ollama(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::Ollama(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}
