//! Ollama backend implementation
//!
//! HTTP client for the Ollama `/api/generate` endpoint. Each collaborator
//! call is one non-streaming generate request with a JSON-only prompt.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::collaborators::{AmountConfirmation, MerchantResolution};
use crate::error::{Error, Result};

use super::parsing::{parse_amount_confirmation, parse_merchant_resolution};
use super::prompts::{merchant_prompt, recurring_prompt};
use super::AIBackend;

/// Ollama backend
#[derive(Clone)]
pub struct OllamaBackend {
    http_client: Client,
    base_url: String,
    model: String,
}

impl OllamaBackend {
    /// Create a new Ollama backend
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    /// Create a new instance with a different model
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            http_client: self.http_client.clone(),
            base_url: self.base_url.clone(),
            model: model.to_string(),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("OLLAMA_HOST").ok()?;
        let model = std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2".to_string());
        Some(Self::new(&host, &model))
    }

    async fn generate(&self, prompt: String) -> Result<String> {
        let request = OllamaRequest {
            model: self.model.clone(),
            prompt,
            stream: false,
        };

        let response = self
            .http_client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let ollama_response: OllamaResponse = response.json().await?;
        debug!(model = %self.model, "Ollama response: {}", ollama_response.response);
        Ok(ollama_response.response)
    }
}

/// Request to Ollama API
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
}

/// Response from Ollama API
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

#[async_trait]
impl AIBackend for OllamaBackend {
    async fn resolve_merchant(&self, raw_name: &str) -> Result<MerchantResolution> {
        let response = self.generate(merchant_prompt(raw_name)).await?;
        parse_merchant_resolution(&response)
    }

    async fn confirm_recurring(
        &self,
        merchant: &str,
        amounts: &[f64],
        observed_date_pattern: &str,
    ) -> Result<AmountConfirmation> {
        if amounts.is_empty() {
            return Err(Error::InvalidData(
                "confirmation needs at least one amount".into(),
            ));
        }
        let response = self
            .generate(recurring_prompt(merchant, amounts, observed_date_pattern))
            .await?;
        parse_amount_confirmation(&response)
    }

    async fn health_check(&self) -> bool {
        match self
            .http_client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}
