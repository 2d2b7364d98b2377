//! Test utilities for recur-core
//!
//! This module provides testing infrastructure including a mock Ollama server
//! that can be used for development and integration tests.

use axum::{
    extract::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::sync::oneshot;

use crate::ai::prompts::{MERCHANT_MARKER, RECURRING_MARKER};

/// Mock Ollama server for testing and development
pub struct MockOllamaServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockOllamaServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        let app = Router::new()
            .route("/api/tags", get(handle_tags))
            .route("/api/generate", post(handle_generate));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockOllamaServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Ollama tags endpoint response (health check)
async fn handle_tags() -> Json<TagsResponse> {
    Json(TagsResponse {
        models: vec![ModelInfo {
            name: "llama3.2:latest".to_string(),
            modified_at: "2024-01-01T00:00:00Z".to_string(),
            size: 4_000_000_000,
        }],
    })
}

/// Ollama generate endpoint
async fn handle_generate(Json(request): Json<GenerateRequest>) -> Json<GenerateResponse> {
    // Route on the marker line each prompt starts with
    let response = if request.prompt.contains(RECURRING_MARKER) {
        confirm_recurring_mock(&request.prompt)
    } else if request.prompt.contains(MERCHANT_MARKER) {
        resolve_merchant_mock(&request.prompt)
    } else {
        "I can only answer recur prompts.".to_string()
    };

    Json(GenerateResponse {
        model: request.model,
        response,
        done: true,
    })
}

/// Mock merchant resolution
fn resolve_merchant_mock(prompt: &str) -> String {
    let raw = quoted_after(prompt, MERCHANT_MARKER).unwrap_or_default();
    let m = raw.to_uppercase();

    if m.contains("GARBLED") {
        return "Sorry, I could not read that description.".to_string();
    }

    let (merchant, kind, confidence, reason) = if m.contains("NETFLIX") {
        ("Netflix", "merchant", 0.97, "streaming service")
    } else if m.contains("SPOTIFY") {
        ("Spotify", "merchant", 0.97, "music streaming")
    } else if m.contains("BLUE BOTTLE") {
        ("Blue Bottle Coffee", "merchant", 0.9, "coffee roaster")
    } else if m.contains("ATM") {
        ("ATM Withdrawal", "atm", 0.95, "cash withdrawal")
    } else if m.contains("XFER") || m.contains("TRANSFER") {
        ("Transfer", "transfer", 0.9, "account transfer")
    } else {
        return format!(
            r#"Best guess: {{"merchant": "{}", "merchant_type": "merchant", "confidence": 0.5, "reason": "unfamiliar description"}}"#,
            raw.trim()
        );
    };

    format!(
        r#"{{"merchant": "{}", "merchant_type": "{}", "confidence": {}, "reason": "{}"}}"#,
        merchant, kind, confidence, reason
    )
}

/// Mock variable-amount confirmation: utilities recur, everything else does not
fn confirm_recurring_mock(prompt: &str) -> String {
    let merchant = quoted_after(prompt, "Merchant: ").unwrap_or_default();
    let m = merchant.to_uppercase();

    let is_utility = ["WATER", "ELECTRIC", "POWER", "GAS", "ENERGY"]
        .iter()
        .any(|k| m.contains(k));

    if is_utility {
        let amounts = amounts_from_prompt(prompt);
        let min = amounts.iter().copied().fold(f64::INFINITY, f64::min);
        let max = amounts.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = if min.is_finite() {
            format!("[{:.2}, {:.2}]", min, max)
        } else {
            "null".to_string()
        };
        format!(
            r#"{{"is_recurring": true, "cadence": "monthly", "expected_range": {}, "confidence": 0.86, "reason": "usage-based utility bill"}}"#,
            range
        )
    } else {
        r#"{"is_recurring": false, "confidence": 0.8, "reason": "discretionary purchases"}"#
            .to_string()
    }
}

/// Text between the first pair of double quotes following `marker`
fn quoted_after(prompt: &str, marker: &str) -> Option<String> {
    let after = &prompt[prompt.find(marker)? + marker.len()..];
    let start = after.find('"')? + 1;
    let end = after[start..].find('"')? + start;
    Some(after[start..end].to_string())
}

fn amounts_from_prompt(prompt: &str) -> Vec<f64> {
    let Some(line) = prompt.lines().find(|l| l.starts_with("Amounts")) else {
        return Vec::new();
    };
    let (Some(start), Some(end)) = (line.find('['), line.find(']')) else {
        return Vec::new();
    };
    line[start + 1..end]
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect()
}

// Request/Response types for the mock server

#[derive(Debug, Serialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Serialize)]
struct ModelInfo {
    name: String,
    modified_at: String,
    size: u64,
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    #[allow(dead_code)]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct GenerateResponse {
    model: String,
    response: String,
    done: bool,
}
