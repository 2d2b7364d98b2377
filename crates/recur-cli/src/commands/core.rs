//! Shared command utilities
//!
//! This module contains:
//! - `load_config` - Resolve configuration from --config or the default layers
//! - `run_detection` - Build a detector (optionally with AI collaborators) and run it

use std::path::Path;

use anyhow::{Context, Result};
use recur_core::{
    AIBackend, AIClient, AiSettings, CollaboratorAdapter, DetectionConfig, DetectionStats,
    MerchantNormalizer, PatternDetector, RecurConfig, RecurringPattern, Transaction,
};
use tracing::{info, warn};

/// Load the explicit config file, or the data-dir override / embedded defaults
pub fn load_config(path: Option<&Path>) -> Result<RecurConfig> {
    match path {
        Some(path) => RecurConfig::from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => RecurConfig::load().context("Failed to load config"),
    }
}

/// Detection thresholds with an optional --min-occurrences override applied
pub fn detection_config(
    config: &RecurConfig,
    min_occurrences: Option<usize>,
) -> Result<DetectionConfig> {
    match min_occurrences {
        Some(n) => config
            .detection
            .to_builder()
            .min_occurrences(n)
            .build()
            .context("Invalid --min-occurrences"),
        None => Ok(config.detection.clone()),
    }
}

/// Run detection with the configured aliases, consulting AI collaborators if enabled
pub fn run_detection(
    config: &RecurConfig,
    detection: &DetectionConfig,
    transactions: &[Transaction],
    use_ai: bool,
) -> Result<(Vec<RecurringPattern>, DetectionStats)> {
    let adapter = if use_ai { ai_adapter(&config.ai)? } else { None };

    let mut detector =
        PatternDetector::new().with_normalizer(MerchantNormalizer::with_aliases(&config.aliases));
    if let Some(adapter) = &adapter {
        detector = detector.with_resolver(adapter).with_confirmer(adapter);
    }

    detector
        .detect(transactions, detection)
        .context("Detection failed")
}

/// Adapter over the environment-configured backend, if one is set up and reachable
fn ai_adapter(settings: &AiSettings) -> Result<Option<CollaboratorAdapter<AIClient>>> {
    let Some(client) = AIClient::from_env() else {
        warn!("--ai given but no AI backend configured (set OLLAMA_HOST), using rules only");
        return Ok(None);
    };

    let adapter =
        CollaboratorAdapter::new(client, settings).context("Failed to start AI runtime")?;
    if !adapter.health_check() {
        warn!(
            host = adapter.backend().host(),
            "AI backend unreachable, using rules only"
        );
        return Ok(None);
    }

    info!(
        model = adapter.backend().model(),
        host = adapter.backend().host(),
        "AI collaborators enabled"
    );
    Ok(Some(adapter))
}
