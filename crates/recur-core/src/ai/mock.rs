//! Mock backend for testing
//!
//! Deterministic answers for both collaborator calls, with optional failure
//! injection. Useful for unit tests and development without a model server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::collaborators::{AmountConfirmation, MerchantResolution};
use crate::error::{Error, Result};

use super::AIBackend;

/// Mock AI backend for testing
#[derive(Clone, Default)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    /// Fail every call with a collaborator error
    pub failing: bool,
    calls: Arc<AtomicUsize>,
}

impl MockBackend {
    /// Create a new mock backend (healthy by default)
    pub fn new() -> Self {
        Self {
            healthy: true,
            failing: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create an unhealthy mock backend
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::new()
        }
    }

    /// Create a backend whose calls all fail
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new()
        }
    }

    /// Create a new instance with a different model (no-op for mock)
    pub fn with_model(&self, _model: &str) -> Self {
        self.clone()
    }

    /// Number of resolve/confirm calls made so far (shared across clones)
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn begin_call(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            Err(Error::Collaborator("mock backend failure".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn resolve_merchant(&self, raw_name: &str) -> Result<MerchantResolution> {
        self.begin_call()?;

        let m = raw_name.to_uppercase();
        let (name, kind, confidence) = if m.contains("NETFLIX") {
            ("Netflix", "merchant", 0.98)
        } else if m.contains("SPOTIFY") {
            ("Spotify", "merchant", 0.98)
        } else if m.contains("BLUE BOTTLE") {
            ("Blue Bottle Coffee", "merchant", 0.9)
        } else if m.contains("ATM") {
            ("ATM", "atm", 0.95)
        } else if m.contains("XFER") || m.contains("TRANSFER") {
            ("Transfer", "transfer", 0.9)
        } else {
            (raw_name, "merchant", 0.4)
        };

        Ok(MerchantResolution {
            canonical_name: name.to_string(),
            merchant_type: kind.to_string(),
            confidence,
            reasoning: "mock resolution".to_string(),
        })
    }

    async fn confirm_recurring(
        &self,
        merchant: &str,
        amounts: &[f64],
        _observed_date_pattern: &str,
    ) -> Result<AmountConfirmation> {
        self.begin_call()?;

        let m = merchant.to_lowercase();
        let is_utility = ["water", "electric", "power", "gas", "energy"]
            .iter()
            .any(|k| m.contains(k));
        let min = amounts.iter().copied().fold(f64::INFINITY, f64::min);
        let max = amounts.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Ok(AmountConfirmation {
            is_recurring: is_utility,
            cadence: is_utility.then(|| "monthly".to_string()),
            expected_range: (is_utility && min.is_finite()).then_some([min, max]),
            confidence: if is_utility { 0.85 } else { 0.6 },
            reasoning: if is_utility {
                "usage-based utility bill".to_string()
            } else {
                "amounts look like discretionary spending".to_string()
            },
        })
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_resolve_merchant() {
        let mock = MockBackend::new();
        let result = mock.resolve_merchant("NETFLIX.COM").await.unwrap();
        assert_eq!(result.canonical_name, "Netflix");
        assert!(result.confidence > 0.9);

        let unknown = mock.resolve_merchant("CORNER SHOP").await.unwrap();
        assert!(unknown.confidence < 0.8);
    }

    #[tokio::test]
    async fn test_mock_confirm_recurring() {
        let mock = MockBackend::new();
        let water = mock
            .confirm_recurring("city water", &[20.0, 75.0], "monthly")
            .await
            .unwrap();
        assert!(water.is_recurring);
        assert_eq!(water.expected_range, Some([20.0, 75.0]));

        let shop = mock
            .confirm_recurring("corner shop", &[20.0, 75.0], "monthly")
            .await
            .unwrap();
        assert!(!shop.is_recurring);
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn test_mock_failure_injection() {
        let mock = MockBackend::failing();
        let err = mock.resolve_merchant("NETFLIX").await.unwrap_err();
        assert!(matches!(err, Error::Collaborator(_)));
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_health_check() {
        let healthy = MockBackend::new();
        assert!(healthy.health_check().await);

        let unhealthy = MockBackend::unhealthy();
        assert!(!unhealthy.health_check().await);
    }
}
