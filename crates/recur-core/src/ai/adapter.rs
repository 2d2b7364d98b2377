//! Synchronous collaborator adapter over an async backend
//!
//! Detection is synchronous, so the adapter owns a private current-thread
//! runtime and blocks on each model call. Every call is budget-checked first
//! and bounded by a timeout; all failures come back as ordinary errors.

use std::future::Future;
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};
use tracing::{debug, warn};

use crate::collaborators::{
    AmountConfirmation, MerchantNameResolver, MerchantResolution, VariableAmountConfirmer,
};
use crate::config::AiSettings;
use crate::error::{Error, Result};

use super::budget::CostBudget;
use super::AIBackend;

/// Bridges an [`AIBackend`] to the synchronous collaborator traits.
///
/// Must not be used from inside another tokio runtime.
pub struct CollaboratorAdapter<B: AIBackend> {
    backend: B,
    runtime: Runtime,
    timeout: Duration,
    budget: CostBudget,
}

impl<B: AIBackend> CollaboratorAdapter<B> {
    pub fn new(backend: B, settings: &AiSettings) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self {
            backend,
            runtime,
            timeout: settings.timeout,
            budget: CostBudget::from_settings(settings),
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn budget(&self) -> &CostBudget {
        &self.budget
    }

    /// Check that the backend is reachable
    pub fn health_check(&self) -> bool {
        self.runtime
            .block_on(tokio::time::timeout(self.timeout, self.backend.health_check()))
            .unwrap_or(false)
    }

    fn call<T, F>(&self, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.budget.check_and_charge()?;

        let result = self
            .runtime
            .block_on(tokio::time::timeout(self.timeout, fut))
            .map_err(|_| Error::Timeout(self.timeout))
            .and_then(|inner| inner);

        match &result {
            Ok(_) => debug!(call = what, model = self.backend.model(), "AI call succeeded"),
            Err(e) => warn!(call = what, model = self.backend.model(), "AI call failed: {}", e),
        }
        result
    }
}

impl<B: AIBackend> MerchantNameResolver for CollaboratorAdapter<B> {
    fn resolve(&self, raw_name: &str) -> Result<MerchantResolution> {
        self.call("resolve_merchant", self.backend.resolve_merchant(raw_name))
    }
}

impl<B: AIBackend> VariableAmountConfirmer for CollaboratorAdapter<B> {
    fn confirm(
        &self,
        merchant: &str,
        amounts: &[f64],
        observed_date_pattern: &str,
    ) -> Result<AmountConfirmation> {
        self.call(
            "confirm_recurring",
            self.backend
                .confirm_recurring(merchant, amounts, observed_date_pattern),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockBackend;
    use async_trait::async_trait;

    fn settings() -> AiSettings {
        AiSettings {
            timeout: Duration::from_millis(500),
            cost_per_call: 0.01,
            daily_budget: 1.0,
            monthly_budget: 5.0,
        }
    }

    /// Backend that never answers within the adapter timeout
    struct SlowBackend;

    #[async_trait]
    impl AIBackend for SlowBackend {
        async fn resolve_merchant(&self, _raw_name: &str) -> Result<MerchantResolution> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Err(Error::Collaborator("unreachable".into()))
        }

        async fn confirm_recurring(
            &self,
            _merchant: &str,
            _amounts: &[f64],
            _observed_date_pattern: &str,
        ) -> Result<AmountConfirmation> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Err(Error::Collaborator("unreachable".into()))
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn model(&self) -> &str {
            "slow"
        }

        fn host(&self) -> &str {
            "slow://localhost"
        }
    }

    #[test]
    fn test_adapter_resolves_through_backend() {
        let adapter = CollaboratorAdapter::new(MockBackend::new(), &settings()).unwrap();
        let resolution = adapter.resolve("NETFLIX.COM*88").unwrap();
        assert_eq!(resolution.canonical_name, "Netflix");

        let confirmation = adapter
            .confirm("city water", &[12.0, 48.0], "monthly, gaps 30-31 days")
            .unwrap();
        assert!(confirmation.is_recurring);
        assert!(adapter.health_check());
    }

    #[test]
    fn test_adapter_times_out() {
        let mut cfg = settings();
        cfg.timeout = Duration::from_millis(20);
        let adapter = CollaboratorAdapter::new(SlowBackend, &cfg).unwrap();

        let err = adapter.resolve("ANYTHING").unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[test]
    fn test_adapter_refuses_over_budget() {
        let mut cfg = settings();
        cfg.cost_per_call = 0.6;
        let backend = MockBackend::new();
        let adapter = CollaboratorAdapter::new(backend.clone(), &cfg).unwrap();

        assert!(adapter.resolve("NETFLIX").is_ok());
        let err = adapter.resolve("NETFLIX").unwrap_err();
        assert!(matches!(err, Error::BudgetExceeded(_)));
        // Refused calls never reach the backend
        assert_eq!(backend.calls(), 1);
    }

    #[test]
    fn test_adapter_surfaces_backend_errors() {
        let adapter = CollaboratorAdapter::new(MockBackend::failing(), &settings()).unwrap();
        assert!(matches!(
            adapter.confirm("city water", &[1.0], "monthly"),
            Err(Error::Collaborator(_))
        ));
    }
}
