//! Optional collaborators consulted during detection
//!
//! Both traits are synchronous and `Send + Sync`. Implementations either run
//! locally ([`crate::normalize::MerchantNormalizer`]) or bridge to an async
//! model server ([`crate::ai::CollaboratorAdapter`]). Detection recovers from
//! every error these return.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Merchant types that mark a resolved merchant as generic activity
pub const GENERIC_MERCHANT_TYPES: &[&str] = &["atm", "transfer", "payment", "cash", "generic"];

/// A collaborator's answer for one raw merchant string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantResolution {
    pub canonical_name: String,
    /// Kind of merchant ("merchant", "atm", "transfer", ...)
    pub merchant_type: String,
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

impl MerchantResolution {
    pub fn is_generic(&self) -> bool {
        let kind = self.merchant_type.trim().to_lowercase();
        GENERIC_MERCHANT_TYPES.contains(&kind.as_str())
    }
}

/// A collaborator's verdict on a high-variance candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmountConfirmation {
    pub is_recurring: bool,
    /// Cadence the collaborator believes in ("monthly", ...), if any
    #[serde(default)]
    pub cadence: Option<String>,
    /// Expected amount bounds, as magnitudes
    #[serde(default)]
    pub expected_range: Option<[f64; 2]>,
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

/// Maps a raw merchant string to a canonical merchant
pub trait MerchantNameResolver: Send + Sync {
    fn resolve(&self, raw_name: &str) -> Result<MerchantResolution>;
}

/// Judges whether a merchant with widely varying amounts still recurs
pub trait VariableAmountConfirmer: Send + Sync {
    /// `amounts` are magnitudes in date order; `observed_date_pattern` is a
    /// short description such as "monthly, gaps 28-33 days"
    fn confirm(
        &self,
        merchant_name: &str,
        amounts: &[f64],
        observed_date_pattern: &str,
    ) -> Result<AmountConfirmation>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_merchant_types() {
        let mut resolution = MerchantResolution {
            canonical_name: "chase atm".to_string(),
            merchant_type: " ATM ".to_string(),
            confidence: 0.9,
            reasoning: String::new(),
        };
        assert!(resolution.is_generic());

        resolution.merchant_type = "streaming".to_string();
        assert!(!resolution.is_generic());
    }

    #[test]
    fn test_confirmation_optional_fields_default() {
        let parsed: AmountConfirmation =
            serde_json::from_str(r#"{"is_recurring": true, "confidence": 0.8}"#).unwrap();
        assert!(parsed.is_recurring);
        assert!(parsed.cadence.is_none());
        assert!(parsed.expected_range.is_none());
        assert_eq!(parsed.reasoning, "");
    }
}
