//! Model answer types
//!
//! These mirror the JSON the prompts ask for. They are converted into the
//! collaborator types once parsed and validated.

use serde::{Deserialize, Serialize};

use crate::collaborators::{AmountConfirmation, MerchantResolution};

/// Answer to the merchant resolution prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantAnswer {
    /// Canonical merchant name (e.g., "Netflix" from "NETFLIX.COM*1234")
    pub merchant: String,
    /// Merchant kind ("merchant", "atm", "transfer", "payment", ...)
    #[serde(default = "default_merchant_type")]
    pub merchant_type: String,
    pub confidence: f64,
    #[serde(default)]
    pub reason: String,
}

fn default_merchant_type() -> String {
    "merchant".to_string()
}

impl From<MerchantAnswer> for MerchantResolution {
    fn from(answer: MerchantAnswer) -> Self {
        Self {
            canonical_name: answer.merchant,
            merchant_type: answer.merchant_type,
            confidence: answer.confidence,
            reasoning: answer.reason,
        }
    }
}

/// Answer to the variable-amount confirmation prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringAnswer {
    pub is_recurring: bool,
    #[serde(default)]
    pub cadence: Option<String>,
    /// Expected [min, max] charge
    #[serde(default)]
    pub expected_range: Option<[f64; 2]>,
    pub confidence: f64,
    #[serde(default)]
    pub reason: String,
}

impl From<RecurringAnswer> for AmountConfirmation {
    fn from(answer: RecurringAnswer) -> Self {
        Self {
            is_recurring: answer.is_recurring,
            cadence: answer.cadence,
            expected_range: answer.expected_range,
            confidence: answer.confidence,
            reasoning: answer.reason,
        }
    }
}
