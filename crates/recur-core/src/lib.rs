//! Recur Core Library
//!
//! Recurring-transaction detection for personal finance data:
//! - Merchant name normalization and grouping
//! - Cadence and amount-consistency analysis
//! - Confidence scoring and false-positive filtering
//! - Monthly summaries with cancellation opportunities
//! - Optional local AI collaborators (Ollama) behind synchronous traits

pub mod ai;
pub mod amount;
pub mod cadence;
pub mod collaborators;
pub mod confidence;
pub mod config;
pub mod detect;
pub mod error;
pub mod filter;
pub mod group;
pub mod models;
pub mod normalize;
pub mod summary;

/// Test utilities including mock Ollama server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{AIBackend, AIClient, CollaboratorAdapter, CostBudget, MockBackend, OllamaBackend};
pub use collaborators::{
    AmountConfirmation, MerchantNameResolver, MerchantResolution, VariableAmountConfirmer,
};
pub use config::{AiSettings, DetectionConfig, RecurConfig, SummaryConfig};
pub use detect::{detect, PatternDetector};
pub use error::{Error, Result};
pub use models::{
    AmountRange, Cadence, CancellationOpportunity, DetectionStats, Direction, OpportunityReason,
    PatternAmount, PatternType, RecurringItem, RecurringPattern, RecurringSummary, Transaction,
};
pub use normalize::MerchantNormalizer;
pub use summary::{summarize, SummaryAggregator};
