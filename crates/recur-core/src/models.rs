//! Domain models for recur

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A raw transaction as supplied by the upstream data source.
///
/// Sign convention: negative = expense, positive = income. Zero-amount rows
/// carry no direction and are ignored by detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    /// Merchant string exactly as reported by the data source
    pub merchant: String,
    /// Negative = expense, positive = income
    pub amount: f64,
    pub date: NaiveDate,
}

impl Transaction {
    pub fn new(
        id: impl Into<String>,
        merchant: impl Into<String>,
        amount: f64,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: id.into(),
            merchant: merchant.into(),
            amount,
            date,
        }
    }

    /// Flow direction, or None for zero amounts
    pub fn direction(&self) -> Option<Direction> {
        if self.amount < 0.0 {
            Some(Direction::Expense)
        } else if self.amount > 0.0 {
            Some(Direction::Income)
        } else {
            None
        }
    }
}

/// Whether money leaves (expense) or arrives (income)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Expense,
    Income,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Income => "income",
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "expense" | "debit" => Ok(Self::Expense),
            "income" | "credit" => Ok(Self::Income),
            _ => Err(format!("Unknown direction: {}", s)),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Inferred repeat period of a merchant's charges
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    Weekly,
    Biweekly,
    Monthly,
    Quarterly,
    Annual,
}

impl Cadence {
    /// All cadences, shortest period first
    pub const ALL: [Cadence; 5] = [
        Cadence::Weekly,
        Cadence::Biweekly,
        Cadence::Monthly,
        Cadence::Quarterly,
        Cadence::Annual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Biweekly => "biweekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Annual => "annual",
        }
    }

    /// Reference period in days used for bucket matching
    pub fn period_days(&self) -> f64 {
        match self {
            Self::Weekly => 7.0,
            Self::Biweekly => 14.0,
            Self::Monthly => 30.0,
            Self::Quarterly => 90.0,
            Self::Annual => 365.0,
        }
    }

    /// Quarterly and annual cadences produce few samples per observation window
    pub fn is_long(&self) -> bool {
        matches!(self, Self::Quarterly | Self::Annual)
    }

    /// Multiplier converting one charge at this cadence into a monthly figure
    pub fn monthly_factor(&self) -> f64 {
        match self {
            Self::Weekly => 52.0 / 12.0,
            Self::Biweekly => 26.0 / 12.0,
            Self::Monthly => 1.0,
            Self::Quarterly => 1.0 / 3.0,
            Self::Annual => 1.0 / 12.0,
        }
    }

    /// Adverb used in reasoning text ("charged $9.99 monthly")
    pub fn adverb(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Biweekly => "every two weeks",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Annual => "annually",
        }
    }

    /// Project one period past `date`.
    ///
    /// Month-based cadences use calendar arithmetic, so the 31st rolls back to
    /// the last day of shorter months.
    pub fn advance(&self, date: NaiveDate) -> NaiveDate {
        let next = match self {
            Self::Weekly => date.checked_add_days(Days::new(7)),
            Self::Biweekly => date.checked_add_days(Days::new(14)),
            Self::Monthly => date.checked_add_months(Months::new(1)),
            Self::Quarterly => date.checked_add_months(Months::new(3)),
            Self::Annual => date.checked_add_months(Months::new(12)),
        };
        next.unwrap_or(date)
    }
}

impl std::str::FromStr for Cadence {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "weekly" | "week" => Ok(Self::Weekly),
            "biweekly" | "bi-weekly" | "fortnightly" => Ok(Self::Biweekly),
            "monthly" | "month" => Ok(Self::Monthly),
            "quarterly" | "quarter" => Ok(Self::Quarterly),
            "annual" | "annually" | "yearly" | "year" => Ok(Self::Annual),
            _ => Err(format!("Unknown cadence: {}", s)),
        }
    }
}

impl std::fmt::Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Amount behavior of a recurring pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    /// Amount constant within tolerance
    Fixed,
    /// Amount fluctuates within a bounded range on a short cadence
    Variable,
    /// Quarterly/annual cadence with few occurrences
    Irregular,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Variable => "variable",
            Self::Irregular => "irregular",
        }
    }
}

impl std::str::FromStr for PatternType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "variable" => Ok(Self::Variable),
            "irregular" => Ok(Self::Irregular),
            _ => Err(format!("Unknown pattern type: {}", s)),
        }
    }
}

impl std::fmt::Display for PatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Observed (or collaborator-supplied) amount bounds, as magnitudes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmountRange {
    pub min: f64,
    pub max: f64,
}

impl AmountRange {
    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }
}

/// Either a single representative amount or a range, never both
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternAmount {
    Fixed { amount: f64 },
    Range { amount_range: AmountRange },
}

impl PatternAmount {
    /// Representative magnitude: the fixed amount, or the midpoint of the range
    pub fn representative(&self) -> f64 {
        match self {
            Self::Fixed { amount } => *amount,
            Self::Range { amount_range } => amount_range.midpoint(),
        }
    }
}

/// A detected recurring charge or income stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringPattern {
    /// Raw merchant string of the earliest occurrence
    pub merchant_name: String,
    /// Canonical merchant key
    pub normalized_merchant: String,
    pub direction: Direction,
    pub pattern_type: PatternType,
    pub cadence: Cadence,
    #[serde(flatten)]
    pub charge: PatternAmount,
    /// Coefficient of variation of the amounts (0 for fixed patterns)
    pub amount_variance_pct: f64,
    pub occurrence_count: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub next_expected_date: NaiveDate,
    /// RMS deviation, in days, of the cadence-normalized gaps from the period
    pub date_std_dev: f64,
    pub confidence: f64,
    pub reasoning: String,
}

impl RecurringPattern {
    /// Fixed amount, present only for fixed patterns
    pub fn amount(&self) -> Option<f64> {
        match self.charge {
            PatternAmount::Fixed { amount } => Some(amount),
            PatternAmount::Range { .. } => None,
        }
    }

    /// Amount range, present only for variable and irregular patterns
    pub fn amount_range(&self) -> Option<AmountRange> {
        match self.charge {
            PatternAmount::Fixed { .. } => None,
            PatternAmount::Range { amount_range } => Some(amount_range),
        }
    }

    pub fn is_expense(&self) -> bool {
        self.direction == Direction::Expense
    }
}

/// Counters describing a single detection run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionStats {
    pub total_transactions: usize,
    pub ignored_zero_amount: usize,
    pub total_groups_considered: usize,
    pub rejected_generic: usize,
    pub rejected_insufficient_occurrences: usize,
    pub rejected_irregular_dates: usize,
    pub rejected_irregular_amount: usize,
    pub patterns_detected: usize,
    pub resolver_calls: usize,
    pub resolver_accepted: usize,
    pub confirmer_calls: usize,
    pub confirmer_confirmed: usize,
    pub collaborator_failures: usize,
}

impl DetectionStats {
    pub fn total_rejected(&self) -> usize {
        self.rejected_generic
            + self.rejected_insufficient_occurrences
            + self.rejected_irregular_dates
            + self.rejected_irregular_amount
    }
}

/// One line of a recurring summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringItem {
    pub merchant_name: String,
    pub normalized_merchant: String,
    pub category: String,
    /// Representative magnitude (midpoint of range for non-fixed patterns)
    pub amount: f64,
    pub cadence: Cadence,
    pub monthly_cost: f64,
    /// Expense (true) vs income (false)
    pub is_subscription: bool,
    pub next_charge_date: NaiveDate,
    pub confidence: f64,
}

/// Why a subscription was suggested for cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityReason {
    /// Third or later subscription in one category
    DuplicateCategory,
    /// Cheaper of two subscriptions in a commonly-duplicated category
    PotentialDuplicate,
    /// Detection confidence below threshold
    LowConfidence,
}

impl OpportunityReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuplicateCategory => "duplicate_category",
            Self::PotentialDuplicate => "potential_duplicate",
            Self::LowConfidence => "low_confidence",
        }
    }
}

impl std::fmt::Display for OpportunityReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A subscription the user might cancel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancellationOpportunity {
    pub merchant_name: String,
    pub category: String,
    pub kind: OpportunityReason,
    /// Rendered explanation ("duplicate streaming services")
    pub reason: String,
    pub monthly_savings: f64,
}

/// Recurring costs and income for one user, recomputed on demand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringSummary {
    pub user_id: String,
    pub total_monthly_cost: f64,
    pub total_monthly_income: f64,
    pub subscriptions: Vec<RecurringItem>,
    pub recurring_income: Vec<RecurringItem>,
    /// Monthly subscription cost per category
    pub by_category: BTreeMap<String, f64>,
    pub cancellation_opportunities: Vec<CancellationOpportunity>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_transaction_direction() {
        let d = date(2024, 1, 1);
        assert_eq!(
            Transaction::new("1", "NETFLIX", -15.99, d).direction(),
            Some(Direction::Expense)
        );
        assert_eq!(
            Transaction::new("2", "ACME PAYROLL", 2500.0, d).direction(),
            Some(Direction::Income)
        );
        assert_eq!(Transaction::new("3", "VOID", 0.0, d).direction(), None);
    }

    #[test]
    fn test_cadence_advance_uses_calendar_months() {
        assert_eq!(Cadence::Monthly.advance(date(2024, 1, 31)), date(2024, 2, 29));
        assert_eq!(Cadence::Quarterly.advance(date(2024, 1, 15)), date(2024, 4, 15));
        assert_eq!(Cadence::Annual.advance(date(2024, 2, 29)), date(2025, 2, 28));
        assert_eq!(Cadence::Biweekly.advance(date(2024, 1, 1)), date(2024, 1, 15));
    }

    #[test]
    fn test_cadence_from_str() {
        assert_eq!("Yearly".parse::<Cadence>(), Ok(Cadence::Annual));
        assert_eq!("bi-weekly".parse::<Cadence>(), Ok(Cadence::Biweekly));
        assert!("sometimes".parse::<Cadence>().is_err());
    }

    #[test]
    fn test_pattern_amount_serializes_as_exclusive_fields() {
        let fixed = serde_json::to_value(PatternAmount::Fixed { amount: 15.99 }).unwrap();
        assert_eq!(fixed["amount"], 15.99);
        assert!(fixed.get("amount_range").is_none());

        let range = serde_json::to_value(PatternAmount::Range {
            amount_range: AmountRange { min: 45.9, max: 68.12 },
        })
        .unwrap();
        assert!(range.get("amount").is_none());
        assert_eq!(range["amount_range"]["max"], 68.12);
    }
}
