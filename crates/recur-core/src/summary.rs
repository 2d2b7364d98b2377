//! Recurring cost summaries and cancellation opportunities
//!
//! Summaries are derived data: recompute them from the current pattern list
//! whenever it changes.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use crate::config::SummaryConfig;
use crate::models::{
    CancellationOpportunity, Cadence, Direction, OpportunityReason, RecurringItem,
    RecurringPattern, RecurringSummary,
};

/// Category for merchants no map or keyword covers
pub const OTHER_CATEGORY: &str = "other";

/// Convert one charge at `cadence` into a monthly figure, rounded to cents
pub fn monthly_cost(amount: f64, cadence: Cadence) -> f64 {
    round_cents(amount * cadence.monthly_factor())
}

/// Keyword fallback for merchants missing from the category map
pub fn categorize_fallback(normalized_merchant: &str, direction: Direction) -> &'static str {
    if direction == Direction::Income {
        return "income";
    }

    let m = normalized_merchant.to_lowercase();
    let has_word = |word: &str| m.split_whitespace().any(|token| token == word);

    if m.contains("netflix")
        || m.contains("hulu")
        || m.contains("disney")
        || m.contains("hbo")
        || m.contains("paramount")
        || m.contains("peacock")
        || m.contains("prime video")
        || m.contains("apple tv")
        || m.contains("crunchyroll")
        || m.contains("youtube premium")
    {
        "streaming"
    } else if m.contains("spotify")
        || m.contains("apple music")
        || m.contains("tidal")
        || m.contains("pandora")
        || m.contains("youtube music")
        || m.contains("sirius")
    {
        "music"
    } else if m.contains("icloud")
        || m.contains("google one")
        || m.contains("dropbox")
        || m.contains("onedrive")
        || m.contains("backblaze")
    {
        "cloud_storage"
    } else if has_word("nyt")
        || m.contains("new york times")
        || has_word("wsj")
        || m.contains("washington post")
        || m.contains("substack")
        || m.contains("economist")
    {
        "news"
    } else if m.contains("peloton")
        || m.contains("strava")
        || m.contains("fitness")
        || has_word("gym")
        || m.contains("yoga")
        || m.contains("headspace")
    {
        "fitness"
    } else if m.contains("adobe")
        || m.contains("microsoft")
        || m.contains("github")
        || m.contains("notion")
        || m.contains("jetbrains")
        || m.contains("1password")
        || m.contains("google workspace")
    {
        "software"
    } else if m.contains("electric")
        || m.contains("energy")
        || m.contains("water")
        || has_word("gas")
        || m.contains("utility")
        || m.contains("utilities")
        || m.contains("power")
    {
        "utilities"
    } else if m.contains("verizon")
        || has_word("att")
        || m.contains("t mobile")
        || m.contains("comcast")
        || m.contains("xfinity")
        || m.contains("spectrum")
        || m.contains("wireless")
    {
        "telecom"
    } else if m.contains("insurance")
        || m.contains("geico")
        || m.contains("progressive")
        || m.contains("state farm")
        || m.contains("allstate")
    {
        "insurance"
    } else {
        OTHER_CATEGORY
    }
}

/// Builds [`RecurringSummary`] values from detected patterns
#[derive(Debug, Clone, Default)]
pub struct SummaryAggregator {
    config: SummaryConfig,
}

impl SummaryAggregator {
    pub fn new(config: SummaryConfig) -> Self {
        Self { config }
    }

    /// Summarize patterns for one user.
    ///
    /// `categories` maps canonical merchant names to categories; unmapped
    /// merchants fall back to [`categorize_fallback`].
    pub fn summarize(
        &self,
        user_id: &str,
        patterns: &[RecurringPattern],
        categories: Option<&HashMap<String, String>>,
    ) -> RecurringSummary {
        let mut subscriptions = Vec::new();
        let mut recurring_income = Vec::new();

        for pattern in patterns {
            let item = to_item(pattern, categories);
            if item.is_subscription {
                subscriptions.push(item);
            } else {
                recurring_income.push(item);
            }
        }

        subscriptions.sort_by(by_cost_desc);
        recurring_income.sort_by(by_cost_desc);

        let mut by_category: BTreeMap<String, f64> = BTreeMap::new();
        for item in &subscriptions {
            *by_category.entry(item.category.clone()).or_insert(0.0) += item.monthly_cost;
        }
        for total in by_category.values_mut() {
            *total = round_cents(*total);
        }

        let total_monthly_cost = round_cents(subscriptions.iter().map(|i| i.monthly_cost).sum());
        let total_monthly_income =
            round_cents(recurring_income.iter().map(|i| i.monthly_cost).sum());

        let cancellation_opportunities = self.find_opportunities(&subscriptions);

        debug!(
            user_id = %user_id,
            subscriptions = subscriptions.len(),
            income_streams = recurring_income.len(),
            opportunities = cancellation_opportunities.len(),
            "Summary built"
        );

        RecurringSummary {
            user_id: user_id.to_string(),
            total_monthly_cost,
            total_monthly_income,
            subscriptions,
            recurring_income,
            by_category,
            cancellation_opportunities,
        }
    }

    /// Duplicate-category and low-confidence suggestions over sorted subscriptions
    fn find_opportunities(&self, subscriptions: &[RecurringItem]) -> Vec<CancellationOpportunity> {
        let mut by_category: BTreeMap<&str, Vec<&RecurringItem>> = BTreeMap::new();
        for item in subscriptions {
            // Uncategorized merchants share no service, so "other" never holds duplicates
            if item.category != OTHER_CATEGORY {
                by_category.entry(item.category.as_str()).or_default().push(item);
            }
        }

        let mut opportunities = Vec::new();
        let mut flagged: HashSet<&str> = HashSet::new();

        for (category, items) in &by_category {
            // Items arrive sorted by monthly cost descending
            if items.len() >= 3 {
                for item in items.iter().skip(2) {
                    flagged.insert(item.normalized_merchant.as_str());
                    opportunities.push(opportunity(
                        item,
                        OpportunityReason::DuplicateCategory,
                        format!("duplicate {} services", category),
                    ));
                }
            } else if items.len() == 2 && self.config.commonly_duplicated().contains(*category) {
                let cheaper = items[1];
                flagged.insert(cheaper.normalized_merchant.as_str());
                opportunities.push(opportunity(
                    cheaper,
                    OpportunityReason::PotentialDuplicate,
                    format!("potential duplicate {} service", category),
                ));
            }
        }

        for item in subscriptions {
            if item.confidence < self.config.low_confidence_threshold()
                && !flagged.contains(item.normalized_merchant.as_str())
            {
                opportunities.push(opportunity(
                    item,
                    OpportunityReason::LowConfidence,
                    "low detection confidence".to_string(),
                ));
            }
        }

        opportunities.sort_by(|a, b| {
            b.monthly_savings
                .total_cmp(&a.monthly_savings)
                .then_with(|| a.merchant_name.cmp(&b.merchant_name))
        });
        opportunities
    }
}

/// Summarize with default thresholds
pub fn summarize(
    user_id: &str,
    patterns: &[RecurringPattern],
    categories: Option<&HashMap<String, String>>,
) -> RecurringSummary {
    SummaryAggregator::default().summarize(user_id, patterns, categories)
}

fn to_item(pattern: &RecurringPattern, categories: Option<&HashMap<String, String>>) -> RecurringItem {
    let amount = pattern.charge.representative();
    let category = categories
        .and_then(|map| map.get(&pattern.normalized_merchant))
        .map(|c| c.to_lowercase())
        .unwrap_or_else(|| {
            categorize_fallback(&pattern.normalized_merchant, pattern.direction).to_string()
        });

    RecurringItem {
        merchant_name: pattern.merchant_name.clone(),
        normalized_merchant: pattern.normalized_merchant.clone(),
        category,
        amount,
        cadence: pattern.cadence,
        monthly_cost: monthly_cost(amount, pattern.cadence),
        is_subscription: pattern.is_expense(),
        next_charge_date: pattern.next_expected_date,
        confidence: pattern.confidence,
    }
}

fn opportunity(
    item: &RecurringItem,
    kind: OpportunityReason,
    reason: String,
) -> CancellationOpportunity {
    CancellationOpportunity {
        merchant_name: item.merchant_name.clone(),
        category: item.category.clone(),
        kind,
        reason,
        monthly_savings: item.monthly_cost,
    }
}

fn by_cost_desc(a: &RecurringItem, b: &RecurringItem) -> std::cmp::Ordering {
    b.monthly_cost
        .total_cmp(&a.monthly_cost)
        .then_with(|| a.normalized_merchant.cmp(&b.normalized_merchant))
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
