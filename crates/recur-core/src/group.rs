//! Transaction grouping by merchant identity
//!
//! Groups are keyed by `(canonical merchant, direction)` and returned in key
//! order so every run over the same input walks the groups identically.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::collaborators::MerchantNameResolver;
use crate::models::{DetectionStats, Direction, Transaction};
use crate::normalize::MerchantNormalizer;

/// Transactions sharing one merchant and flow direction, sorted by date
#[derive(Debug, Clone)]
pub struct TransactionGroup<'t> {
    pub normalized_merchant: String,
    pub direction: Direction,
    /// Generic activity (ATM, transfers, ...), retained so the filter can count it
    pub generic: bool,
    /// Never empty; ties on date keep input order
    pub transactions: Vec<&'t Transaction>,
}

impl<'t> TransactionGroup<'t> {
    /// Raw merchant string of the earliest transaction
    pub fn merchant_name(&self) -> &str {
        self.transactions
            .first()
            .map(|t| t.merchant.as_str())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.transactions.iter().map(|t| t.date).collect()
    }

    /// Amount magnitudes in date order
    pub fn amounts(&self) -> Vec<f64> {
        self.transactions.iter().map(|t| t.amount.abs()).collect()
    }
}

#[derive(Debug, Clone)]
struct ResolvedName {
    canonical: String,
    generic: bool,
}

/// Buckets transactions by canonical merchant.
///
/// The optional resolver is asked only about names the alias table misses,
/// once per distinct cleaned name per call to [`TransactionGrouper::group`].
pub struct TransactionGrouper<'a> {
    normalizer: &'a MerchantNormalizer,
    resolver: Option<&'a dyn MerchantNameResolver>,
    resolver_threshold: f64,
}

impl<'a> TransactionGrouper<'a> {
    pub fn new(normalizer: &'a MerchantNormalizer) -> Self {
        Self {
            normalizer,
            resolver: None,
            resolver_threshold: 1.0,
        }
    }

    /// Consult `resolver` on alias misses, accepting answers at or above `threshold`
    pub fn with_resolver(mut self, resolver: &'a dyn MerchantNameResolver, threshold: f64) -> Self {
        self.resolver = Some(resolver);
        self.resolver_threshold = threshold;
        self
    }

    /// Group transactions, skipping zero amounts.
    ///
    /// Updates the zero-amount and resolver counters in `stats`.
    pub fn group<'t>(
        &self,
        transactions: &'t [Transaction],
        stats: &mut DetectionStats,
    ) -> Vec<TransactionGroup<'t>> {
        let mut memo: HashMap<String, ResolvedName> = HashMap::new();
        let mut buckets: BTreeMap<(String, Direction), TransactionGroup<'t>> = BTreeMap::new();

        for tx in transactions {
            let Some(direction) = tx.direction() else {
                stats.ignored_zero_amount += 1;
                continue;
            };

            let name = self.resolve_name(&tx.merchant, &mut memo, stats);
            let group = buckets
                .entry((name.canonical.clone(), direction))
                .or_insert_with(|| TransactionGroup {
                    normalized_merchant: name.canonical.clone(),
                    direction,
                    generic: false,
                    transactions: Vec::new(),
                });
            group.generic |= name.generic;
            group.transactions.push(tx);
        }

        buckets
            .into_values()
            .map(|mut group| {
                // Stable sort keeps input order for same-day transactions
                group.transactions.sort_by_key(|t| t.date);
                group
            })
            .collect()
    }

    fn resolve_name(
        &self,
        raw: &str,
        memo: &mut HashMap<String, ResolvedName>,
        stats: &mut DetectionStats,
    ) -> ResolvedName {
        let normalized = self.normalizer.normalize(raw);
        let fallback = ResolvedName {
            canonical: normalized.canonical.clone(),
            generic: normalized.generic,
        };

        let resolver = match self.resolver {
            Some(r) if !normalized.alias_hit && !normalized.generic => r,
            _ => return fallback,
        };

        if let Some(hit) = memo.get(&normalized.cleaned) {
            return hit.clone();
        }

        stats.resolver_calls += 1;
        let resolved = match resolver.resolve(raw) {
            Ok(resolution) if resolution.confidence >= self.resolver_threshold => {
                let renormalized = self.normalizer.normalize(&resolution.canonical_name);
                if renormalized.canonical.is_empty() {
                    debug!(merchant = %raw, "Resolver returned an empty name, keeping cleaned name");
                    fallback
                } else {
                    stats.resolver_accepted += 1;
                    debug!(
                        merchant = %raw,
                        canonical = %renormalized.canonical,
                        confidence = resolution.confidence,
                        "Resolver accepted"
                    );
                    ResolvedName {
                        generic: renormalized.generic || resolution.is_generic(),
                        canonical: renormalized.canonical,
                    }
                }
            }
            Ok(resolution) => {
                debug!(
                    merchant = %raw,
                    confidence = resolution.confidence,
                    "Resolver below threshold, keeping cleaned name"
                );
                fallback
            }
            Err(e) => {
                stats.collaborator_failures += 1;
                warn!(merchant = %raw, error = %e, "Merchant resolver failed, keeping cleaned name");
                fallback
            }
        };

        memo.insert(normalized.cleaned, resolved.clone());
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::MerchantResolution;
    use crate::error::{Error, Result};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct CountingResolver {
        calls: AtomicUsize,
        answer: fn(&str) -> Result<MerchantResolution>,
    }

    impl MerchantNameResolver for CountingResolver {
        fn resolve(&self, raw_name: &str) -> Result<MerchantResolution> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.answer)(raw_name)
        }
    }

    fn resolution(name: &str, kind: &str, confidence: f64) -> Result<MerchantResolution> {
        Ok(MerchantResolution {
            canonical_name: name.to_string(),
            merchant_type: kind.to_string(),
            confidence,
            reasoning: String::new(),
        })
    }

    #[test]
    fn test_groups_by_merchant_and_direction() {
        let txs = vec![
            Transaction::new("1", "NETFLIX.COM*111", -15.99, date(2024, 2, 15)),
            Transaction::new("2", "NFLX DIGITAL", -15.99, date(2024, 1, 15)),
            Transaction::new("3", "Netflix refund", 15.99, date(2024, 1, 20)),
            Transaction::new("4", "Hulu", -7.99, date(2024, 1, 3)),
            Transaction::new("5", "Hulu", 0.0, date(2024, 1, 4)),
        ];
        let normalizer = MerchantNormalizer::new();
        let mut stats = DetectionStats::default();
        let groups = TransactionGrouper::new(&normalizer).group(&txs, &mut stats);

        assert_eq!(stats.ignored_zero_amount, 1);
        let keys: Vec<_> = groups
            .iter()
            .map(|g| (g.normalized_merchant.as_str(), g.direction, g.len()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("hulu", Direction::Expense, 1),
                ("netflix", Direction::Expense, 2),
                ("netflix", Direction::Income, 1),
            ]
        );

        // Earliest transaction supplies the display name
        assert_eq!(groups[1].merchant_name(), "NFLX DIGITAL");
        assert_eq!(groups[1].dates(), vec![date(2024, 1, 15), date(2024, 2, 15)]);
        assert_eq!(groups[1].amounts(), vec![15.99, 15.99]);
    }

    #[test]
    fn test_generic_groups_are_marked_not_dropped() {
        let txs = vec![
            Transaction::new("1", "ATM WITHDRAWAL 0042", -100.0, date(2024, 1, 1)),
            Transaction::new("2", "ATM WITHDRAWAL 0042", -100.0, date(2024, 2, 1)),
        ];
        let normalizer = MerchantNormalizer::new();
        let mut stats = DetectionStats::default();
        let groups = TransactionGrouper::new(&normalizer).group(&txs, &mut stats);
        assert_eq!(groups.len(), 1);
        assert!(groups[0].generic);
    }

    #[test]
    fn test_resolver_consulted_once_per_cleaned_name() {
        let resolver = CountingResolver {
            calls: AtomicUsize::new(0),
            answer: |_| resolution("Blue Bottle Coffee", "merchant", 0.95),
        };
        let txs = vec![
            Transaction::new("1", "SQ *BLUE BOTTLE #0123", -5.0, date(2024, 1, 1)),
            Transaction::new("2", "SQ *BLUE BOTTLE #0456", -5.0, date(2024, 1, 8)),
            // Alias hit, never sent to the resolver
            Transaction::new("3", "NFLX", -15.99, date(2024, 1, 8)),
        ];
        let normalizer = MerchantNormalizer::new();
        let mut stats = DetectionStats::default();
        let groups = TransactionGrouper::new(&normalizer)
            .with_resolver(&resolver, 0.8)
            .group(&txs, &mut stats);

        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
        assert_eq!(stats.resolver_calls, 1);
        assert_eq!(stats.resolver_accepted, 1);
        assert_eq!(groups[0].normalized_merchant, "blue bottle coffee");
        assert_eq!(groups[0].len(), 2);
    }

    #[test]
    fn test_resolver_low_confidence_and_errors_fall_back() {
        let normalizer = MerchantNormalizer::new();
        let txs = vec![Transaction::new("1", "Corner Bakery", -5.0, date(2024, 1, 1))];

        let unsure = CountingResolver {
            calls: AtomicUsize::new(0),
            answer: |_| resolution("Something Else", "merchant", 0.5),
        };
        let mut stats = DetectionStats::default();
        let groups = TransactionGrouper::new(&normalizer)
            .with_resolver(&unsure, 0.8)
            .group(&txs, &mut stats);
        assert_eq!(groups[0].normalized_merchant, "corner bakery");
        assert_eq!(stats.resolver_accepted, 0);
        assert_eq!(stats.collaborator_failures, 0);

        let failing = CountingResolver {
            calls: AtomicUsize::new(0),
            answer: |_| Err(Error::Collaborator("model offline".to_string())),
        };
        let mut stats = DetectionStats::default();
        let groups = TransactionGrouper::new(&normalizer)
            .with_resolver(&failing, 0.8)
            .group(&txs, &mut stats);
        assert_eq!(groups[0].normalized_merchant, "corner bakery");
        assert_eq!(stats.collaborator_failures, 1);
    }

    #[test]
    fn test_resolver_generic_type_marks_group() {
        let resolver = CountingResolver {
            calls: AtomicUsize::new(0),
            answer: |_| resolution("First National", "transfer", 0.9),
        };
        let txs = vec![Transaction::new("1", "FNB XFER 77", -50.0, date(2024, 1, 1))];
        let normalizer = MerchantNormalizer::new();
        let mut stats = DetectionStats::default();
        let groups = TransactionGrouper::new(&normalizer)
            .with_resolver(&resolver, 0.8)
            .group(&txs, &mut stats);
        assert!(groups[0].generic);
    }
}
