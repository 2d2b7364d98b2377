//! Recurring pattern detection
//!
//! Runs each merchant group through the pipeline:
//! - grouping by canonical merchant and direction (optional resolver)
//! - cadence inference from date spacing
//! - amount classification (optional confirmer for high-variance groups)
//! - confidence scoring and false-positive screening
//!
//! Collaborator failures never fail a run; they are counted and logged.

use tracing::{debug, info, warn};

use crate::amount::{AmountAnalysis, AmountClassifier, AmountVerdict};
use crate::cadence::{CadenceAnalysis, DateClusterAnalyzer};
use crate::collaborators::{AmountConfirmation, MerchantNameResolver, VariableAmountConfirmer};
use crate::confidence::{self, ConfidenceScorer, ScoreInputs, FALLBACK_NOTE};
use crate::config::DetectionConfig;
use crate::error::Result;
use crate::filter::{FalsePositiveFilter, Rejection};
use crate::group::{TransactionGroup, TransactionGrouper};
use crate::models::{
    AmountRange, Cadence, DetectionStats, PatternAmount, PatternType, RecurringPattern,
    Transaction,
};
use crate::normalize::MerchantNormalizer;

/// Detects recurring patterns in a transaction history.
///
/// Holds no per-run state, so one detector can serve many users and threads.
pub struct PatternDetector<'a> {
    normalizer: MerchantNormalizer,
    resolver: Option<&'a dyn MerchantNameResolver>,
    confirmer: Option<&'a dyn VariableAmountConfirmer>,
}

impl<'a> PatternDetector<'a> {
    /// Deterministic detector: built-in aliases, no collaborators
    pub fn new() -> Self {
        Self {
            normalizer: MerchantNormalizer::new(),
            resolver: None,
            confirmer: None,
        }
    }

    pub fn with_normalizer(mut self, normalizer: MerchantNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Consult `resolver` for merchant names the alias table misses
    pub fn with_resolver(mut self, resolver: &'a dyn MerchantNameResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Consult `confirmer` for groups too variable to accept alone
    pub fn with_confirmer(mut self, confirmer: &'a dyn VariableAmountConfirmer) -> Self {
        self.confirmer = Some(confirmer);
        self
    }

    /// Detect recurring patterns.
    ///
    /// Output is sorted by confidence (descending), occurrence count
    /// (descending), canonical merchant, then direction.
    pub fn detect(
        &self,
        transactions: &[Transaction],
        config: &DetectionConfig,
    ) -> Result<(Vec<RecurringPattern>, DetectionStats)> {
        let mut stats = DetectionStats {
            total_transactions: transactions.len(),
            ..Default::default()
        };

        let mut grouper = TransactionGrouper::new(&self.normalizer);
        if let Some(resolver) = self.resolver {
            grouper = grouper.with_resolver(resolver, config.resolver_confidence_threshold());
        }
        let groups = grouper.group(transactions, &mut stats);
        stats.total_groups_considered = groups.len();

        let run = DetectionRun {
            config,
            analyzer: DateClusterAnalyzer::new(config),
            classifier: AmountClassifier::new(config),
            scorer: ConfidenceScorer::new(config),
            filter: FalsePositiveFilter::new(config),
            confirmer: self.confirmer,
        };

        let mut patterns = Vec::new();
        for group in &groups {
            match run.evaluate(group, &mut stats)? {
                Ok(pattern) => {
                    debug!(
                        merchant = %pattern.normalized_merchant,
                        direction = %pattern.direction,
                        pattern_type = %pattern.pattern_type,
                        cadence = %pattern.cadence,
                        confidence = pattern.confidence,
                        "Pattern detected"
                    );
                    patterns.push(pattern);
                }
                Err(rejection) => {
                    debug!(
                        merchant = %group.normalized_merchant,
                        direction = %group.direction,
                        occurrences = group.len(),
                        reason = %rejection,
                        "Group rejected"
                    );
                    rejection.record(&mut stats);
                }
            }
        }

        patterns.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| b.occurrence_count.cmp(&a.occurrence_count))
                .then_with(|| a.normalized_merchant.cmp(&b.normalized_merchant))
                .then_with(|| a.direction.cmp(&b.direction))
        });
        stats.patterns_detected = patterns.len();

        info!(
            transactions = stats.total_transactions,
            groups = stats.total_groups_considered,
            patterns = stats.patterns_detected,
            rejected = stats.total_rejected(),
            collaborator_failures = stats.collaborator_failures,
            "Detection complete"
        );

        Ok((patterns, stats))
    }
}

impl Default for PatternDetector<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Run detection with built-in aliases and no collaborators
pub fn detect(
    transactions: &[Transaction],
    config: &DetectionConfig,
) -> Result<(Vec<RecurringPattern>, DetectionStats)> {
    PatternDetector::new().detect(transactions, config)
}

/// Outcome of consulting the confirmer about one plausible group
enum Confirmation {
    Confirmed(AmountConfirmation),
    Rejected,
    Failed,
}

/// Per-run components built from one config
struct DetectionRun<'r> {
    config: &'r DetectionConfig,
    analyzer: DateClusterAnalyzer,
    classifier: AmountClassifier,
    scorer: ConfidenceScorer,
    filter: FalsePositiveFilter<'r>,
    confirmer: Option<&'r dyn VariableAmountConfirmer>,
}

impl DetectionRun<'_> {
    /// Outer error: precondition failure. Inner: pattern or rejection.
    fn evaluate(
        &self,
        group: &TransactionGroup<'_>,
        stats: &mut DetectionStats,
    ) -> Result<std::result::Result<RecurringPattern, Rejection>> {
        if let Err(rejection) = self.filter.screen_group(group) {
            return Ok(Err(rejection));
        }

        let cadence = self.analyzer.analyze(&group.dates())?;
        if let Err(rejection) = self.filter.screen_cadence(group.len(), &cadence) {
            return Ok(Err(rejection));
        }

        let amounts = group.amounts();
        let amount = self.classifier.classify(&amounts, cadence.cadence)?;

        let confirmation = if amount.verdict == AmountVerdict::Plausible {
            Some(self.confirm(group, &amounts, &cadence, stats))
        } else {
            None
        };
        // A failed confirmer keeps the candidate as a capped fallback
        let confirmed = matches!(
            confirmation,
            Some(Confirmation::Confirmed(_) | Confirmation::Failed)
        );
        if let Err(rejection) = self.filter.screen_amount(&amount, confirmed) {
            return Ok(Err(rejection));
        }

        let pattern = match confirmation {
            None => self.deterministic_pattern(group, &cadence, &amount),
            Some(Confirmation::Confirmed(answer)) => {
                self.confirmed_pattern(group, &cadence, &amount, answer)
            }
            Some(Confirmation::Failed | Confirmation::Rejected) => {
                self.fallback_pattern(group, &cadence, &amount)
            }
        };
        Ok(Ok(pattern))
    }

    fn confirm(
        &self,
        group: &TransactionGroup<'_>,
        amounts: &[f64],
        cadence: &CadenceAnalysis,
        stats: &mut DetectionStats,
    ) -> Confirmation {
        let Some(confirmer) = self.confirmer else {
            return Confirmation::Rejected;
        };

        stats.confirmer_calls += 1;
        match confirmer.confirm(&group.normalized_merchant, amounts, &cadence.describe()) {
            Ok(answer)
                if answer.is_recurring
                    && answer.confidence >= self.config.confirmer_confidence_threshold() =>
            {
                stats.confirmer_confirmed += 1;
                Confirmation::Confirmed(answer)
            }
            Ok(answer) => {
                debug!(
                    merchant = %group.normalized_merchant,
                    is_recurring = answer.is_recurring,
                    confidence = answer.confidence,
                    "Confirmer declined"
                );
                Confirmation::Rejected
            }
            Err(e) => {
                stats.collaborator_failures += 1;
                warn!(
                    merchant = %group.normalized_merchant,
                    error = %e,
                    "Amount confirmer failed, keeping deterministic fallback"
                );
                Confirmation::Failed
            }
        }
    }

    fn deterministic_pattern(
        &self,
        group: &TransactionGroup<'_>,
        cadence: &CadenceAnalysis,
        amount: &AmountAnalysis,
    ) -> RecurringPattern {
        let (pattern_type, charge) = match amount.pattern_amount() {
            Some(found) => found,
            // Only accepted verdicts reach this point
            None => (
                PatternType::Variable,
                PatternAmount::Range {
                    amount_range: amount.range,
                },
            ),
        };
        let confidence = self.score(group, cadence, amount, pattern_type);
        let driver = confidence::driver(pattern_type, cadence.date_std_dev, amount.cv);
        build_pattern(
            group,
            pattern_type,
            charge,
            amount,
            cadence,
            confidence,
            &driver,
        )
    }

    fn confirmed_pattern(
        &self,
        group: &TransactionGroup<'_>,
        cadence: &CadenceAnalysis,
        amount: &AmountAnalysis,
        confirmation: AmountConfirmation,
    ) -> RecurringPattern {
        let cadence = self.confirmed_cadence(group, cadence, confirmation.cadence.as_deref());
        let range = confirmation
            .expected_range
            .and_then(|[min, max]| valid_range(min, max))
            .unwrap_or(amount.range);

        let confidence = self.score(group, &cadence, amount, PatternType::Variable);
        let driver = if confirmation.reasoning.trim().is_empty() {
            confidence::driver(PatternType::Variable, cadence.date_std_dev, amount.cv)
        } else {
            confirmation.reasoning.trim().to_string()
        };
        build_pattern(
            group,
            PatternType::Variable,
            PatternAmount::Range {
                amount_range: range,
            },
            amount,
            &cadence,
            confidence,
            &driver,
        )
    }

    /// Collaborator cadence, if it names the inferred bucket or a neighbour
    /// that the dates still satisfy; otherwise the inferred analysis
    fn confirmed_cadence(
        &self,
        group: &TransactionGroup<'_>,
        inferred: &CadenceAnalysis,
        answer: Option<&str>,
    ) -> CadenceAnalysis {
        let Some(claimed) = answer.and_then(|c| c.parse::<Cadence>().ok()) else {
            return inferred.clone();
        };
        if claimed == inferred.cadence {
            return inferred.clone();
        }

        let candidate = adjacent(claimed, inferred.cadence)
            .then(|| self.analyzer.analyze_as(&group.dates(), claimed).ok())
            .flatten()
            .filter(|c| self.filter.screen_cadence(group.len(), c).is_ok());
        match candidate {
            Some(analysis) => analysis,
            None => {
                debug!(
                    merchant = %group.normalized_merchant,
                    claimed = %claimed,
                    inferred = %inferred.cadence,
                    "Ignoring confirmer cadence that the dates do not support"
                );
                inferred.clone()
            }
        }
    }

    fn fallback_pattern(
        &self,
        group: &TransactionGroup<'_>,
        cadence: &CadenceAnalysis,
        amount: &AmountAnalysis,
    ) -> RecurringPattern {
        let confidence = self
            .score(group, cadence, amount, PatternType::Variable)
            .min(self.config.fallback_confidence());
        let driver = format!(
            "{} {}",
            confidence::driver(PatternType::Variable, cadence.date_std_dev, amount.cv),
            FALLBACK_NOTE
        );
        build_pattern(
            group,
            PatternType::Variable,
            PatternAmount::Range {
                amount_range: amount.range,
            },
            amount,
            cadence,
            confidence,
            &driver,
        )
    }

    fn score(
        &self,
        group: &TransactionGroup<'_>,
        cadence: &CadenceAnalysis,
        amount: &AmountAnalysis,
        pattern_type: PatternType,
    ) -> f64 {
        self.scorer.score(&ScoreInputs {
            pattern_type,
            occurrence_count: group.len(),
            cadence: cadence.cadence,
            date_std_dev: cadence.date_std_dev,
            cv: amount.cv,
            generic: group.generic,
        })
    }
}

fn build_pattern(
    group: &TransactionGroup<'_>,
    pattern_type: PatternType,
    charge: PatternAmount,
    amount: &AmountAnalysis,
    analysis: &CadenceAnalysis,
    confidence: f64,
    driver: &str,
) -> RecurringPattern {
    let cadence = analysis.cadence;
    let dates = group.dates();
    let first_date = dates.first().copied().unwrap_or_default();
    let last_date = dates.last().copied().unwrap_or_default();

    RecurringPattern {
        merchant_name: group.merchant_name().to_string(),
        normalized_merchant: group.normalized_merchant.clone(),
        direction: group.direction,
        pattern_type,
        cadence,
        charge,
        amount_variance_pct: if pattern_type == PatternType::Fixed {
            0.0
        } else {
            amount.cv
        },
        occurrence_count: group.len(),
        first_date,
        last_date,
        next_expected_date: cadence.advance(last_date),
        date_std_dev: analysis.date_std_dev,
        confidence,
        reasoning: confidence::reasoning(
            group.direction,
            &charge,
            cadence,
            group.len(),
            first_date,
            last_date,
            driver,
        ),
    }
}

/// Same bucket or next to it in period order
fn adjacent(a: Cadence, b: Cadence) -> bool {
    let index = |c: Cadence| Cadence::ALL.iter().position(|x| *x == c).unwrap_or(0);
    index(a).abs_diff(index(b)) <= 1
}

/// Collaborator-supplied bounds, if usable
fn valid_range(min: f64, max: f64) -> Option<AmountRange> {
    let (min, max) = (min.abs(), max.abs());
    if min.is_finite() && max.is_finite() && min <= max {
        Some(AmountRange { min, max })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Monthly charges whose amounts vary too much to accept without help
    fn erratic_bills() -> Vec<Transaction> {
        [10.0, 40.0, 90.0, 20.0, 55.0]
            .iter()
            .enumerate()
            .map(|(i, amount)| {
                Transaction::new(
                    format!("w{}", i),
                    "CITY WATER DEPT",
                    -amount,
                    date(2024, i as u32 + 1, 3),
                )
            })
            .collect()
    }

    struct FixedAnswer(fn() -> Result<AmountConfirmation>);

    impl VariableAmountConfirmer for FixedAnswer {
        fn confirm(&self, _: &str, _: &[f64], _: &str) -> Result<AmountConfirmation> {
            (self.0)()
        }
    }

    fn answer(is_recurring: bool, confidence: f64) -> Result<AmountConfirmation> {
        Ok(AmountConfirmation {
            is_recurring,
            cadence: Some("monthly".to_string()),
            expected_range: Some([5.0, 120.0]),
            confidence,
            reasoning: "municipal water billing tracks usage".to_string(),
        })
    }

    #[test]
    fn test_empty_input() {
        let (patterns, stats) = detect(&[], &DetectionConfig::default()).unwrap();
        assert!(patterns.is_empty());
        assert_eq!(stats, DetectionStats::default());
    }

    #[test]
    fn test_plausible_group_rejected_without_confirmer() {
        let (patterns, stats) = detect(&erratic_bills(), &DetectionConfig::default()).unwrap();
        assert!(patterns.is_empty());
        assert_eq!(stats.rejected_irregular_amount, 1);
        assert_eq!(stats.confirmer_calls, 0);
    }

    #[test]
    fn test_confirmed_group_uses_collaborator_answer() {
        let confirmer = FixedAnswer(|| answer(true, 0.9));
        let detector = PatternDetector::new().with_confirmer(&confirmer);
        let (patterns, stats) = detector
            .detect(&erratic_bills(), &DetectionConfig::default())
            .unwrap();

        assert_eq!(patterns.len(), 1);
        let p = &patterns[0];
        assert_eq!(p.pattern_type, PatternType::Variable);
        assert_eq!(p.cadence, Cadence::Monthly);
        assert_eq!(p.amount_range(), Some(AmountRange { min: 5.0, max: 120.0 }));
        assert!(p.reasoning.ends_with("municipal water billing tracks usage"));
        assert_eq!(stats.confirmer_calls, 1);
        assert_eq!(stats.confirmer_confirmed, 1);
    }

    /// Confirms every group, claiming the given cadence
    struct CadenceAnswer(&'static str);

    impl VariableAmountConfirmer for CadenceAnswer {
        fn confirm(&self, _: &str, _: &[f64], _: &str) -> Result<AmountConfirmation> {
            Ok(AmountConfirmation {
                is_recurring: true,
                cadence: Some(self.0.to_string()),
                expected_range: None,
                confidence: 0.9,
                reasoning: String::new(),
            })
        }
    }

    #[test]
    fn test_confirmer_cadence_must_fit_the_dates() {
        let baseline = {
            let confirmer = CadenceAnswer("monthly");
            let detector = PatternDetector::new().with_confirmer(&confirmer);
            detector
                .detect(&erratic_bills(), &DetectionConfig::default())
                .unwrap()
                .0
        };
        assert_eq!(baseline[0].cadence, Cadence::Monthly);

        // Far-off and neighbouring buckets the dates do not support are ignored
        for claimed in ["annual", "quarterly", "weekly", "every so often"] {
            let confirmer = CadenceAnswer(claimed);
            let detector = PatternDetector::new().with_confirmer(&confirmer);
            let (patterns, _) = detector
                .detect(&erratic_bills(), &DetectionConfig::default())
                .unwrap();

            assert_eq!(patterns.len(), 1, "claimed {}", claimed);
            let p = &patterns[0];
            assert_eq!(p.cadence, Cadence::Monthly, "claimed {}", claimed);
            assert_eq!(p.next_expected_date, date(2024, 6, 3));
            assert_eq!(p.confidence, baseline[0].confidence);
            assert!(p.reasoning.contains("monthly"));
        }
    }

    #[test]
    fn test_adjacent_cadence_checks() {
        assert!(adjacent(Cadence::Monthly, Cadence::Quarterly));
        assert!(adjacent(Cadence::Weekly, Cadence::Weekly));
        assert!(!adjacent(Cadence::Monthly, Cadence::Annual));
        assert!(!adjacent(Cadence::Weekly, Cadence::Monthly));
    }

    #[test]
    fn test_declined_or_unsure_confirmation_rejects() {
        for confirmer in [
            FixedAnswer(|| answer(false, 0.95)),
            FixedAnswer(|| answer(true, 0.5)),
        ] {
            let detector = PatternDetector::new().with_confirmer(&confirmer);
            let (patterns, stats) = detector
                .detect(&erratic_bills(), &DetectionConfig::default())
                .unwrap();
            assert!(patterns.is_empty());
            assert_eq!(stats.rejected_irregular_amount, 1);
            assert_eq!(stats.confirmer_confirmed, 0);
        }
    }

    #[test]
    fn test_failed_confirmer_keeps_capped_fallback() {
        let confirmer = FixedAnswer(|| Err(Error::Timeout(std::time::Duration::from_secs(20))));
        let detector = PatternDetector::new().with_confirmer(&confirmer);
        let (patterns, stats) = detector
            .detect(&erratic_bills(), &DetectionConfig::default())
            .unwrap();

        assert_eq!(patterns.len(), 1);
        assert!(patterns[0].confidence <= 0.3);
        assert!(patterns[0].reasoning.ends_with(FALLBACK_NOTE));
        assert_eq!(stats.collaborator_failures, 1);
    }

    #[test]
    fn test_confirmer_not_called_for_stable_groups() {
        let confirmer = FixedAnswer(|| answer(false, 1.0));
        let txs: Vec<_> = (1..=4)
            .map(|m| Transaction::new(format!("{}", m), "SPOTIFY USA", -10.99, date(2024, m, 20)))
            .collect();
        let detector = PatternDetector::new().with_confirmer(&confirmer);
        let (patterns, stats) = detector.detect(&txs, &DetectionConfig::default()).unwrap();
        assert_eq!(patterns.len(), 1);
        assert_eq!(stats.confirmer_calls, 0);
    }

    #[test]
    fn test_sort_order() {
        let mut txs = Vec::new();
        for m in 1..=3 {
            txs.push(Transaction::new(format!("a{}", m), "Zeta Gym", -30.0, date(2024, m, 1)));
            txs.push(Transaction::new(format!("b{}", m), "Alpha Gym", -30.0, date(2024, m, 1)));
        }
        for m in 1..=6 {
            txs.push(Transaction::new(format!("c{}", m), "Hulu", -7.99, date(2024, m, 9)));
        }
        let (patterns, _) = detect(&txs, &DetectionConfig::default()).unwrap();
        let names: Vec<_> = patterns.iter().map(|p| p.normalized_merchant.as_str()).collect();
        assert_eq!(names, vec!["hulu", "alpha gym", "zeta gym"]);
    }
}
