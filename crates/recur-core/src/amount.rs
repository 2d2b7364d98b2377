//! Amount behavior classification

use std::collections::HashMap;

use crate::config::DetectionConfig;
use crate::error::{Error, Result};
use crate::models::{AmountRange, Cadence, PatternAmount, PatternType};

/// Outcome of classifying a group's amounts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountVerdict {
    Fixed,
    Variable,
    Irregular,
    /// Too variable to accept alone; a confirmer may still rescue it
    Plausible,
    Noise,
}

/// Amount statistics plus the verdict
#[derive(Debug, Clone, PartialEq)]
pub struct AmountAnalysis {
    pub verdict: AmountVerdict,
    pub mean: f64,
    /// Population coefficient of variation
    pub cv: f64,
    pub range: AmountRange,
    /// Most frequent amount to the cent, most recent on ties
    pub typical: f64,
}

impl AmountAnalysis {
    /// Pattern type and amount for accepted verdicts
    pub fn pattern_amount(&self) -> Option<(PatternType, PatternAmount)> {
        match self.verdict {
            AmountVerdict::Fixed => Some((
                PatternType::Fixed,
                PatternAmount::Fixed {
                    amount: self.typical,
                },
            )),
            AmountVerdict::Variable => Some((
                PatternType::Variable,
                PatternAmount::Range {
                    amount_range: self.range,
                },
            )),
            AmountVerdict::Irregular => Some((
                PatternType::Irregular,
                PatternAmount::Range {
                    amount_range: self.range,
                },
            )),
            AmountVerdict::Plausible | AmountVerdict::Noise => None,
        }
    }
}

/// Classifies amount magnitudes as fixed, variable or irregular
#[derive(Debug, Clone)]
pub struct AmountClassifier {
    amount_tolerance: f64,
    variance_ceiling: f64,
    confirm_ceiling: f64,
    long_cadence_fixed_min_occurrences: usize,
}

impl AmountClassifier {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            amount_tolerance: config.amount_tolerance(),
            variance_ceiling: config.variance_ceiling(),
            confirm_ceiling: config.confirm_ceiling(),
            long_cadence_fixed_min_occurrences: config.long_cadence_fixed_min_occurrences(),
        }
    }

    /// Classify magnitudes (in date order) observed at `cadence`
    pub fn classify(&self, amounts: &[f64], cadence: Cadence) -> Result<AmountAnalysis> {
        if amounts.is_empty() {
            return Err(Error::InvalidData(
                "amount classification needs at least one amount".into(),
            ));
        }

        let n = amounts.len() as f64;
        let mean = amounts.iter().sum::<f64>() / n;
        let variance = amounts.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / n;
        let cv = if mean > 0.0 { variance.sqrt() / mean } else { 0.0 };
        let range = AmountRange {
            min: amounts.iter().copied().fold(f64::INFINITY, f64::min),
            max: amounts.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        };

        let verdict = if mean < 0.01 {
            AmountVerdict::Noise
        } else if cv <= self.amount_tolerance
            && (!cadence.is_long() || amounts.len() >= self.long_cadence_fixed_min_occurrences)
        {
            AmountVerdict::Fixed
        } else if cadence.is_long() {
            if amounts.len() >= 2 {
                AmountVerdict::Irregular
            } else {
                AmountVerdict::Noise
            }
        } else if cv <= self.variance_ceiling {
            AmountVerdict::Variable
        } else if cv <= self.confirm_ceiling {
            AmountVerdict::Plausible
        } else {
            AmountVerdict::Noise
        };

        Ok(AmountAnalysis {
            verdict,
            mean,
            cv,
            range,
            typical: most_frequent(amounts),
        })
    }
}

fn most_frequent(amounts: &[f64]) -> f64 {
    // cents -> (count, last index seen)
    let mut counts: HashMap<i64, (usize, usize)> = HashMap::new();
    for (i, a) in amounts.iter().enumerate() {
        let entry = counts.entry((a * 100.0).round() as i64).or_insert((0, i));
        entry.0 += 1;
        entry.1 = i;
    }
    counts
        .into_iter()
        .max_by_key(|(_, (count, last))| (*count, *last))
        .map(|(cents, _)| cents as f64 / 100.0)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> AmountClassifier {
        AmountClassifier::new(&DetectionConfig::default())
    }

    #[test]
    fn test_constant_amount_is_fixed() {
        let analysis = classifier()
            .classify(&[15.99; 6], Cadence::Monthly)
            .unwrap();
        assert_eq!(analysis.verdict, AmountVerdict::Fixed);
        assert_eq!(analysis.typical, 15.99);
        assert_eq!(analysis.cv, 0.0);
        assert_eq!(
            analysis.pattern_amount(),
            Some((PatternType::Fixed, PatternAmount::Fixed { amount: 15.99 }))
        );
    }

    #[test]
    fn test_fixed_amount_uses_most_frequent_then_most_recent() {
        let analysis = classifier()
            .classify(&[10.00, 10.10, 10.00, 10.10], Cadence::Monthly)
            .unwrap();
        assert_eq!(analysis.verdict, AmountVerdict::Fixed);
        assert_eq!(analysis.typical, 10.10);

        let analysis = classifier()
            .classify(&[9.99, 10.10, 9.99], Cadence::Monthly)
            .unwrap();
        assert_eq!(analysis.typical, 9.99);
    }

    #[test]
    fn test_utility_bills_are_variable() {
        let analysis = classifier()
            .classify(&[52.34, 68.12, 45.90, 59.45], Cadence::Monthly)
            .unwrap();
        assert_eq!(analysis.verdict, AmountVerdict::Variable);
        assert!((analysis.cv - 0.1464).abs() < 0.001);
        assert_eq!(analysis.range, AmountRange { min: 45.90, max: 68.12 });
    }

    #[test]
    fn test_long_cadence_with_few_samples_is_irregular() {
        let analysis = classifier()
            .classify(&[139.0, 139.0, 139.0], Cadence::Annual)
            .unwrap();
        assert_eq!(analysis.verdict, AmountVerdict::Irregular);

        let analysis = classifier()
            .classify(&[139.0, 139.0, 139.0, 139.0], Cadence::Annual)
            .unwrap();
        assert_eq!(analysis.verdict, AmountVerdict::Fixed);

        let analysis = classifier()
            .classify(&[80.0, 400.0], Cadence::Quarterly)
            .unwrap();
        assert_eq!(analysis.verdict, AmountVerdict::Irregular);
    }

    #[test]
    fn test_high_variance_is_plausible_then_noise() {
        let analysis = classifier()
            .classify(&[10.0, 40.0, 90.0, 20.0], Cadence::Monthly)
            .unwrap();
        assert!(analysis.cv > 0.5 && analysis.cv <= 1.0);
        assert_eq!(analysis.verdict, AmountVerdict::Plausible);
        assert!(analysis.pattern_amount().is_none());

        let analysis = classifier()
            .classify(&[1.0, 1.0, 1.0, 200.0], Cadence::Weekly)
            .unwrap();
        assert!(analysis.cv > 1.0);
        assert_eq!(analysis.verdict, AmountVerdict::Noise);
    }

    #[test]
    fn test_sub_cent_amounts_are_noise() {
        let analysis = classifier()
            .classify(&[0.001, 0.002, 0.001], Cadence::Monthly)
            .unwrap();
        assert_eq!(analysis.verdict, AmountVerdict::Noise);
    }

    #[test]
    fn test_empty_amounts_error() {
        let err = classifier().classify(&[], Cadence::Monthly).unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
    }
}
