//! Confidence scoring and reasoning text
//!
//! ```text
//! confidence = clamp(base + occurrence_bonus + regularity_bonus - generic_penalty, 0, 1)
//! ```
//!
//! The occurrence bonus is a fast exponential plus a slow hyperbolic tail, so
//! every extra occurrence still raises the score after the exponential has
//! saturated. The maximum stays below 1.0.
//!
//! Anchors with perfectly regular dates: 3 fixed occurrences score about 0.69,
//! 6 about 0.92, 12 about 0.99.

use chrono::NaiveDate;

use crate::config::DetectionConfig;
use crate::models::{Cadence, Direction, PatternAmount, PatternType};

const FIXED_BASE: f64 = 0.38;
const VARIABLE_BASE: f64 = 0.34;
const IRREGULAR_BASE: f64 = 0.32;
const OCCURRENCE_WEIGHT: f64 = 0.48;
const OCCURRENCE_TAIL_WEIGHT: f64 = 0.015;
/// Extra occurrences at which the tail reaches half its weight
const OCCURRENCE_TAIL_HALF: f64 = 6.0;
const REGULARITY_WEIGHT: f64 = 0.12;
const GENERIC_PENALTY: f64 = 0.25;

/// Appended to reasoning when a confirmer failed and the pattern was kept anyway
pub const FALLBACK_NOTE: &str = "(amount confirmation unavailable, deterministic fallback)";

/// Everything the score depends on
#[derive(Debug, Clone, Copy)]
pub struct ScoreInputs {
    pub pattern_type: PatternType,
    pub occurrence_count: usize,
    pub cadence: Cadence,
    pub date_std_dev: f64,
    /// Coefficient of variation of the amounts
    pub cv: f64,
    pub generic: bool,
}

#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    amount_tolerance: f64,
    variance_ceiling: f64,
    max_date_dispersion: f64,
}

impl ConfidenceScorer {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            amount_tolerance: config.amount_tolerance(),
            variance_ceiling: config.variance_ceiling(),
            max_date_dispersion: config.max_date_dispersion(),
        }
    }

    pub fn score(&self, inputs: &ScoreInputs) -> f64 {
        let base = match inputs.pattern_type {
            PatternType::Fixed => FIXED_BASE,
            PatternType::Variable => VARIABLE_BASE,
            PatternType::Irregular => IRREGULAR_BASE,
        };

        let extra = inputs.occurrence_count.saturating_sub(2) as f64;
        let occurrence_bonus = OCCURRENCE_WEIGHT * (1.0 - (-extra / 2.0).exp())
            + OCCURRENCE_TAIL_WEIGHT * extra / (extra + OCCURRENCE_TAIL_HALF);

        let date_score = self.date_score(inputs.date_std_dev, inputs.cadence);
        let regularity_bonus = match inputs.pattern_type {
            PatternType::Fixed | PatternType::Irregular => REGULARITY_WEIGHT * date_score,
            PatternType::Variable => {
                REGULARITY_WEIGHT * date_score * (0.5 + 0.5 * self.amount_score(inputs.cv))
            }
        };

        let penalty = if inputs.generic { GENERIC_PENALTY } else { 0.0 };

        (base + occurrence_bonus + regularity_bonus - penalty).clamp(0.0, 1.0)
    }

    /// 1.0 for perfectly regular dates, 0.0 at the dispersion ceiling
    fn date_score(&self, std_dev: f64, cadence: Cadence) -> f64 {
        let relative = std_dev / cadence.period_days();
        (1.0 - relative / self.max_date_dispersion).clamp(0.0, 1.0)
    }

    /// 1.0 at the fixed tolerance, 0.0 at the variance ceiling
    fn amount_score(&self, cv: f64) -> f64 {
        let span = self.variance_ceiling - self.amount_tolerance;
        if span <= 0.0 {
            return 0.0;
        }
        (1.0 - (cv - self.amount_tolerance) / span).clamp(0.0, 1.0)
    }
}

/// Deterministic driver clause for the reasoning text
pub fn driver(pattern_type: PatternType, date_std_dev: f64, cv: f64) -> String {
    match pattern_type {
        PatternType::Fixed => format!("dates within ±{:.1} days", date_std_dev),
        PatternType::Variable | PatternType::Irregular => {
            format!("amounts vary {:.1}%", cv * 100.0)
        }
    }
}

/// Render the reasoning sentence for a pattern
pub fn reasoning(
    direction: Direction,
    charge: &PatternAmount,
    cadence: Cadence,
    occurrence_count: usize,
    first_date: NaiveDate,
    last_date: NaiveDate,
    driver: &str,
) -> String {
    let verb = match direction {
        Direction::Expense => "Charged",
        Direction::Income => "Received",
    };
    let amount = match charge {
        PatternAmount::Fixed { amount } => format!("${:.2}", amount),
        PatternAmount::Range { amount_range } => {
            format!("${:.2}-${:.2}", amount_range.min, amount_range.max)
        }
    };
    format!(
        "{} {} {}, {} times between {} and {}; {}",
        verb,
        amount,
        cadence.adverb(),
        occurrence_count,
        first_date,
        last_date,
        driver
    )
}
