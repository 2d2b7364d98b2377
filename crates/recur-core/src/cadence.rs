//! Date spacing analysis and cadence inference

use chrono::NaiveDate;

use crate::config::DetectionConfig;
use crate::error::{Error, Result};
use crate::models::Cadence;

/// Spacing statistics for one group's dates
#[derive(Debug, Clone, PartialEq)]
pub struct CadenceAnalysis {
    /// Best-fitting bucket, even when the dates are not clustered
    pub cadence: Cadence,
    /// Gaps in days between consecutive sorted dates
    pub gaps: Vec<i64>,
    pub median_gap: f64,
    /// RMS deviation of cadence-normalized gaps from the period, in days
    pub date_std_dev: f64,
    /// Median gap falls within the widened tolerance of the bucket period
    pub within_tolerance: bool,
    /// Within tolerance and dispersion under the configured ceiling
    pub clustered: bool,
}

impl CadenceAnalysis {
    /// Short description for collaborators, e.g. "monthly, gaps 28-33 days"
    pub fn describe(&self) -> String {
        let min = self.gaps.iter().min().copied().unwrap_or(0);
        let max = self.gaps.iter().max().copied().unwrap_or(0);
        if min == max {
            format!("{}, every {} days", self.cadence, min)
        } else {
            format!("{}, gaps {}-{} days", self.cadence, min, max)
        }
    }
}

/// Infers a cadence from occurrence dates
#[derive(Debug, Clone)]
pub struct DateClusterAnalyzer {
    date_tolerance_days: i64,
    max_date_dispersion: f64,
}

impl DateClusterAnalyzer {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            date_tolerance_days: config.date_tolerance_days(),
            max_date_dispersion: config.max_date_dispersion(),
        }
    }

    /// Analyze occurrence dates (any order). Requires at least two dates.
    pub fn analyze(&self, dates: &[NaiveDate]) -> Result<CadenceAnalysis> {
        let gaps = gaps(dates)?;
        let cadence = best_bucket(&gaps);
        Ok(self.fit(gaps, cadence))
    }

    /// Spacing statistics measured against a given cadence instead of the best fit
    pub fn analyze_as(&self, dates: &[NaiveDate], cadence: Cadence) -> Result<CadenceAnalysis> {
        Ok(self.fit(gaps(dates)?, cadence))
    }

    fn fit(&self, gaps: Vec<i64>, cadence: Cadence) -> CadenceAnalysis {
        let period = cadence.period_days();
        let median_gap = median(&gaps);

        let tolerance = self.date_tolerance_days as f64 * (period / 30.0).max(1.0);
        let within_tolerance = (median_gap - period).abs() <= tolerance;
        let date_std_dev = normalized_dispersion(&gaps, period);
        let clustered = within_tolerance && date_std_dev <= self.max_date_dispersion * period;

        CadenceAnalysis {
            cadence,
            gaps,
            median_gap,
            date_std_dev,
            within_tolerance,
            clustered,
        }
    }
}

fn gaps(dates: &[NaiveDate]) -> Result<Vec<i64>> {
    if dates.len() < 2 {
        return Err(Error::InvalidData(format!(
            "cadence analysis needs at least 2 dates, got {}",
            dates.len()
        )));
    }

    let mut sorted = dates.to_vec();
    sorted.sort();
    Ok(sorted
        .windows(2)
        .map(|w| (w[1] - w[0]).num_days())
        .collect())
}

/// Bucket with the smallest total squared deviation; shorter period wins ties
fn best_bucket(gaps: &[i64]) -> Cadence {
    let mut best = Cadence::ALL[0];
    let mut best_sse = f64::INFINITY;
    for cadence in Cadence::ALL {
        let period = cadence.period_days();
        let sse: f64 = gaps
            .iter()
            .map(|&g| {
                let d = g as f64 - period;
                d * d
            })
            .sum();
        if sse < best_sse {
            best = cadence;
            best_sse = sse;
        }
    }
    best
}

/// How far a gap may sit from a whole number of periods and still count as skipped periods
const SKIP_SNAP: f64 = 0.25;

/// RMS deviation of gaps from `period` after dividing out skipped periods.
///
/// A gap halfway between multiples (21 days against a 14-day period) is not a
/// skipped period; it deviates by its full distance from the nearest multiple.
fn normalized_dispersion(gaps: &[i64], period: f64) -> f64 {
    if gaps.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = gaps
        .iter()
        .map(|&g| {
            let gap = g as f64;
            let ratio = gap / period;
            let periods = ratio.round().max(1.0);
            let d = if (ratio - periods).abs() <= SKIP_SNAP {
                gap / periods - period
            } else {
                gap - periods * period
            };
            d * d
        })
        .sum();
    (sum_sq / gaps.len() as f64).sqrt()
}

fn median(values: &[i64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
    } else {
        sorted[mid] as f64
    }
}
