//! False-positive screening
//!
//! Checks run in stages as detection learns more about a group. The first
//! failing check decides the rejection reason.

use crate::amount::{AmountAnalysis, AmountVerdict};
use crate::cadence::CadenceAnalysis;
use crate::config::DetectionConfig;
use crate::group::TransactionGroup;
use crate::models::DetectionStats;

/// Why a group produced no pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Generic,
    InsufficientOccurrences,
    IrregularDates,
    IrregularAmount,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generic => "generic merchant",
            Self::InsufficientOccurrences => "insufficient occurrences",
            Self::IrregularDates => "irregular dates",
            Self::IrregularAmount => "irregular amount",
        }
    }

    /// Count this rejection in the run statistics
    pub fn record(&self, stats: &mut DetectionStats) {
        match self {
            Self::Generic => stats.rejected_generic += 1,
            Self::InsufficientOccurrences => stats.rejected_insufficient_occurrences += 1,
            Self::IrregularDates => stats.rejected_irregular_dates += 1,
            Self::IrregularAmount => stats.rejected_irregular_amount += 1,
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub struct FalsePositiveFilter<'c> {
    config: &'c DetectionConfig,
}

impl<'c> FalsePositiveFilter<'c> {
    pub fn new(config: &'c DetectionConfig) -> Self {
        Self { config }
    }

    /// Checks that need only the group itself
    pub fn screen_group(&self, group: &TransactionGroup<'_>) -> Result<(), Rejection> {
        if group.generic {
            return Err(Rejection::Generic);
        }
        if group.len() < 2 {
            return Err(Rejection::InsufficientOccurrences);
        }
        Ok(())
    }

    /// Occurrence floor for the inferred bucket, then date clustering
    pub fn screen_cadence(
        &self,
        occurrence_count: usize,
        cadence: &CadenceAnalysis,
    ) -> Result<(), Rejection> {
        if occurrence_count < self.config.min_occurrences_for(cadence.cadence) {
            return Err(Rejection::InsufficientOccurrences);
        }
        if !cadence.clustered {
            return Err(Rejection::IrregularDates);
        }
        Ok(())
    }

    /// Amount sanity; plausible candidates pass only once confirmed
    pub fn screen_amount(&self, amount: &AmountAnalysis, confirmed: bool) -> Result<(), Rejection> {
        match amount.verdict {
            AmountVerdict::Fixed | AmountVerdict::Variable | AmountVerdict::Irregular => Ok(()),
            AmountVerdict::Plausible if confirmed => Ok(()),
            AmountVerdict::Plausible | AmountVerdict::Noise => Err(Rejection::IrregularAmount),
        }
    }
}
