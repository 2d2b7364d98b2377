//! Configuration for detection, summaries and AI collaborators
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/recur/config/recur.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Every section is validated into its value object on load. Out-of-range
//! values are rejected with [`Error::InvalidConfig`], never clamped.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/recur.toml");

/// Validated detection thresholds.
///
/// Construct with [`DetectionConfig::new`] or [`DetectionConfig::builder`];
/// fields are read through accessors so a built config is always valid.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionConfig {
    min_occurrences: usize,
    /// Unset: same as `min_occurrences`
    long_cadence_min_occurrences: Option<usize>,
    long_cadence_fixed_min_occurrences: usize,
    amount_tolerance: f64,
    variance_ceiling: f64,
    confirm_ceiling: f64,
    date_tolerance_days: i64,
    max_date_dispersion: f64,
    resolver_confidence_threshold: f64,
    confirmer_confidence_threshold: f64,
    fallback_confidence: f64,
}

impl DetectionConfig {
    /// Build a config from the three primary knobs, other thresholds at defaults
    pub fn new(
        min_occurrences: usize,
        amount_tolerance: f64,
        date_tolerance_days: i64,
    ) -> Result<Self> {
        Self::builder()
            .min_occurrences(min_occurrences)
            .amount_tolerance(amount_tolerance)
            .date_tolerance_days(date_tolerance_days)
            .build()
    }

    pub fn builder() -> DetectionConfigBuilder {
        DetectionConfigBuilder::default()
    }

    /// Builder pre-filled with this config, for overriding single knobs
    pub fn to_builder(&self) -> DetectionConfigBuilder {
        DetectionConfigBuilder {
            min_occurrences: self.min_occurrences,
            long_cadence_min_occurrences: self.long_cadence_min_occurrences,
            long_cadence_fixed_min_occurrences: self.long_cadence_fixed_min_occurrences,
            amount_tolerance: self.amount_tolerance,
            variance_ceiling: self.variance_ceiling,
            confirm_ceiling: self.confirm_ceiling,
            date_tolerance_days: self.date_tolerance_days,
            max_date_dispersion: self.max_date_dispersion,
            resolver_confidence_threshold: self.resolver_confidence_threshold,
            confirmer_confidence_threshold: self.confirmer_confidence_threshold,
            fallback_confidence: self.fallback_confidence,
        }
    }

    /// Minimum occurrences for weekly, biweekly and monthly cadences
    pub fn min_occurrences(&self) -> usize {
        self.min_occurrences
    }

    /// Minimum for quarterly and annual cadences; follows `min_occurrences` unless set
    pub fn long_cadence_min_occurrences(&self) -> usize {
        self.long_cadence_min_occurrences.unwrap_or(self.min_occurrences)
    }

    /// Samples a quarterly/annual group needs before it can be FIXED rather than IRREGULAR
    pub fn long_cadence_fixed_min_occurrences(&self) -> usize {
        self.long_cadence_fixed_min_occurrences
    }

    /// Maximum coefficient of variation for a FIXED amount
    pub fn amount_tolerance(&self) -> f64 {
        self.amount_tolerance
    }

    /// Maximum coefficient of variation for a VARIABLE amount
    pub fn variance_ceiling(&self) -> f64 {
        self.variance_ceiling
    }

    /// Upper coefficient of variation for candidates sent to the amount confirmer
    pub fn confirm_ceiling(&self) -> f64 {
        self.confirm_ceiling
    }

    pub fn date_tolerance_days(&self) -> i64 {
        self.date_tolerance_days
    }

    /// Maximum gap dispersion as a fraction of the cadence period
    pub fn max_date_dispersion(&self) -> f64 {
        self.max_date_dispersion
    }

    pub fn resolver_confidence_threshold(&self) -> f64 {
        self.resolver_confidence_threshold
    }

    pub fn confirmer_confidence_threshold(&self) -> f64 {
        self.confirmer_confidence_threshold
    }

    /// Confidence cap for patterns kept after a collaborator failure
    pub fn fallback_confidence(&self) -> f64 {
        self.fallback_confidence
    }

    /// Minimum occurrences required for a cadence bucket
    pub fn min_occurrences_for(&self, cadence: crate::models::Cadence) -> usize {
        if cadence.is_long() {
            self.long_cadence_min_occurrences()
        } else {
            self.min_occurrences
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        let b = DetectionConfigBuilder::default();
        Self {
            min_occurrences: b.min_occurrences,
            long_cadence_min_occurrences: b.long_cadence_min_occurrences,
            long_cadence_fixed_min_occurrences: b.long_cadence_fixed_min_occurrences,
            amount_tolerance: b.amount_tolerance,
            variance_ceiling: b.variance_ceiling,
            confirm_ceiling: b.confirm_ceiling,
            date_tolerance_days: b.date_tolerance_days,
            max_date_dispersion: b.max_date_dispersion,
            resolver_confidence_threshold: b.resolver_confidence_threshold,
            confirmer_confidence_threshold: b.confirmer_confidence_threshold,
            fallback_confidence: b.fallback_confidence,
        }
    }
}

/// Unvalidated detection settings; also the shape of the `[detection]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectionConfigBuilder {
    min_occurrences: usize,
    /// Unset: same as `min_occurrences`
    long_cadence_min_occurrences: Option<usize>,
    long_cadence_fixed_min_occurrences: usize,
    amount_tolerance: f64,
    variance_ceiling: f64,
    confirm_ceiling: f64,
    date_tolerance_days: i64,
    max_date_dispersion: f64,
    resolver_confidence_threshold: f64,
    confirmer_confidence_threshold: f64,
    fallback_confidence: f64,
}

impl Default for DetectionConfigBuilder {
    fn default() -> Self {
        Self {
            min_occurrences: 3,
            long_cadence_min_occurrences: None,
            long_cadence_fixed_min_occurrences: 4,
            amount_tolerance: 0.02,            // 2% variation
            variance_ceiling: 0.50,            // 50% variation
            confirm_ceiling: 1.0,              // beyond this nothing is plausible
            date_tolerance_days: 7,
            max_date_dispersion: 0.40,         // 40% of the period
            resolver_confidence_threshold: 0.8,
            confirmer_confidence_threshold: 0.7,
            fallback_confidence: 0.3,
        }
    }
}

impl DetectionConfigBuilder {
    pub fn min_occurrences(mut self, value: usize) -> Self {
        self.min_occurrences = value;
        self
    }

    pub fn long_cadence_min_occurrences(mut self, value: usize) -> Self {
        self.long_cadence_min_occurrences = Some(value);
        self
    }

    pub fn long_cadence_fixed_min_occurrences(mut self, value: usize) -> Self {
        self.long_cadence_fixed_min_occurrences = value;
        self
    }

    pub fn amount_tolerance(mut self, value: f64) -> Self {
        self.amount_tolerance = value;
        self
    }

    pub fn variance_ceiling(mut self, value: f64) -> Self {
        self.variance_ceiling = value;
        self
    }

    pub fn confirm_ceiling(mut self, value: f64) -> Self {
        self.confirm_ceiling = value;
        self
    }

    pub fn date_tolerance_days(mut self, value: i64) -> Self {
        self.date_tolerance_days = value;
        self
    }

    pub fn max_date_dispersion(mut self, value: f64) -> Self {
        self.max_date_dispersion = value;
        self
    }

    pub fn resolver_confidence_threshold(mut self, value: f64) -> Self {
        self.resolver_confidence_threshold = value;
        self
    }

    pub fn confirmer_confidence_threshold(mut self, value: f64) -> Self {
        self.confirmer_confidence_threshold = value;
        self
    }

    pub fn fallback_confidence(mut self, value: f64) -> Self {
        self.fallback_confidence = value;
        self
    }

    /// Validate and build
    pub fn build(self) -> Result<DetectionConfig> {
        if self.min_occurrences < 2 {
            return Err(invalid(format!(
                "min_occurrences must be at least 2, got {}",
                self.min_occurrences
            )));
        }
        if let Some(long) = self.long_cadence_min_occurrences {
            if long < 2 || long > self.min_occurrences {
                return Err(invalid(format!(
                    "long_cadence_min_occurrences must be between 2 and min_occurrences ({}), got {}",
                    self.min_occurrences, long
                )));
            }
        }
        if self.long_cadence_fixed_min_occurrences < 2 {
            return Err(invalid(format!(
                "long_cadence_fixed_min_occurrences must be at least 2, got {}",
                self.long_cadence_fixed_min_occurrences
            )));
        }
        check_unit("amount_tolerance", self.amount_tolerance)?;
        // A ceiling at or below amount_tolerance leaves the VARIABLE band empty
        if !(self.variance_ceiling >= 0.0 && self.variance_ceiling <= self.confirm_ceiling) {
            return Err(invalid(format!(
                "variance_ceiling must be between 0 and confirm_ceiling ({}), got {}",
                self.confirm_ceiling, self.variance_ceiling
            )));
        }
        if !self.confirm_ceiling.is_finite() {
            return Err(invalid("confirm_ceiling must be finite".to_string()));
        }
        if self.date_tolerance_days < 0 {
            return Err(invalid(format!(
                "date_tolerance_days must not be negative, got {}",
                self.date_tolerance_days
            )));
        }
        if !(self.max_date_dispersion > 0.0 && self.max_date_dispersion.is_finite()) {
            return Err(invalid(format!(
                "max_date_dispersion must be positive, got {}",
                self.max_date_dispersion
            )));
        }
        check_unit(
            "resolver_confidence_threshold",
            self.resolver_confidence_threshold,
        )?;
        check_unit(
            "confirmer_confidence_threshold",
            self.confirmer_confidence_threshold,
        )?;
        check_unit("fallback_confidence", self.fallback_confidence)?;

        Ok(DetectionConfig {
            min_occurrences: self.min_occurrences,
            long_cadence_min_occurrences: self.long_cadence_min_occurrences,
            long_cadence_fixed_min_occurrences: self.long_cadence_fixed_min_occurrences,
            amount_tolerance: self.amount_tolerance,
            variance_ceiling: self.variance_ceiling,
            confirm_ceiling: self.confirm_ceiling,
            date_tolerance_days: self.date_tolerance_days,
            max_date_dispersion: self.max_date_dispersion,
            resolver_confidence_threshold: self.resolver_confidence_threshold,
            confirmer_confidence_threshold: self.confirmer_confidence_threshold,
            fallback_confidence: self.fallback_confidence,
        })
    }
}

/// Summary thresholds
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryConfig {
    low_confidence_threshold: f64,
    commonly_duplicated: BTreeSet<String>,
}

impl SummaryConfig {
    pub fn new<I, S>(low_confidence_threshold: f64, commonly_duplicated: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        check_unit("low_confidence_threshold", low_confidence_threshold)?;
        Ok(Self {
            low_confidence_threshold,
            commonly_duplicated: commonly_duplicated
                .into_iter()
                .map(|c| c.into().to_lowercase())
                .collect(),
        })
    }

    pub fn low_confidence_threshold(&self) -> f64 {
        self.low_confidence_threshold
    }

    /// Categories where two subscriptions already count as a likely duplicate
    pub fn commonly_duplicated(&self) -> &BTreeSet<String> {
        &self.commonly_duplicated
    }
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            low_confidence_threshold: 0.6,
            commonly_duplicated: ["streaming", "cloud_storage", "music"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SummarySection {
    low_confidence_threshold: f64,
    commonly_duplicated: Vec<String>,
}

impl Default for SummarySection {
    fn default() -> Self {
        let defaults = SummaryConfig::default();
        Self {
            low_confidence_threshold: defaults.low_confidence_threshold,
            commonly_duplicated: defaults.commonly_duplicated.into_iter().collect(),
        }
    }
}

/// Limits applied by the AI collaborator adapter
#[derive(Debug, Clone, PartialEq)]
pub struct AiSettings {
    /// Per-call timeout
    pub timeout: Duration,
    /// Estimated cost charged against the budget per model call
    pub cost_per_call: f64,
    /// Spend ceiling per calendar day (0 disables AI calls)
    pub daily_budget: f64,
    /// Spend ceiling per calendar month (0 disables AI calls)
    pub monthly_budget: f64,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            cost_per_call: 0.002,
            daily_budget: 1.0,
            monthly_budget: 20.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct AiSection {
    timeout_secs: u64,
    cost_per_call: f64,
    daily_budget: f64,
    monthly_budget: f64,
}

impl Default for AiSection {
    fn default() -> Self {
        let defaults = AiSettings::default();
        Self {
            timeout_secs: defaults.timeout.as_secs(),
            cost_per_call: defaults.cost_per_call,
            daily_budget: defaults.daily_budget,
            monthly_budget: defaults.monthly_budget,
        }
    }
}

impl TryFrom<AiSection> for AiSettings {
    type Error = Error;

    fn try_from(section: AiSection) -> Result<Self> {
        if section.timeout_secs == 0 {
            return Err(invalid("ai.timeout_secs must be positive".to_string()));
        }
        for (name, value) in [
            ("ai.cost_per_call", section.cost_per_call),
            ("ai.daily_budget", section.daily_budget),
            ("ai.monthly_budget", section.monthly_budget),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(invalid(format!("{} must be non-negative, got {}", name, value)));
            }
        }
        Ok(Self {
            timeout: Duration::from_secs(section.timeout_secs),
            cost_per_call: section.cost_per_call,
            daily_budget: section.daily_budget,
            monthly_budget: section.monthly_budget,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    detection: DetectionConfigBuilder,
    summary: SummarySection,
    ai: AiSection,
    aliases: BTreeMap<String, String>,
    categories: HashMap<String, String>,
}

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct RecurConfig {
    pub detection: DetectionConfig,
    pub summary: SummaryConfig,
    pub ai: AiSettings,
    /// Extra merchant aliases (cleaned name -> canonical name)
    pub aliases: BTreeMap<String, String>,
    /// Category map (canonical merchant -> category)
    pub categories: HashMap<String, String>,
}

impl RecurConfig {
    /// Load configuration: data-dir override if present, else embedded defaults
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::override_path() {
            if path.exists() {
                debug!(path = %path.display(), "Loading config override");
                return Self::from_path(&path);
            }
        }
        Self::from_toml_str(DEFAULT_CONFIG)
    }

    /// Load configuration from an explicit file
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(contents)?;

        let aliases = raw
            .aliases
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v.to_lowercase()))
            .collect();
        let categories = raw
            .categories
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v.to_lowercase()))
            .collect();

        Ok(Self {
            detection: raw.detection.build()?,
            summary: SummaryConfig::new(
                raw.summary.low_confidence_threshold,
                raw.summary.commonly_duplicated,
            )?,
            ai: raw.ai.try_into()?,
            aliases,
            categories,
        })
    }

    /// Location of the user override file
    pub fn override_path() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("recur").join("config").join("recur.toml"))
    }
}

impl Default for RecurConfig {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            summary: SummaryConfig::default(),
            ai: AiSettings::default(),
            aliases: BTreeMap::new(),
            categories: HashMap::new(),
        }
    }
}

fn invalid(message: String) -> Error {
    Error::InvalidConfig(message)
}

fn check_unit(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(format!("{} must be within [0, 1], got {}", name, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cadence;

    #[test]
    fn test_detection_config_defaults() {
        let config = DetectionConfig::default();
        assert_eq!(config.min_occurrences(), 3);
        assert_eq!(config.long_cadence_min_occurrences(), 3);
        assert_eq!(config.amount_tolerance(), 0.02);
        assert_eq!(config.variance_ceiling(), 0.50);
        assert_eq!(config.date_tolerance_days(), 7);
        assert_eq!(config.resolver_confidence_threshold(), 0.8);
        assert_eq!(config.fallback_confidence(), 0.3);
        assert_eq!(DetectionConfig::builder().build().unwrap(), config);
    }

    #[test]
    fn test_detection_config_rejects_out_of_range_values() {
        let err = DetectionConfig::new(1, 0.02, 7).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(err.to_string().contains("min_occurrences"));

        assert!(DetectionConfig::new(3, 1.5, 7).is_err());
        assert!(DetectionConfig::new(3, -0.01, 7).is_err());
        assert!(DetectionConfig::new(3, 0.02, -1).is_err());
        assert!(DetectionConfig::new(2, 0.02, 0).is_ok());
    }

    #[test]
    fn test_detection_config_accepts_full_amount_tolerance_range() {
        for tolerance in [0.0, 0.5, 0.75, 1.0] {
            let config = DetectionConfig::new(3, tolerance, 7).unwrap();
            assert_eq!(config.amount_tolerance(), tolerance);
        }
    }

    #[test]
    fn test_long_cadence_floor_follows_min_occurrences() {
        let relaxed = DetectionConfig::new(2, 0.02, 7).unwrap();
        assert_eq!(relaxed.min_occurrences_for(Cadence::Annual), 2);

        let strict = DetectionConfig::new(5, 0.02, 7).unwrap();
        assert_eq!(strict.min_occurrences_for(Cadence::Quarterly), 5);

        let explicit = DetectionConfig::builder()
            .long_cadence_min_occurrences(2)
            .build()
            .unwrap();
        assert_eq!(explicit.min_occurrences_for(Cadence::Annual), 2);
        assert_eq!(explicit.min_occurrences_for(Cadence::Monthly), 3);
    }

    #[test]
    fn test_detection_config_rejects_inconsistent_thresholds() {
        assert!(DetectionConfig::builder()
            .variance_ceiling(1.5)
            .build()
            .is_err());
        assert!(DetectionConfig::builder()
            .min_occurrences(3)
            .long_cadence_min_occurrences(4)
            .build()
            .is_err());
        assert!(DetectionConfig::builder()
            .max_date_dispersion(0.0)
            .build()
            .is_err());
    }

    #[test]
    fn test_min_occurrences_for_cadence() {
        let config = DetectionConfig::default();
        assert_eq!(config.min_occurrences_for(Cadence::Monthly), 3);
        assert_eq!(config.min_occurrences_for(Cadence::Annual), 3);
    }

    #[test]
    fn test_to_builder_overrides_one_knob() {
        let base = DetectionConfig::builder().max_date_dispersion(0.3).build().unwrap();
        let tuned = base.to_builder().min_occurrences(5).build().unwrap();
        assert_eq!(tuned.min_occurrences(), 5);
        assert_eq!(tuned.max_date_dispersion(), 0.3);
    }

    #[test]
    fn test_embedded_default_config_parses() {
        let config = RecurConfig::from_toml_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.detection, DetectionConfig::default());
        assert_eq!(config.summary, SummaryConfig::default());
        assert_eq!(config.ai, AiSettings::default());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = RecurConfig::from_toml_str(
            r#"
            [detection]
            min_occurrences = 4

            [aliases]
            "Acme Strm" = "acme streaming"

            [categories]
            "acme streaming" = "Streaming"
            "#,
        )
        .unwrap();

        assert_eq!(config.detection.min_occurrences(), 4);
        assert_eq!(config.detection.amount_tolerance(), 0.02);
        assert_eq!(config.aliases.get("acme strm").unwrap(), "acme streaming");
        assert_eq!(config.categories.get("acme streaming").unwrap(), "streaming");
    }

    #[test]
    fn test_invalid_config_file_is_rejected() {
        let err = RecurConfig::from_toml_str("[detection]\nmin_occurrences = 1\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));

        let err = RecurConfig::from_toml_str("[detection]\nunknown_knob = 3\n").unwrap_err();
        assert!(matches!(err, Error::Toml(_)));

        let err = RecurConfig::from_toml_str("[ai]\ntimeout_secs = 0\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recur.toml");
        fs::write(&path, "[summary]\nlow_confidence_threshold = 0.5\n").unwrap();

        let config = RecurConfig::from_path(&path).unwrap();
        assert_eq!(config.summary.low_confidence_threshold(), 0.5);
        assert!(config.summary.commonly_duplicated().contains("streaming"));
    }
}
