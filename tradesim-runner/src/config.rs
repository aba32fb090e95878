//! Serializable evaluation configuration.
//!
//! Loaded from TOML, validated once up front. Any problem is a [`ConfigError`]
//! raised before a single simulation starts.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tradesim_core::domain::Timeframe;
use tradesim_core::engine::{GapPolicy, SimConfig, SizingBasis};
use tradesim_core::factory::{ExitPolicyConfig, FactoryError, SizingPolicyConfig};
use tradesim_core::fees::{FeeModel, SlippageLeg};
use tradesim_core::signals::year_bounds;

use crate::metrics::{MetricsConfig, ReturnBasis};
use crate::scoring::ScoreWeights;
use crate::walk_forward::DegradationMetric;

/// Earliest and latest calendar years accepted in a config.
const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1970..=9998;

/// Fatal setup errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config field '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("invalid policy: {0}")]
    Policy(#[from] FactoryError),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Price window of one matrix cell: `[Jan 1 of year, Jan 1 of year + 1 + horizon)`.
///
/// `None` when either bound is not a representable date.
pub fn cell_window(year: i32, horizon_hours: u32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let (start, end) = year_bounds(year)?;
    let end = end.checked_add_signed(Duration::hours(i64::from(horizon_hours)))?;
    Some((start, end))
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Everything needed to reproduce one evaluation matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvaluationConfig {
    /// Calendar years to evaluate.
    pub years: Vec<i32>,
    /// Holding horizons in hours.
    pub horizons: Vec<u32>,
    pub training_years: Vec<i32>,
    pub validation_year: i32,

    #[serde(default = "default_timeframe")]
    pub timeframe: Timeframe,

    #[serde(default = "default_fee_rate")]
    pub fee_rate: f64,
    #[serde(default = "default_slippage_rate")]
    pub slippage_rate: f64,
    #[serde(default)]
    pub slippage_leg: SlippageLeg,
    #[serde(default = "default_initial_capital")]
    pub initial_capital: f64,

    #[serde(default)]
    pub exit_policy: ExitPolicyConfig,
    #[serde(default)]
    pub position_policy: SizingPolicyConfig,

    #[serde(default)]
    pub score_weights: ScoreWeights,
    #[serde(default = "default_degradation_threshold")]
    pub degradation_threshold: f64,
    #[serde(default)]
    pub degradation_metric: DegradationMetric,

    #[serde(default)]
    pub gap_policy: GapPolicy,
    #[serde(default)]
    pub sizing_basis: SizingBasis,
    #[serde(default)]
    pub return_basis: ReturnBasis,
    /// Annualization factor for bar-basis ratios. Derived from `timeframe` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub periods_per_year: Option<f64>,
    #[serde(default)]
    pub min_order_notional: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_signal_lag_secs: Option<u64>,
    #[serde(default = "default_scale_out_fraction")]
    pub scale_out_fraction: f64,
}

fn default_timeframe() -> Timeframe {
    Timeframe::Hours(1)
}
fn default_fee_rate() -> f64 {
    FeeModel::default().fee_rate
}
fn default_slippage_rate() -> f64 {
    FeeModel::default().slippage_rate
}
fn default_initial_capital() -> f64 {
    SimConfig::default().initial_capital
}
fn default_degradation_threshold() -> f64 {
    -0.20
}
fn default_scale_out_fraction() -> f64 {
    SimConfig::default().scale_out_fraction
}

impl EvaluationConfig {
    /// Config with defaults for everything but the year/horizon layout.
    pub fn new(training_years: Vec<i32>, validation_year: i32, horizons: Vec<u32>) -> Self {
        let mut years = training_years.clone();
        years.push(validation_year);
        Self {
            years,
            horizons,
            training_years,
            validation_year,
            timeframe: default_timeframe(),
            fee_rate: default_fee_rate(),
            slippage_rate: default_slippage_rate(),
            slippage_leg: SlippageLeg::default(),
            initial_capital: default_initial_capital(),
            exit_policy: ExitPolicyConfig::default(),
            position_policy: SizingPolicyConfig::default(),
            score_weights: ScoreWeights::default(),
            degradation_threshold: default_degradation_threshold(),
            degradation_metric: DegradationMetric::default(),
            gap_policy: GapPolicy::default(),
            sizing_basis: SizingBasis::default(),
            return_basis: ReturnBasis::default(),
            periods_per_year: None,
            min_order_notional: 0.0,
            max_signal_lag_secs: None,
            scale_out_fraction: default_scale_out_fraction(),
        }
    }

    /// Load and validate a TOML config file.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML config string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field. Called before any simulation runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.years.is_empty() {
            return Err(invalid("years", "at least one year is required"));
        }
        let years: BTreeSet<i32> = self.years.iter().copied().collect();
        if years.len() != self.years.len() {
            return Err(invalid("years", "years must be unique"));
        }
        if let Some(y) = self.years.iter().find(|y| !YEAR_RANGE.contains(y)) {
            return Err(invalid("years", format!("year {y} is out of range")));
        }

        if self.horizons.is_empty() {
            return Err(invalid("horizons", "at least one horizon is required"));
        }
        if self.horizons.contains(&0) {
            return Err(invalid("horizons", "horizons must be positive hours"));
        }
        let horizons: BTreeSet<u32> = self.horizons.iter().copied().collect();
        if horizons.len() != self.horizons.len() {
            return Err(invalid("horizons", "horizons must be unique"));
        }
        if let (Some(&last_year), Some(&longest)) =
            (years.iter().next_back(), horizons.iter().next_back())
        {
            if cell_window(last_year, longest).is_none() {
                return Err(invalid(
                    "horizons",
                    format!("{longest}h after {last_year} is past the representable date range"),
                ));
            }
        }

        if self.training_years.is_empty() {
            return Err(invalid("training_years", "at least one training year is required"));
        }
        let training: BTreeSet<i32> = self.training_years.iter().copied().collect();
        if training.len() != self.training_years.len() {
            return Err(invalid("training_years", "training years must be unique"));
        }
        if let Some(y) = training.iter().find(|y| !years.contains(y)) {
            return Err(invalid("training_years", format!("{y} is not in years")));
        }
        if !years.contains(&self.validation_year) {
            return Err(invalid(
                "validation_year",
                format!("{} is not in years", self.validation_year),
            ));
        }
        if let Some(&last_training) = training.iter().next_back() {
            if self.validation_year <= last_training {
                return Err(invalid(
                    "validation_year",
                    format!(
                        "{} must be later than every training year (latest {last_training})",
                        self.validation_year
                    ),
                ));
            }
        }

        if !self.fee_model().is_valid() {
            return Err(invalid(
                "fee_rate",
                format!(
                    "fee_rate {} and slippage_rate {} must be finite and in [0, 1)",
                    self.fee_rate, self.slippage_rate
                ),
            ));
        }
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(invalid(
                "initial_capital",
                format!("must be positive, got {}", self.initial_capital),
            ));
        }

        self.exit_policy.validate()?;
        self.position_policy.validate()?;
        self.score_weights
            .validate()
            .map_err(|reason| invalid("score_weights", reason))?;

        if !self.degradation_threshold.is_finite() || self.degradation_threshold > 0.0 {
            return Err(invalid(
                "degradation_threshold",
                format!("must be finite and <= 0, got {}", self.degradation_threshold),
            ));
        }
        if let Some(p) = self.periods_per_year {
            if !p.is_finite() || p <= 0.0 {
                return Err(invalid("periods_per_year", format!("must be positive, got {p}")));
            }
        }
        if !self.min_order_notional.is_finite() || self.min_order_notional < 0.0 {
            return Err(invalid(
                "min_order_notional",
                format!("must be >= 0, got {}", self.min_order_notional),
            ));
        }
        if self.max_signal_lag_secs == Some(0) {
            return Err(invalid("max_signal_lag_secs", "must be positive when set"));
        }
        if !(self.scale_out_fraction > 0.0 && self.scale_out_fraction <= 1.0) {
            return Err(invalid(
                "scale_out_fraction",
                format!("must be in (0, 1], got {}", self.scale_out_fraction),
            ));
        }
        Ok(())
    }

    pub fn fee_model(&self) -> FeeModel {
        FeeModel::new(self.fee_rate, self.slippage_rate, self.slippage_leg)
    }

    pub fn sim_config(&self) -> SimConfig {
        SimConfig {
            initial_capital: self.initial_capital,
            sizing_basis: self.sizing_basis,
            min_order_notional: self.min_order_notional,
            max_signal_lag: self
                .max_signal_lag_secs
                .map(|secs| Duration::seconds(secs.min(i64::MAX as u64) as i64)),
            scale_out_fraction: self.scale_out_fraction,
            gap_policy: self.gap_policy,
        }
    }

    pub fn metrics_config(&self) -> MetricsConfig {
        MetricsConfig {
            initial_capital: self.initial_capital,
            return_basis: self.return_basis,
            periods_per_year: self
                .periods_per_year
                .unwrap_or_else(|| self.timeframe.periods_per_year()),
        }
    }

    /// Years that are neither training nor validation still get a matrix row.
    pub fn non_validation_years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self
            .years
            .iter()
            .copied()
            .filter(|y| *y != self.validation_year)
            .collect();
        years.sort_unstable();
        years
    }

    pub fn sorted_horizons(&self) -> Vec<u32> {
        let mut horizons = self.horizons.clone();
        horizons.sort_unstable();
        horizons
    }

    /// BLAKE3 over the canonical JSON form. Identical configs hash identically.
    pub fn config_hash(&self) -> Result<String, ConfigError> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
years = [2021, 2022, 2023, 2024]
horizons = [24, 72, 168]
training_years = [2021, 2022, 2023]
validation_year = 2024
fee_rate = 0.0009
slippage_rate = 0.0005
slippage_leg = "both"
initial_capital = 10000000.0
degradation_threshold = -0.25
degradation_metric = "sharpe"
gap_policy = "carry_forward"
sizing_basis = "initial_capital"
return_basis = "trade"
max_signal_lag_secs = 3600

[exit_policy]
type = "FIXED"
params = { take_profit_pct = 0.10, stop_loss_pct = 0.05 }

[position_policy]
type = "KELLY"
params = { window = 30, min_trades = 5 }

[score_weights]
return = 0.6
sharpe = 0.4
drawdown = 0.0
"#;

    fn base() -> EvaluationConfig {
        EvaluationConfig::new(vec![2021, 2022], 2023, vec![24, 72])
    }

    #[test]
    fn parses_full_toml() {
        let cfg = EvaluationConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(cfg.years, vec![2021, 2022, 2023, 2024]);
        assert_eq!(cfg.horizons, vec![24, 72, 168]);
        assert_eq!(cfg.slippage_leg, SlippageLeg::Both);
        assert_eq!(cfg.gap_policy, GapPolicy::CarryForward);
        assert_eq!(cfg.sizing_basis, SizingBasis::InitialCapital);
        assert_eq!(cfg.return_basis, ReturnBasis::Trade);
        assert_eq!(cfg.degradation_metric, DegradationMetric::Sharpe);
        assert_eq!(cfg.score_weights, ScoreWeights::new(0.6, 0.4, 0.0));
        assert_eq!(cfg.exit_policy.type_name(), "FIXED");
        assert_eq!(cfg.position_policy.type_name(), "KELLY");
        assert_eq!(cfg.sim_config().max_signal_lag, Some(Duration::hours(1)));
    }

    #[test]
    fn defaults_fill_optional_fields() {
        let cfg = EvaluationConfig::from_toml_str(
            "years = [2022, 2023]\nhorizons = [48]\ntraining_years = [2022]\nvalidation_year = 2023\n",
        )
        .unwrap();
        assert_eq!(cfg.fee_model(), FeeModel::default());
        assert_eq!(cfg.initial_capital, 10_000_000.0);
        assert_eq!(cfg.degradation_threshold, -0.20);
        assert_eq!(cfg.exit_policy, ExitPolicyConfig::SignalOnly);
        assert_eq!(cfg.timeframe, Timeframe::Hours(1));
        assert!((cfg.metrics_config().periods_per_year - 8760.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_policy_type_is_parse_error() {
        let toml = "years = [2022, 2023]\nhorizons = [48]\ntraining_years = [2022]\nvalidation_year = 2023\n[exit_policy]\ntype = \"MOON\"\n";
        assert!(matches!(
            EvaluationConfig::from_toml_str(toml),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn unknown_field_is_parse_error() {
        let toml = "years = [2022, 2023]\nhorizons = [48]\ntraining_years = [2022]\nvalidation_year = 2023\nfee_rat = 0.1\n";
        assert!(matches!(
            EvaluationConfig::from_toml_str(toml),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn zero_horizon_rejected() {
        let mut cfg = base();
        cfg.horizons = vec![24, 0];
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "horizons", .. })
        ));
    }

    #[test]
    fn horizon_past_date_range_rejected() {
        let cfg = EvaluationConfig::new(vec![2021, 2022], 2023, vec![24, u32::MAX]);
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "horizons", .. }));
    }

    #[test]
    fn cell_window_extends_past_year_end() {
        let (start, end) = cell_window(2023, 48).unwrap();
        assert_eq!(start.to_rfc3339(), "2023-01-01T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2024-01-03T00:00:00+00:00");
        assert!(cell_window(2023, u32::MAX).is_none());
    }

    #[test]
    fn validation_year_must_follow_training() {
        let mut cfg = base();
        cfg.years = vec![2020, 2021, 2022];
        cfg.validation_year = 2020;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "validation_year", .. })
        ));
    }

    #[test]
    fn training_year_must_be_listed() {
        let mut cfg = base();
        cfg.training_years = vec![2019, 2021];
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "training_years", .. })
        ));
    }

    #[test]
    fn negative_weight_rejected() {
        let mut cfg = base();
        cfg.score_weights = ScoreWeights::new(1.0, -1.0, 0.0);
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "score_weights", .. })
        ));
    }

    #[test]
    fn invalid_policy_params_rejected() {
        let mut cfg = base();
        cfg.position_policy = SizingPolicyConfig::Fixed { fraction: 1.5 };
        assert!(matches!(cfg.validate(), Err(ConfigError::Policy(_))));
    }

    #[test]
    fn positive_threshold_rejected() {
        let mut cfg = base();
        cfg.degradation_threshold = 0.1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn fee_rate_out_of_range_rejected() {
        let mut cfg = base();
        cfg.fee_rate = 1.5;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "fee_rate", .. })
        ));
    }

    #[test]
    fn config_hash_deterministic() {
        let cfg = base();
        assert_eq!(cfg.config_hash().unwrap(), cfg.config_hash().unwrap());
        assert_eq!(cfg.config_hash().unwrap().len(), 64);
    }

    #[test]
    fn config_hash_changes_with_params() {
        let a = base();
        let mut b = base();
        b.fee_rate = 0.001;
        assert_ne!(a.config_hash().unwrap(), b.config_hash().unwrap());
    }

    #[test]
    fn non_validation_years_sorted() {
        let mut cfg = base();
        cfg.years = vec![2023, 2022, 2021];
        assert_eq!(cfg.non_validation_years(), vec![2021, 2022]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = EvaluationConfig::from_toml_file(Path::new("/nonexistent/eval.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
