//! Walk-forward validation — training aggregates, horizon selection, degradation.
//!
//! Horizons are ranked on training years only. The winner is then measured on a
//! later, disjoint validation year, and the relative change of a chosen metric
//! from the training mean to the validation value is the degradation. A
//! degradation below the configured threshold flags the selection as overfit.

use serde::{Deserialize, Serialize};

use crate::matrix::EvaluationResult;
use crate::metrics::{mean_f64, PerformanceMetrics};
use crate::scoring::ScoreWeights;

// ─── Configuration ───────────────────────────────────────────────────

/// Metric compared between training and validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationMetric {
    #[default]
    TotalReturn,
    Sharpe,
}

impl DegradationMetric {
    pub fn extract(&self, metrics: &PerformanceMetrics) -> f64 {
        match self {
            Self::TotalReturn => metrics.total_return_pct,
            Self::Sharpe => metrics.sharpe_ratio,
        }
    }

    /// Training-side baseline for this metric.
    pub fn training_mean(&self, agg: &TrainingAggregate) -> f64 {
        match self {
            Self::TotalReturn => agg.mean_return,
            Self::Sharpe => agg.mean_sharpe,
        }
    }
}

// ─── Result types ────────────────────────────────────────────────────

/// One horizon's performance averaged over the training years.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingAggregate {
    pub horizon_hours: u32,
    pub years: Vec<i32>,
    pub mean_return: f64,
    pub mean_sharpe: f64,
    pub mean_max_drawdown: f64,
    pub total_trades: usize,
    pub score: f64,
}

/// How the degradation was computed (or why it wasn't).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DegradationFlag {
    /// Training baseline non-zero, ratio computed normally.
    Normal,
    /// Training baseline is zero: no ratio.
    ZeroBaseline,
}

/// The selected horizon measured out of sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub horizon_hours: u32,
    pub validation_year: i32,
    pub metric: DegradationMetric,
    pub training_value: f64,
    pub validation_value: f64,
    /// `(validation - training) / |training|`; `None` for a zero baseline.
    pub degradation_pct: Option<f64>,
    pub degradation_flag: DegradationFlag,
    pub threshold: f64,
    pub overfit: bool,
}

// ─── Aggregation and selection ───────────────────────────────────────

/// Average the training-year cells of one horizon and score them.
pub fn aggregate_training(
    horizon_hours: u32,
    cells: &[&EvaluationResult],
    weights: &ScoreWeights,
) -> TrainingAggregate {
    let returns: Vec<f64> = cells.iter().map(|c| c.metrics.total_return_pct).collect();
    let sharpes: Vec<f64> = cells.iter().map(|c| c.metrics.sharpe_ratio).collect();
    let drawdowns: Vec<f64> = cells.iter().map(|c| c.metrics.max_drawdown_pct).collect();

    let mean_return = mean_f64(&returns);
    let mean_sharpe = mean_f64(&sharpes);
    let mean_max_drawdown = mean_f64(&drawdowns);

    TrainingAggregate {
        horizon_hours,
        years: cells.iter().map(|c| c.year).collect(),
        mean_return,
        mean_sharpe,
        mean_max_drawdown,
        total_trades: cells.iter().map(|c| c.metrics.trade_count).sum(),
        score: weights.score(mean_return, mean_sharpe, mean_max_drawdown),
    }
}

/// Highest score wins; ties go to the shorter horizon.
pub fn select_horizon(aggregates: &[TrainingAggregate]) -> Option<&TrainingAggregate> {
    let mut best: Option<&TrainingAggregate> = None;
    for agg in aggregates {
        best = match best {
            None => Some(agg),
            Some(current) => {
                let tie = agg.score == current.score;
                if ScoreWeights::is_better(agg.score, current.score)
                    || (tie && agg.horizon_hours < current.horizon_hours)
                {
                    Some(agg)
                } else {
                    Some(current)
                }
            }
        };
    }
    best
}

// ─── Degradation ─────────────────────────────────────────────────────

/// Relative change from the training baseline to the validation value.
///
/// - baseline != 0: `(validation - baseline) / |baseline|` (Normal)
/// - baseline == 0: no ratio (ZeroBaseline)
pub fn compute_degradation(training: f64, validation: f64) -> (Option<f64>, DegradationFlag) {
    if training.abs() < 1e-12 {
        (None, DegradationFlag::ZeroBaseline)
    } else {
        (
            Some((validation - training) / training.abs()),
            DegradationFlag::Normal,
        )
    }
}

/// Compare the selected horizon's validation cell against its training aggregate.
pub fn validate_selection(
    selected: &TrainingAggregate,
    validation: &EvaluationResult,
    metric: DegradationMetric,
    threshold: f64,
) -> ValidationOutcome {
    let training_value = metric.training_mean(selected);
    let validation_value = metric.extract(&validation.metrics);
    let (degradation_pct, degradation_flag) = compute_degradation(training_value, validation_value);
    let overfit = degradation_pct.is_some_and(|d| d < threshold);

    ValidationOutcome {
        horizon_hours: selected.horizon_hours,
        validation_year: validation.year,
        metric,
        training_value,
        validation_value,
        degradation_pct,
        degradation_flag,
        threshold,
        overfit,
    }
}
