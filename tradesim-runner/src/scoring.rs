//! Composite training score — how horizons are ranked against each other.

use serde::{Deserialize, Serialize};

use crate::walk_forward::TrainingAggregate;

/// Weights for the composite score:
/// `return × mean_return + sharpe × mean_sharpe + drawdown × 1/(1 + |mean_max_dd|)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoreWeights {
    #[serde(rename = "return")]
    pub return_weight: f64,
    pub sharpe: f64,
    pub drawdown: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            return_weight: 0.5,
            sharpe: 0.3,
            drawdown: 0.2,
        }
    }
}

impl ScoreWeights {
    pub fn new(return_weight: f64, sharpe: f64, drawdown: f64) -> Self {
        Self {
            return_weight,
            sharpe,
            drawdown,
        }
    }

    /// Each weight must be finite and non-negative, and at least one positive.
    pub fn validate(&self) -> Result<(), String> {
        for (name, w) in [
            ("return", self.return_weight),
            ("sharpe", self.sharpe),
            ("drawdown", self.drawdown),
        ] {
            if !w.is_finite() || w < 0.0 {
                return Err(format!("weight '{name}' must be finite and >= 0, got {w}"));
            }
        }
        if self.return_weight + self.sharpe + self.drawdown <= 0.0 {
            return Err("at least one score weight must be positive".into());
        }
        Ok(())
    }

    /// Score raw training means.
    pub fn score(&self, mean_return: f64, mean_sharpe: f64, mean_max_drawdown: f64) -> f64 {
        self.return_weight * mean_return
            + self.sharpe * mean_sharpe
            + self.drawdown * (1.0 / (1.0 + mean_max_drawdown.abs()))
    }

    pub fn score_aggregate(&self, agg: &TrainingAggregate) -> f64 {
        self.score(agg.mean_return, agg.mean_sharpe, agg.mean_max_drawdown)
    }

    /// Compare two scores. Returns true if `a` is better than `b`.
    ///
    /// NaN never wins.
    pub fn is_better(a: f64, b: f64) -> bool {
        match (a.is_nan(), b.is_nan()) {
            (true, _) => false,
            (false, true) => true,
            _ => a > b,
        }
    }
}
