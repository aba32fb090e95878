//! Fixed take-profit / stop-loss, both measured from the entry price.

use crate::domain::Position;

use super::{check_levels, ExitDecision, ExitPolicy, MarketContext};

#[derive(Debug, Clone, PartialEq)]
pub struct FixedExit {
    /// Gain that triggers take-profit (0.10 = +10%). `None` disables it.
    pub take_profit_pct: Option<f64>,
    /// Loss that triggers stop-loss (0.05 = -5%). `None` disables it.
    pub stop_loss_pct: Option<f64>,
}

impl FixedExit {
    pub fn new(take_profit_pct: Option<f64>, stop_loss_pct: Option<f64>) -> Self {
        Self {
            take_profit_pct,
            stop_loss_pct,
        }
    }
}

impl ExitPolicy for FixedExit {
    fn name(&self) -> &str {
        "fixed"
    }

    fn check(&self, position: &Position, ctx: &MarketContext<'_>) -> ExitDecision {
        check_levels(position, ctx.bar, self.take_profit_pct, self.stop_loss_pct)
    }
}
