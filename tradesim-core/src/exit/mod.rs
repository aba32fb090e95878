//! Exit policies — decide when an open position closes, and at what price.
//!
//! Policies are pure: they see the open [`Position`] and the current
//! [`MarketContext`] and nothing else. Any trailing state is derived from
//! `position.peak_price_since_entry`, which the simulator maintains, so the same
//! policy object can be shared across simulations.
//!
//! ## Implementations
//!
//! - [`FixedExit`] — fixed take-profit / stop-loss percentages
//! - [`DynamicExit`] — TP/SL looked up by strategy tag or regime, with a default
//! - [`TrailingExit`] — stop trailing the peak, ratcheted
//! - [`TimeoutExit`] — close once the holding horizon is reached
//! - [`RegimeGuardExit`] — protective liquidation on an adverse market state
//! - [`CompositeExit`] — ordered list, first non-hold decision wins
//! - [`SignalOnlyExit`] — never exits on its own

pub mod composite;
pub mod dynamic;
pub mod fixed;
pub mod ratchet;
pub mod regime_guard;
pub mod timeout;
pub mod trailing;

pub use composite::CompositeExit;
pub use dynamic::{DynamicExit, DynamicKey, TargetPair};
pub use fixed::FixedExit;
pub use ratchet::ratchet_long;
pub use regime_guard::RegimeGuardExit;
pub use timeout::TimeoutExit;
pub use trailing::TrailingExit;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Bar, ExitReason, Position};

/// What the policy sees on each bar while a position is open.
#[derive(Debug, Clone, Copy)]
pub struct MarketContext<'a> {
    pub bar: &'a Bar,
    pub now: DateTime<Utc>,
    /// Regime tag of the most recent signal delivered so far, if any.
    pub market_state: Option<&'a str>,
}

impl<'a> MarketContext<'a> {
    pub fn new(bar: &'a Bar) -> Self {
        Self {
            bar,
            now: bar.timestamp,
            market_state: None,
        }
    }

    pub fn with_market_state(mut self, state: Option<&'a str>) -> Self {
        self.market_state = state;
        self
    }
}

/// A policy's verdict for one bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExitDecision {
    Hold,
    Exit {
        /// Share of the current quantity to close, in (0, 1].
        fraction: f64,
        price: f64,
        reason: ExitReason,
    },
}

impl ExitDecision {
    pub fn full(price: f64, reason: ExitReason) -> Self {
        ExitDecision::Exit {
            fraction: 1.0,
            price,
            reason,
        }
    }

    pub fn is_hold(&self) -> bool {
        matches!(self, ExitDecision::Hold)
    }
}

/// Trait for exit policies.
pub trait ExitPolicy: Send + Sync {
    /// Short name used in logs and manifests.
    fn name(&self) -> &str;

    fn check(&self, position: &Position, ctx: &MarketContext<'_>) -> ExitDecision;
}

/// Holds until a signal closes the position.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalOnlyExit;

impl ExitPolicy for SignalOnlyExit {
    fn name(&self) -> &str {
        "signal_only"
    }

    fn check(&self, _position: &Position, _ctx: &MarketContext<'_>) -> ExitDecision {
        ExitDecision::Hold
    }
}

/// Fill price if a long stop at `level` is touched during `bar`.
///
/// A gap through the stop fills at the open, otherwise at the stop level.
pub(crate) fn stop_fill(bar: &Bar, level: f64) -> Option<f64> {
    if bar.open <= level {
        Some(bar.open)
    } else if bar.low <= level {
        Some(level)
    } else {
        None
    }
}

/// Fill price if a long target at `level` is touched during `bar`.
pub(crate) fn target_fill(bar: &Bar, level: f64) -> Option<f64> {
    if bar.open >= level {
        Some(bar.open)
    } else if bar.high >= level {
        Some(level)
    } else {
        None
    }
}

/// Stop-loss before take-profit when both levels sit inside one bar.
pub(crate) fn check_levels(
    position: &Position,
    bar: &Bar,
    take_profit_pct: Option<f64>,
    stop_loss_pct: Option<f64>,
) -> ExitDecision {
    if let Some(sl) = stop_loss_pct {
        let level = position.entry_price * (1.0 - sl);
        if let Some(price) = stop_fill(bar, level) {
            return ExitDecision::full(price, ExitReason::StopLoss);
        }
    }
    if let Some(tp) = take_profit_pct {
        let level = position.entry_price * (1.0 + tp);
        if let Some(price) = target_fill(bar, level) {
            return ExitDecision::full(price, ExitReason::TakeProfit);
        }
    }
    ExitDecision::Hold
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn stop_gap_fills_at_open() {
        let b = bar(2, 90.0, 92.0, 88.0, 91.0);
        assert_eq!(stop_fill(&b, 95.0), Some(90.0));
        let b = bar(2, 97.0, 98.0, 94.0, 96.0);
        assert_eq!(stop_fill(&b, 95.0), Some(95.0));
        let b = bar(2, 97.0, 98.0, 96.0, 97.0);
        assert_eq!(stop_fill(&b, 95.0), None);
    }

    #[test]
    fn stop_loss_wins_when_both_levels_inside_bar() {
        let pos = long_at(100.0);
        let wide = bar(2, 100.0, 115.0, 85.0, 100.0);
        let d = check_levels(&pos, &wide, Some(0.10), Some(0.10));
        assert_eq!(d, ExitDecision::full(90.0, ExitReason::StopLoss));
    }

    #[test]
    fn signal_only_always_holds() {
        let pos = long_at(100.0);
        let b = bar(2, 1.0, 1.0, 1.0, 1.0);
        assert!(SignalOnlyExit.check(&pos, &MarketContext::new(&b)).is_hold());
    }
}
