//! Percent trailing stop — trail at a fixed fraction below the peak since entry.
//!
//! stop = max(initial stop, peak * (1 - trail_pct)), once armed.
//! The peak is maintained by the simulator from bar highs and never falls, so
//! the stop only tightens.
//!
//! An exit is reported as `StopLoss` while the initial stop is strictly tighter
//! than the trail (or the trail is not armed). Once the trail reaches the
//! initial level, ties included, it is a `TrailingStop`.

use crate::domain::{ExitReason, Position};

use super::ratchet::tightest;
use super::{stop_fill, ExitDecision, ExitPolicy, MarketContext};

#[derive(Debug, Clone, PartialEq)]
pub struct TrailingExit {
    /// Trail distance as a fraction (0.10 = 10% below the peak).
    pub trail_pct: f64,
    /// Gain over entry the peak must reach before the trail arms. `None` arms immediately.
    pub activation_pct: Option<f64>,
    /// Protective stop below entry, active from the first bar.
    pub initial_stop_pct: Option<f64>,
}

impl TrailingExit {
    pub fn new(trail_pct: f64) -> Self {
        Self {
            trail_pct,
            activation_pct: None,
            initial_stop_pct: None,
        }
    }

    pub fn with_activation(mut self, activation_pct: f64) -> Self {
        self.activation_pct = Some(activation_pct);
        self
    }

    pub fn with_initial_stop(mut self, stop_pct: f64) -> Self {
        self.initial_stop_pct = Some(stop_pct);
        self
    }

    fn initial_level(&self, position: &Position) -> Option<f64> {
        self.initial_stop_pct
            .map(|s| position.entry_price * (1.0 - s))
    }

    fn trail_level(&self, position: &Position) -> Option<f64> {
        let peak = position.peak_price_since_entry;
        let armed = self
            .activation_pct
            .map_or(true, |a| peak >= position.entry_price * (1.0 + a));
        armed.then(|| peak * (1.0 - self.trail_pct))
    }

    /// Current stop level for `position`, if any is active.
    pub fn stop_level(&self, position: &Position) -> Option<f64> {
        let initial = self.initial_level(position);
        tightest(initial.into_iter().chain(self.trail_level(position)))
    }
}

impl ExitPolicy for TrailingExit {
    fn name(&self) -> &str {
        "trailing"
    }

    fn check(&self, position: &Position, ctx: &MarketContext<'_>) -> ExitDecision {
        let Some(level) = self.stop_level(position) else {
            return ExitDecision::Hold;
        };
        match stop_fill(ctx.bar, level) {
            Some(price) => {
                let reason = match (self.initial_level(position), self.trail_level(position)) {
                    (Some(_), None) => ExitReason::StopLoss,
                    (Some(initial), Some(trail)) if trail < initial => ExitReason::StopLoss,
                    _ => ExitReason::TrailingStop,
                };
                ExitDecision::full(price, reason)
            }
            None => ExitDecision::Hold,
        }
    }
}
