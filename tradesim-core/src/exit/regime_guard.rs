//! Regime guard — protective liquidation when the market state turns adverse.
//!
//! The current state is whatever tag the latest delivered signal carried. It is
//! compared verbatim against the configured adverse set; tags from different
//! classifiers are not reconciled here.

use std::collections::BTreeSet;

use crate::domain::{ExitReason, Position};

use super::{ExitDecision, ExitPolicy, MarketContext};

#[derive(Debug, Clone, PartialEq)]
pub struct RegimeGuardExit {
    pub adverse_states: BTreeSet<String>,
    /// Only fire when the current state differs from the entry state.
    pub on_change_only: bool,
}

impl RegimeGuardExit {
    pub fn new<I, S>(adverse_states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            adverse_states: adverse_states.into_iter().map(Into::into).collect(),
            on_change_only: true,
        }
    }

    pub fn with_on_change_only(mut self, on_change_only: bool) -> Self {
        self.on_change_only = on_change_only;
        self
    }
}

impl ExitPolicy for RegimeGuardExit {
    fn name(&self) -> &str {
        "regime_guard"
    }

    fn check(&self, position: &Position, ctx: &MarketContext<'_>) -> ExitDecision {
        let Some(state) = ctx.market_state else {
            return ExitDecision::Hold;
        };
        if !self.adverse_states.contains(state) {
            return ExitDecision::Hold;
        }
        if self.on_change_only && position.entry_market_state.as_deref() == Some(state) {
            return ExitDecision::Hold;
        }
        ExitDecision::full(ctx.bar.close, ExitReason::RegimeChange)
    }
}
