//! Dynamic take-profit / stop-loss, looked up per strategy tag or regime.
//!
//! Tags are matched verbatim. A position whose tag is missing or unknown uses
//! the default pair.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::Position;

use super::{check_levels, ExitDecision, ExitPolicy, MarketContext};

/// Take-profit / stop-loss fractions for one tag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetPair {
    #[serde(default)]
    pub take_profit_pct: Option<f64>,
    #[serde(default)]
    pub stop_loss_pct: Option<f64>,
}

/// Which tag selects the target pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DynamicKey {
    /// The position's `strategy_tag`, fixed at entry.
    #[default]
    StrategyTag,
    /// The market state of the entry signal.
    EntryRegime,
    /// The market state current on this bar.
    CurrentRegime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DynamicExit {
    pub key: DynamicKey,
    pub targets: BTreeMap<String, TargetPair>,
    pub default: TargetPair,
}

impl DynamicExit {
    pub fn new(key: DynamicKey, targets: BTreeMap<String, TargetPair>, default: TargetPair) -> Self {
        Self {
            key,
            targets,
            default,
        }
    }

    fn pair_for(&self, position: &Position, ctx: &MarketContext<'_>) -> TargetPair {
        let tag = match self.key {
            DynamicKey::StrategyTag => position.strategy_tag.as_deref(),
            DynamicKey::EntryRegime => position.entry_market_state.as_deref(),
            DynamicKey::CurrentRegime => ctx.market_state,
        };
        tag.and_then(|t| self.targets.get(t))
            .copied()
            .unwrap_or(self.default)
    }
}

impl ExitPolicy for DynamicExit {
    fn name(&self) -> &str {
        "dynamic"
    }

    fn check(&self, position: &Position, ctx: &MarketContext<'_>) -> ExitDecision {
        let pair = self.pair_for(position, ctx);
        check_levels(position, ctx.bar, pair.take_profit_pct, pair.stop_loss_pct)
    }
}
