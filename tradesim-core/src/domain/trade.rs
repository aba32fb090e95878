//! Trade — a closed (or partially closed) position appended to the ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a position (or part of it) was closed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    TrailingStop,
    Timeout,
    /// Protective liquidation on an adverse market-state change.
    RegimeChange,
    /// SELL / CLOSE_LONG signal.
    Signal,
    /// SCALE_OUT signal.
    ScaleOut,
    /// Position still open when the price series ran out.
    EndOfData,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::TakeProfit => "take_profit",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::Timeout => "timeout",
            ExitReason::RegimeChange => "regime_change",
            ExitReason::Signal => "signal",
            ExitReason::ScaleOut => "scale_out",
            ExitReason::EndOfData => "end_of_data",
        };
        f.write_str(s)
    }
}

/// Immutable round-trip record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    // ── Entry ──
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,

    // ── Exit ──
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,

    // ── Size ──
    pub quantity: f64,
    pub capital_committed: f64,

    // ── Costs and proceeds ──
    pub entry_fee: f64,
    pub exit_fee: f64,
    pub net_proceeds: f64,
    /// `(net_proceeds - capital_committed) / capital_committed`.
    pub return_pct: f64,

    pub exit_reason: ExitReason,
    /// Seconds between entry and exit.
    pub hold_duration: i64,
    /// True when only part of the position was closed.
    pub partial: bool,
    pub strategy_tag: Option<String>,
}

impl Trade {
    /// Return on committed capital. The only input to win/loss classification.
    pub fn compute_return(net_proceeds: f64, capital_committed: f64) -> f64 {
        (net_proceeds - capital_committed) / capital_committed
    }

    pub fn is_win(&self) -> bool {
        self.return_pct > 0.0
    }

    pub fn is_loss(&self) -> bool {
        self.return_pct < 0.0
    }

    /// Profit in currency on the committed capital.
    pub fn net_pnl(&self) -> f64 {
        self.net_proceeds - self.capital_committed
    }
}
