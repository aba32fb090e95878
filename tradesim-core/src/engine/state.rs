//! Simulation configuration, mutable state, and run result types.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{EquityPoint, PortfolioState, Trade};

use super::error::MissedEntry;

/// Capital figure the sizing fraction multiplies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingBasis {
    /// Current cash: gains and losses compound.
    #[default]
    Cash,
    /// The starting capital, every time.
    InitialCapital,
}

/// What to do when consecutive bars are further apart than the timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapPolicy {
    #[default]
    Abort,
    /// Fill gaps with flat bars at the previous close.
    CarryForward,
}

/// Configuration for a single simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    pub initial_capital: f64,
    pub sizing_basis: SizingBasis,
    /// Entries committing less than this are skipped.
    pub min_order_notional: f64,
    /// Signals delivered later than this after emission are dropped.
    pub max_signal_lag: Option<Duration>,
    /// SCALE_OUT fraction when the signal carries no `fraction` metadata.
    pub scale_out_fraction: f64,
    pub gap_policy: GapPolicy,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000_000.0,
            sizing_basis: SizingBasis::Cash,
            min_order_notional: 0.0,
            max_signal_lag: None,
            scale_out_fraction: 0.5,
            gap_policy: GapPolicy::Abort,
        }
    }
}

impl SimConfig {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            ..Default::default()
        }
    }
}

/// Position lifecycle. At most one position exists, so the phase is global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Flat,
    Entering,
    Open,
    Exiting,
}

impl Phase {
    pub fn can_transition_to(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Flat, Phase::Entering)
                | (Phase::Entering, Phase::Open)
                | (Phase::Entering, Phase::Flat)
                | (Phase::Open, Phase::Exiting)
                | (Phase::Exiting, Phase::Open)
                | (Phase::Exiting, Phase::Flat)
        )
    }
}

/// Counters and diagnostics for one simulation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub bars_processed: usize,
    /// Flat bars synthesized by the carry-forward gap policy.
    pub synthesized_bars: usize,
    pub signals_delivered: usize,
    pub entries: usize,
    pub scale_ins: usize,
    pub full_exits: usize,
    pub partial_exits: usize,
    /// BUY while open, exits while flat, CLOSE_SHORT, stale non-entry signals.
    pub ignored_signals: usize,
    pub missed_entries: Vec<MissedEntry>,
    pub exits_by_reason: BTreeMap<String, usize>,
    pub total_fees: f64,
    pub final_equity: f64,
}

impl SimulationReport {
    pub fn missed_entry_count(&self) -> usize {
        self.missed_entries.len()
    }
}

/// Everything a simulation produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutput {
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub report: SimulationReport,
}

impl SimulationOutput {
    pub fn final_equity(&self) -> f64 {
        self.report.final_equity
    }

    pub fn total_return(&self, initial_capital: f64) -> f64 {
        if initial_capital <= 0.0 {
            return 0.0;
        }
        self.report.final_equity / initial_capital - 1.0
    }
}

/// Mutable state that evolves bar-by-bar.
pub struct SimState {
    phase: Phase,
    pub portfolio: PortfolioState,
    pub trades: Vec<Trade>,
    pub report: SimulationReport,
    /// Market state of the latest delivered signal that carried one.
    pub market_state: Option<String>,
}

impl SimState {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            phase: Phase::Flat,
            portfolio: PortfolioState::new(initial_capital),
            trades: Vec::new(),
            report: SimulationReport::default(),
            market_state: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Move to `next`. An illegal transition is a simulator bug.
    pub fn transition(&mut self, next: Phase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal phase transition {:?} -> {:?}",
            self.phase,
            next
        );
        self.phase = next;
    }

    pub fn is_open(&self) -> bool {
        self.phase == Phase::Open
    }

    pub fn into_output(self) -> SimulationOutput {
        SimulationOutput {
            trades: self.trades,
            equity_curve: self.portfolio.equity_curve,
            report: self.report,
        }
    }
}
