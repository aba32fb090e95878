//! Simulation errors and the recoverable "entry skipped" outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal for one simulation. Nothing is converted into a numeric default.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("price series is empty")]
    EmptySeries,
    #[error("bar at {timestamp} is malformed")]
    InvalidBar { timestamp: DateTime<Utc> },
    #[error("price gap after {at}: expected next bar at {expected}, found {found}")]
    DataGap {
        at: DateTime<Utc>,
        expected: DateTime<Utc>,
        found: DateTime<Utc>,
    },
    #[error("invalid simulation config: {0}")]
    InvalidConfig(String),
}

/// An entry (or scale-in) that was not taken. The run continues.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MissedEntry {
    #[error("{at}: entry needs {required:.2} but only {available:.2} cash is available")]
    InsufficientCapital {
        at: DateTime<Utc>,
        required: f64,
        available: f64,
    },
    #[error("{at}: sizing policy returned zero")]
    ZeroSize { at: DateTime<Utc> },
    #[error("{at}: order notional {notional:.2} is below the minimum {minimum:.2}")]
    BelowMinimum {
        at: DateTime<Utc>,
        notional: f64,
        minimum: f64,
    },
    #[error("{at}: signal delivered {lag_secs}s after emission, beyond the allowed lag")]
    Stale { at: DateTime<Utc>, lag_secs: i64 },
}

impl MissedEntry {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            MissedEntry::InsufficientCapital { at, .. }
            | MissedEntry::ZeroSize { at }
            | MissedEntry::BelowMinimum { at, .. }
            | MissedEntry::Stale { at, .. } => *at,
        }
    }
}
