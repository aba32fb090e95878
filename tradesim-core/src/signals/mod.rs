//! Signal store — a validated, strictly time-ordered, read-only signal sequence.
//!
//! Signals come from an external generator. Each one is validated individually;
//! invalid signals are dropped and listed in the [`SignalValidationReport`],
//! never silently repaired.

pub mod validation;

pub use validation::{validate_signal, SignalRejection, SignalValidationReport};

use chrono::{DateTime, Datelike, TimeZone, Utc};
use std::collections::BTreeSet;
use tracing::warn;

use crate::domain::Signal;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalStore {
    signals: Vec<Signal>,
}

impl SignalStore {
    /// Validate `signals` in feed order, keeping the ones that pass.
    pub fn from_signals(signals: Vec<Signal>) -> (Self, SignalValidationReport) {
        let mut report = SignalValidationReport {
            total: signals.len(),
            ..Default::default()
        };
        let mut accepted: Vec<Signal> = Vec::with_capacity(signals.len());

        for signal in signals {
            let previous = accepted.last().map(|s| s.timestamp);
            match validate_signal(&signal, previous) {
                Ok(()) => {
                    report.count_accepted(&signal);
                    accepted.push(signal);
                }
                Err(rejection) => {
                    warn!(%rejection, "signal rejected");
                    report.rejected.push(rejection);
                }
            }
        }

        (Self { signals: accepted }, report)
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Signals with `start <= timestamp < end`.
    pub fn range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> &[Signal] {
        let lo = self.signals.partition_point(|s| s.timestamp < start);
        let hi = self.signals.partition_point(|s| s.timestamp < end);
        &self.signals[lo..hi.max(lo)]
    }

    /// Signals emitted during calendar year `year` (UTC).
    pub fn for_year(&self, year: i32) -> &[Signal] {
        match year_bounds(year) {
            Some((start, end)) => self.range(start, end),
            None => &[],
        }
    }

    /// Calendar years that contain at least one signal, ascending.
    pub fn years(&self) -> BTreeSet<i32> {
        self.signals.iter().map(|s| s.timestamp.year()).collect()
    }
}

/// `[Jan 1 of year, Jan 1 of year + 1)` in UTC.
pub fn year_bounds(year: i32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single()?;
    let end = Utc.with_ymd_and_hms(year + 1, 1, 1, 0, 0, 0).single()?;
    Some((start, end))
}
