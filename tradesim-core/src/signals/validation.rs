//! Per-signal validation and the summary the run reports alongside its results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Signal, SignalAction};

/// Why a single signal was dropped. The run continues without it.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalRejection {
    #[error("signal at {timestamp} is not after the previous accepted signal at {previous}")]
    OutOfOrder {
        timestamp: DateTime<Utc>,
        previous: DateTime<Utc>,
    },
    /// `price` is the offending value as text, so NaN and infinities survive JSON.
    #[error("signal at {timestamp} has invalid price {price}")]
    InvalidPrice {
        timestamp: DateTime<Utc>,
        price: String,
    },
    #[error("signal at {timestamp} has confidence {confidence} outside [0, 1]")]
    ConfidenceOutOfRange {
        timestamp: DateTime<Utc>,
        confidence: String,
    },
    #[error("line {line}: {message}")]
    Unparseable { line: usize, message: String },
}

impl SignalRejection {
    /// Timestamp of the rejected signal, when it got far enough to have one.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            SignalRejection::OutOfOrder { timestamp, .. }
            | SignalRejection::InvalidPrice { timestamp, .. }
            | SignalRejection::ConfidenceOutOfRange { timestamp, .. } => Some(*timestamp),
            SignalRejection::Unparseable { .. } => None,
        }
    }
}

/// Check one signal against the last accepted timestamp.
pub fn validate_signal(
    signal: &Signal,
    previous: Option<DateTime<Utc>>,
) -> Result<(), SignalRejection> {
    if !signal.price.is_finite() || signal.price <= 0.0 {
        return Err(SignalRejection::InvalidPrice {
            timestamp: signal.timestamp,
            price: signal.price.to_string(),
        });
    }
    if let Some(c) = signal.confidence {
        if !(0.0..=1.0).contains(&c) {
            return Err(SignalRejection::ConfidenceOutOfRange {
                timestamp: signal.timestamp,
                confidence: c.to_string(),
            });
        }
    }
    if let Some(prev) = previous {
        if signal.timestamp <= prev {
            return Err(SignalRejection::OutOfOrder {
                timestamp: signal.timestamp,
                previous: prev,
            });
        }
    }
    Ok(())
}

/// Summary of a signal feed after validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalValidationReport {
    pub total: usize,
    pub accepted: usize,
    pub rejected: Vec<SignalRejection>,
    pub buys: usize,
    pub sells: usize,
    pub close_longs: usize,
    pub close_shorts: usize,
    pub scale_ins: usize,
    pub scale_outs: usize,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
}

impl SignalValidationReport {
    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }

    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }

    pub(crate) fn count_accepted(&mut self, signal: &Signal) {
        self.accepted += 1;
        match signal.action {
            SignalAction::Buy => self.buys += 1,
            SignalAction::Sell => self.sells += 1,
            SignalAction::CloseLong => self.close_longs += 1,
            SignalAction::CloseShort => self.close_shorts += 1,
            SignalAction::ScaleIn => self.scale_ins += 1,
            SignalAction::ScaleOut => self.scale_outs += 1,
        }
        if self.first_timestamp.is_none() {
            self.first_timestamp = Some(signal.timestamp);
        }
        self.last_timestamp = Some(signal.timestamp);
    }

    /// Fold in rejections found before signals reached the store (e.g. parse errors).
    pub fn merge_rejections(&mut self, upstream: Vec<SignalRejection>) {
        self.total += upstream.len();
        self.rejected.extend(upstream);
    }
}
