//! Bar and PriceSeries — the price data the simulator walks.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// OHLC bar for the single traded instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

impl Bar {
    pub fn new(timestamp: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume: None,
        }
    }

    /// A bar with open == high == low == close.
    pub fn flat(timestamp: DateTime<Utc>, price: f64) -> Self {
        Self::new(timestamp, price, price, price, price)
    }

    /// Basic OHLC sanity check: finite, positive, high/low bracket open and close.
    pub fn is_sane(&self) -> bool {
        let fields = [self.open, self.high, self.low, self.close];
        if fields.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }
}

/// Errors raised while building a [`PriceSeries`].
#[derive(Debug, Error, PartialEq)]
pub enum BarError {
    #[error("bar at {timestamp} is malformed (non-finite, non-positive or inverted OHLC)")]
    Malformed { timestamp: DateTime<Utc> },
    #[error("bar at {timestamp} is not after the previous bar at {previous}")]
    OutOfOrder {
        timestamp: DateTime<Utc>,
        previous: DateTime<Utc>,
    },
    #[error("unknown timeframe '{0}' (expected e.g. 1m, 15m, 1h, 4h, 1d)")]
    UnknownTimeframe(String),
}

/// Bar interval of a price series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Timeframe {
    Minutes(u32),
    Hours(u32),
    Days(u32),
}

impl Timeframe {
    pub fn duration(&self) -> Duration {
        match *self {
            Timeframe::Minutes(n) => Duration::minutes(n as i64),
            Timeframe::Hours(n) => Duration::hours(n as i64),
            Timeframe::Days(n) => Duration::days(n as i64),
        }
    }

    /// Number of bars in a 365-day year, used to annualize per-bar ratios.
    pub fn periods_per_year(&self) -> f64 {
        let secs = self.duration().num_seconds().max(1) as f64;
        365.0 * 86_400.0 / secs
    }
}

impl Default for Timeframe {
    fn default() -> Self {
        Timeframe::Days(1)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeframe::Minutes(n) => write!(f, "{n}m"),
            Timeframe::Hours(n) => write!(f, "{n}h"),
            Timeframe::Days(n) => write!(f, "{n}d"),
        }
    }
}

impl FromStr for Timeframe {
    type Err = BarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let unknown = || BarError::UnknownTimeframe(s.to_string());
        if s.len() < 2 {
            return Err(unknown());
        }
        let (num, unit) = s.split_at(s.len() - 1);
        let n: u32 = num.parse().map_err(|_| unknown())?;
        if n == 0 {
            return Err(unknown());
        }
        match unit {
            "m" => Ok(Timeframe::Minutes(n)),
            "h" => Ok(Timeframe::Hours(n)),
            "d" => Ok(Timeframe::Days(n)),
            _ => Err(unknown()),
        }
    }
}

impl Serialize for Timeframe {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timeframe {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A location where consecutive bars are further apart than one timeframe interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarGap {
    /// Timestamp of the last bar before the gap.
    pub after: DateTime<Utc>,
    /// Timestamp the next bar was expected at.
    pub expected: DateTime<Utc>,
    /// Timestamp the next bar actually has.
    pub found: DateTime<Utc>,
}

/// Validated, strictly time-ordered bars for one timeframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub timeframe: Timeframe,
    bars: Vec<Bar>,
}

impl PriceSeries {
    /// Build a series, rejecting malformed or out-of-order bars.
    pub fn new(timeframe: Timeframe, bars: Vec<Bar>) -> Result<Self, BarError> {
        for (i, bar) in bars.iter().enumerate() {
            if !bar.is_sane() {
                return Err(BarError::Malformed {
                    timestamp: bar.timestamp,
                });
            }
            if i > 0 && bar.timestamp <= bars[i - 1].timestamp {
                return Err(BarError::OutOfOrder {
                    timestamp: bar.timestamp,
                    previous: bars[i - 1].timestamp,
                });
            }
        }
        Ok(Self { timeframe, bars })
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&Bar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Bars with `start <= timestamp < end`, as a new series.
    pub fn window(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> PriceSeries {
        let lo = self.bars.partition_point(|b| b.timestamp < start);
        let hi = self.bars.partition_point(|b| b.timestamp < end);
        PriceSeries {
            timeframe: self.timeframe,
            bars: self.bars[lo..hi.max(lo)].to_vec(),
        }
    }

    /// Every place where the next bar arrives later than one interval after the previous.
    pub fn gaps(&self) -> Vec<BarGap> {
        let step = self.timeframe.duration();
        self.bars
            .windows(2)
            .filter_map(|w| {
                let expected = w[0].timestamp + step;
                (w[1].timestamp > expected).then(|| BarGap {
                    after: w[0].timestamp,
                    expected,
                    found: w[1].timestamp,
                })
            })
            .collect()
    }

    /// Fill every gap with flat bars at the previous close.
    ///
    /// Returns the filled series and the number of synthesized bars.
    pub fn carry_forward(&self) -> (PriceSeries, usize) {
        let step = self.timeframe.duration();
        let mut bars = Vec::with_capacity(self.bars.len());
        let mut synthesized = 0;
        for bar in &self.bars {
            if let Some((prev_ts, prev_close)) = bars.last().map(|b: &Bar| (b.timestamp, b.close)) {
                let mut t = prev_ts + step;
                while t < bar.timestamp {
                    bars.push(Bar::flat(t, prev_close));
                    synthesized += 1;
                    t += step;
                }
            }
            bars.push(bar.clone());
        }
        (
            PriceSeries {
                timeframe: self.timeframe,
                bars,
            },
            synthesized,
        )
    }
}
