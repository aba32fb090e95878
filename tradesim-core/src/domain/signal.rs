//! Signal — an immutable trading intent produced by an external generator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// What the signal producer wants done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalAction {
    Buy,
    Sell,
    CloseLong,
    CloseShort,
    ScaleIn,
    ScaleOut,
}

impl SignalAction {
    /// Opens a new long position when flat.
    pub fn is_entry(&self) -> bool {
        matches!(self, SignalAction::Buy)
    }

    /// Closes the whole long position.
    pub fn is_full_exit(&self) -> bool {
        matches!(self, SignalAction::Sell | SignalAction::CloseLong)
    }
}

impl fmt::Display for SignalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalAction::Buy => "BUY",
            SignalAction::Sell => "SELL",
            SignalAction::CloseLong => "CLOSE_LONG",
            SignalAction::CloseShort => "CLOSE_SHORT",
            SignalAction::ScaleIn => "SCALE_IN",
            SignalAction::ScaleOut => "SCALE_OUT",
        };
        f.write_str(s)
    }
}

impl FromStr for SignalAction {
    type Err = String;

    /// Case-insensitive; accepts `-` or `_` as the word separator.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "BUY" => Ok(SignalAction::Buy),
            "SELL" => Ok(SignalAction::Sell),
            "CLOSE_LONG" => Ok(SignalAction::CloseLong),
            "CLOSE_SHORT" => Ok(SignalAction::CloseShort),
            "SCALE_IN" => Ok(SignalAction::ScaleIn),
            "SCALE_OUT" => Ok(SignalAction::ScaleOut),
            _ => Err(format!("unknown signal action '{}'", s.trim())),
        }
    }
}

/// One trading signal. The engine never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub timestamp: DateTime<Utc>,
    pub action: SignalAction,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Producer confidence in [0, 1].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Regime tag from whichever classifier the producer used. Opaque to the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_state: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Signal {
    pub fn new(timestamp: DateTime<Utc>, action: SignalAction, price: f64) -> Self {
        Self {
            timestamp,
            action,
            price,
            score: None,
            confidence: None,
            market_state: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_market_state(mut self, state: impl Into<String>) -> Self {
        self.market_state = Some(state.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// String value of a categorical attribute: `market_state`, `action`, or a metadata key.
    pub fn attribute(&self, key: &str) -> Option<String> {
        match key {
            "market_state" => self.market_state.clone(),
            "action" => Some(self.action.to_string()),
            _ => self.metadata.get(key).map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
        }
    }

    /// Numeric metadata value, if present and numeric.
    pub fn metadata_f64(&self, key: &str) -> Option<f64> {
        self.metadata.get(key).and_then(serde_json::Value::as_f64)
    }

    /// Tag identifying which strategy/regime produced the entry.
    ///
    /// Prefers an explicit `metadata.strategy`, falling back to `market_state`.
    pub fn strategy_tag(&self) -> Option<String> {
        self.metadata
            .get("strategy")
            .and_then(|v| v.as_str().map(str::to_string))
            .or_else(|| self.market_state.clone())
    }
}
