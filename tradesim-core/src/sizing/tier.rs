//! Tier sizer — fraction looked up from a categorical signal attribute.

use std::collections::BTreeMap;

use crate::domain::Signal;

use super::{PositionSizer, SizingContext};

#[derive(Debug, Clone, PartialEq)]
pub struct TierSizer {
    /// Attribute to read: `market_state`, `action`, or any metadata key.
    pub key: String,
    pub tiers: BTreeMap<String, f64>,
    pub default: f64,
}

impl TierSizer {
    pub fn new(key: impl Into<String>, tiers: BTreeMap<String, f64>, default: f64) -> Self {
        Self {
            key: key.into(),
            tiers,
            default,
        }
    }
}

impl PositionSizer for TierSizer {
    fn name(&self) -> &str {
        "tier"
    }

    fn size(&self, signal: &Signal, _ctx: &SizingContext<'_>) -> f64 {
        signal
            .attribute(&self.key)
            .and_then(|v| self.tiers.get(&v).copied())
            .unwrap_or(self.default)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    fn sizer() -> TierSizer {
        let tiers = BTreeMap::from([("BULL".to_string(), 0.9), ("SIDEWAYS".to_string(), 0.4)]);
        TierSizer::new("market_state", tiers, 0.1)
    }

    #[test]
    fn looks_up_tier() {
        let s = buy().with_market_state("SIDEWAYS");
        assert_eq!(sizer().fraction(&s, &ctx(&[])), 0.4);
    }

    #[test]
    fn unknown_or_missing_uses_default() {
        assert_eq!(sizer().fraction(&buy(), &ctx(&[])), 0.1);
        let s = buy().with_market_state("BEAR");
        assert_eq!(sizer().fraction(&s, &ctx(&[])), 0.1);
    }

    #[test]
    fn metadata_key() {
        let tiers = BTreeMap::from([("A".to_string(), 1.0)]);
        let sizer = TierSizer::new("grade", tiers, 0.0);
        let s = buy().with_metadata("grade", serde_json::json!("A"));
        assert_eq!(sizer.fraction(&s, &ctx(&[])), 1.0);
    }
}
