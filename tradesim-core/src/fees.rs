//! Fee model — exchange fee plus slippage, charged per leg of a round trip.
//!
//! The exchange fee applies to both the entry and the exit fill. Slippage is a
//! separate rate charged on whichever leg(s) `slippage_leg` names. Both are
//! fractions of the notional on that leg: entry costs come out of committed
//! capital, exit costs come out of gross proceeds.

use serde::{Deserialize, Serialize};

/// Which leg of a round trip pays slippage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlippageLeg {
    #[default]
    Entry,
    Exit,
    Both,
}

/// Per-leg cost rates for the single traded instrument.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeModel {
    /// Exchange fee per leg as a fraction (0.0005 = 5 bps).
    pub fee_rate: f64,
    /// Slippage as a fraction of notional on the slipped leg(s).
    pub slippage_rate: f64,
    #[serde(default)]
    pub slippage_leg: SlippageLeg,
}

impl Default for FeeModel {
    fn default() -> Self {
        Self {
            fee_rate: 0.0005,
            slippage_rate: 0.0004,
            slippage_leg: SlippageLeg::Entry,
        }
    }
}

impl FeeModel {
    pub fn new(fee_rate: f64, slippage_rate: f64, slippage_leg: SlippageLeg) -> Self {
        Self {
            fee_rate,
            slippage_rate,
            slippage_leg,
        }
    }

    pub fn frictionless() -> Self {
        Self::new(0.0, 0.0, SlippageLeg::Entry)
    }

    /// Total cost rate of the buy fill.
    pub fn entry_rate(&self) -> f64 {
        match self.slippage_leg {
            SlippageLeg::Entry | SlippageLeg::Both => self.fee_rate + self.slippage_rate,
            SlippageLeg::Exit => self.fee_rate,
        }
    }

    /// Total cost rate of the sell fill.
    pub fn exit_rate(&self) -> f64 {
        match self.slippage_leg {
            SlippageLeg::Exit | SlippageLeg::Both => self.fee_rate + self.slippage_rate,
            SlippageLeg::Entry => self.fee_rate,
        }
    }

    /// Cost charged on committing `capital` to an entry.
    pub fn entry_fee(&self, capital: f64) -> f64 {
        capital * self.entry_rate()
    }

    /// Cost charged on selling for `gross_proceeds`.
    pub fn exit_fee(&self, gross_proceeds: f64) -> f64 {
        gross_proceeds * self.exit_rate()
    }

    /// Approximate round-trip cost as a fraction (entry rate + exit rate).
    pub fn round_trip_rate(&self) -> f64 {
        self.entry_rate() + self.exit_rate()
    }

    pub fn is_frictionless(&self) -> bool {
        self.fee_rate == 0.0 && self.slippage_rate == 0.0
    }

    /// Rates must be finite, non-negative and below 1.
    pub fn is_valid(&self) -> bool {
        [self.fee_rate, self.slippage_rate]
            .iter()
            .all(|r| r.is_finite() && *r >= 0.0 && *r < 1.0)
            && self.round_trip_rate() < 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_legs_are_asymmetric() {
        let fees = FeeModel::default();
        assert!((fees.entry_rate() - 0.0009).abs() < 1e-15);
        assert!((fees.exit_rate() - 0.0005).abs() < 1e-15);
        assert!((fees.round_trip_rate() - 0.0014).abs() < 1e-15);
    }

    #[test]
    fn slippage_on_both_legs() {
        let fees = FeeModel::new(0.001, 0.0005, SlippageLeg::Both);
        assert!((fees.entry_rate() - 0.0015).abs() < 1e-15);
        assert!((fees.exit_rate() - 0.0015).abs() < 1e-15);
    }

    #[test]
    fn slippage_on_exit_only() {
        let fees = FeeModel::new(0.001, 0.0005, SlippageLeg::Exit);
        assert!((fees.entry_rate() - 0.001).abs() < 1e-15);
        assert!((fees.exit_rate() - 0.0015).abs() < 1e-15);
    }

    #[test]
    fn fee_amounts_scale_with_notional() {
        let fees = FeeModel::default();
        assert!((fees.entry_fee(1_000_000.0) - 900.0).abs() < 1e-9);
        assert!((fees.exit_fee(2_000_000.0) - 1_000.0).abs() < 1e-9);
    }

    #[test]
    fn frictionless_costs_nothing() {
        let fees = FeeModel::frictionless();
        assert!(fees.is_frictionless());
        assert_eq!(fees.entry_fee(123.0), 0.0);
        assert_eq!(fees.exit_fee(456.0), 0.0);
    }

    #[test]
    fn rejects_negative_or_huge_rates() {
        assert!(!FeeModel::new(-0.001, 0.0, SlippageLeg::Entry).is_valid());
        assert!(!FeeModel::new(0.6, 0.5, SlippageLeg::Both).is_valid());
        assert!(FeeModel::default().is_valid());
    }

    #[test]
    fn slippage_leg_defaults_when_missing() {
        let fees: FeeModel =
            serde_json::from_str(r#"{"fee_rate":0.001,"slippage_rate":0.0}"#).unwrap();
        assert_eq!(fees.slippage_leg, SlippageLeg::Entry);
    }
}
