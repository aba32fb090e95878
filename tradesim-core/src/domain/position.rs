use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The single open long position, owned by the simulator while open.
///
/// `capital_committed` is the cash taken out of the account at entry. It is the
/// sole denominator for the eventual trade return and is never recomputed from a
/// later capital figure. Partial exits shrink it proportionally; scale-ins add the
/// explicit cash of the new tranche.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub entry_time: DateTime<Utc>,
    /// Volume-weighted entry price across tranches.
    pub entry_price: f64,
    /// Units of the traded asset.
    pub quantity: f64,
    pub capital_committed: f64,
    pub entry_fee: f64,
    pub peak_price_since_entry: f64,
    pub strategy_tag: Option<String>,
    pub entry_market_state: Option<String>,
}

impl Position {
    /// Open a position from committed cash, paying `entry_fee` out of it.
    pub fn open(
        entry_time: DateTime<Utc>,
        entry_price: f64,
        capital_committed: f64,
        entry_fee: f64,
    ) -> Self {
        let quantity = (capital_committed - entry_fee) / entry_price;
        Self {
            entry_time,
            entry_price,
            quantity,
            capital_committed,
            entry_fee,
            peak_price_since_entry: entry_price,
            strategy_tag: None,
            entry_market_state: None,
        }
    }

    pub fn market_value(&self, current_price: f64) -> f64 {
        self.quantity * current_price
    }

    /// Unrealized return on committed capital, before exit costs.
    pub fn unrealized_return(&self, current_price: f64) -> f64 {
        if self.capital_committed <= 0.0 {
            return 0.0;
        }
        (self.market_value(current_price) - self.capital_committed) / self.capital_committed
    }

    /// Price move relative to the entry price.
    pub fn price_change(&self, current_price: f64) -> f64 {
        current_price / self.entry_price - 1.0
    }

    pub fn hold_duration(&self, now: DateTime<Utc>) -> Duration {
        now - self.entry_time
    }

    /// Raise the peak if `high` exceeds it. The peak never falls.
    pub fn update_peak(&mut self, high: f64) {
        if high > self.peak_price_since_entry {
            self.peak_price_since_entry = high;
        }
    }

    /// Add a tranche bought at `price` with `committed` cash of which `fee` went to costs.
    pub fn add_tranche(&mut self, price: f64, committed: f64, fee: f64) {
        let added_qty = (committed - fee) / price;
        let total_qty = self.quantity + added_qty;
        if total_qty > 0.0 {
            self.entry_price = (self.entry_price * self.quantity + price * added_qty) / total_qty;
        }
        self.quantity = total_qty;
        self.capital_committed += committed;
        self.entry_fee += fee;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
    }

    #[test]
    fn quantity_is_units_not_notional() {
        let pos = Position::open(t0(), 100.0, 10_000.0, 10.0);
        assert!((pos.quantity - 99.9).abs() < 1e-12);
        assert_eq!(pos.capital_committed, 10_000.0);
    }

    #[test]
    fn peak_only_rises() {
        let mut pos = Position::open(t0(), 100.0, 1_000.0, 0.0);
        pos.update_peak(110.0);
        pos.update_peak(105.0);
        assert_eq!(pos.peak_price_since_entry, 110.0);
    }

    #[test]
    fn tranche_averages_entry_price() {
        let mut pos = Position::open(t0(), 100.0, 1_000.0, 0.0);
        pos.add_tranche(200.0, 1_000.0, 0.0);
        assert!((pos.quantity - 15.0).abs() < 1e-12);
        assert!((pos.entry_price - 2_000.0 / 15.0).abs() < 1e-9);
        assert_eq!(pos.capital_committed, 2_000.0);
    }

    #[test]
    fn unrealized_return_uses_committed_capital() {
        let pos = Position::open(t0(), 100.0, 1_000.0, 0.0);
        assert!((pos.unrealized_return(110.0) - 0.10).abs() < 1e-12);
    }
}
