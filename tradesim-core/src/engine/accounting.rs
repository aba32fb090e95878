//! Fill accounting — the only code that moves cash in or out of the account.
//!
//! Entry: cash -= committed; entry fee comes out of committed; quantity is what
//! the remainder buys. Exit: gross = quantity * price; exit fee comes out of
//! gross; cash += net. The trade return is always measured against the
//! committed capital of the closed slice.

use chrono::{DateTime, Utc};

use crate::domain::{ExitReason, PortfolioState, Position, Signal, Trade};
use crate::fees::FeeModel;

/// Remaining quantity below this share of the original closes the position outright.
const DUST_FRACTION: f64 = 1e-9;

/// Open a new position committing `committed` cash at `price`.
pub fn open_position(
    portfolio: &mut PortfolioState,
    fees: &FeeModel,
    signal: &Signal,
    time: DateTime<Utc>,
    price: f64,
    committed: f64,
) {
    let entry_fee = fees.entry_fee(committed);
    let mut position = Position::open(time, price, committed, entry_fee);
    position.strategy_tag = signal.strategy_tag();
    position.entry_market_state = signal.market_state.clone();

    portfolio.cash -= committed;
    portfolio.total_fees += entry_fee;
    portfolio.open_position = Some(position);
}

/// Add a tranche to the open position. Returns the fee paid.
pub fn add_tranche(
    portfolio: &mut PortfolioState,
    fees: &FeeModel,
    price: f64,
    committed: f64,
) -> Option<f64> {
    let position = portfolio.open_position.as_mut()?;
    let fee = fees.entry_fee(committed);
    position.add_tranche(price, committed, fee);
    portfolio.cash -= committed;
    portfolio.total_fees += fee;
    Some(fee)
}

/// Close `fraction` of the open position at `price`.
///
/// Returns the trade record and whether the position is now fully closed.
pub fn close_fraction(
    portfolio: &mut PortfolioState,
    fees: &FeeModel,
    fraction: f64,
    time: DateTime<Utc>,
    price: f64,
    reason: ExitReason,
) -> Option<(Trade, bool)> {
    let position = portfolio.open_position.as_mut()?;
    let fraction = if fraction >= 1.0 - DUST_FRACTION {
        1.0
    } else {
        fraction.max(0.0)
    };
    let full = fraction == 1.0;

    let quantity = position.quantity * fraction;
    let committed = position.capital_committed * fraction;
    let entry_fee = position.entry_fee * fraction;

    let gross = quantity * price;
    let exit_fee = fees.exit_fee(gross);
    let net_proceeds = gross - exit_fee;

    let trade = Trade {
        entry_time: position.entry_time,
        entry_price: position.entry_price,
        exit_time: time,
        exit_price: price,
        quantity,
        capital_committed: committed,
        entry_fee,
        exit_fee,
        net_proceeds,
        return_pct: Trade::compute_return(net_proceeds, committed),
        exit_reason: reason,
        hold_duration: position.hold_duration(time).num_seconds(),
        partial: !full,
        strategy_tag: position.strategy_tag.clone(),
    };

    if full {
        portfolio.open_position = None;
    } else {
        let keep = 1.0 - fraction;
        position.quantity *= keep;
        position.capital_committed *= keep;
        position.entry_fee *= keep;
    }
    portfolio.cash += net_proceeds;
    portfolio.total_fees += exit_fee;

    Some((trade, full))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SignalAction;
    use crate::fees::SlippageLeg;
    use chrono::TimeZone;

    fn t(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn buy(price: f64) -> Signal {
        Signal::new(t(1), SignalAction::Buy, price).with_market_state("BULL")
    }

    #[test]
    fn entry_moves_committed_cash_into_position() {
        let mut pf = PortfolioState::new(1_000.0);
        let fees = FeeModel::new(0.001, 0.0, SlippageLeg::Entry);
        open_position(&mut pf, &fees, &buy(10.0), t(1), 10.0, 500.0);

        assert_eq!(pf.cash, 500.0);
        let pos = pf.open_position.as_ref().unwrap();
        assert!((pos.entry_fee - 0.5).abs() < 1e-12);
        assert!((pos.quantity - 49.95).abs() < 1e-12);
        assert_eq!(pos.strategy_tag.as_deref(), Some("BULL"));
        // Value right after entry is lower by exactly the fee.
        assert!((pf.equity(10.0) - 999.5).abs() < 1e-9);
    }

    #[test]
    fn full_exit_credits_net_proceeds() {
        let mut pf = PortfolioState::new(1_000.0);
        let fees = FeeModel::new(0.001, 0.0, SlippageLeg::Entry);
        open_position(&mut pf, &fees, &buy(10.0), t(1), 10.0, 1_000.0);
        let (trade, full) =
            close_fraction(&mut pf, &fees, 1.0, t(3), 12.0, ExitReason::Signal).unwrap();

        assert!(full);
        assert!(pf.open_position.is_none());
        // 99.9 units * 12 = 1198.8, minus 0.1% = 1197.6012
        assert!((trade.net_proceeds - 1_197.6012).abs() < 1e-9);
        assert!((pf.cash - 1_197.6012).abs() < 1e-9);
        assert!((trade.return_pct - 0.1976012).abs() < 1e-12);
        assert_eq!(trade.hold_duration, 2 * 86_400);
        assert!(!trade.partial);
    }

    #[test]
    fn partial_exit_shrinks_position_proportionally() {
        let mut pf = PortfolioState::new(1_000.0);
        let fees = FeeModel::frictionless();
        open_position(&mut pf, &fees, &buy(10.0), t(1), 10.0, 1_000.0);
        let (trade, full) =
            close_fraction(&mut pf, &fees, 0.25, t(2), 20.0, ExitReason::ScaleOut).unwrap();

        assert!(!full);
        assert!(trade.partial);
        assert_eq!(trade.capital_committed, 250.0);
        assert_eq!(trade.net_proceeds, 500.0);
        assert_eq!(trade.return_pct, 1.0);

        let pos = pf.open_position.as_ref().unwrap();
        assert_eq!(pos.quantity, 75.0);
        assert_eq!(pos.capital_committed, 750.0);
        assert_eq!(pf.cash, 500.0);
    }

    #[test]
    fn closing_when_flat_is_none() {
        let mut pf = PortfolioState::new(1_000.0);
        let fees = FeeModel::frictionless();
        assert!(close_fraction(&mut pf, &fees, 1.0, t(2), 10.0, ExitReason::Signal).is_none());
        assert!(add_tranche(&mut pf, &fees, 10.0, 100.0).is_none());
    }
}
