//! PortfolioState — cash, the single open position, and the equity curve.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::position::Position;

/// One equity sample: `total_value == cash + open_position.quantity * close`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub cash: f64,
    pub position_value: f64,
    pub total_value: f64,
}

/// Per-run account state. Exists for exactly one simulation.
#[derive(Debug, Clone)]
pub struct PortfolioState {
    pub initial_capital: f64,
    pub cash: f64,
    pub open_position: Option<Position>,
    pub equity_curve: Vec<EquityPoint>,
    pub total_fees: f64,
}

impl PortfolioState {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            cash: initial_capital,
            open_position: None,
            equity_curve: Vec::new(),
            total_fees: 0.0,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.open_position.is_none()
    }

    /// Cash plus the open position marked at `price`.
    pub fn equity(&self, price: f64) -> f64 {
        self.cash + self.position_value(price)
    }

    pub fn position_value(&self, price: f64) -> f64 {
        self.open_position
            .as_ref()
            .map_or(0.0, |p| p.market_value(price))
    }

    /// Append an equity sample marked at `price`.
    pub fn record_equity(&mut self, timestamp: DateTime<Utc>, price: f64) -> EquityPoint {
        let position_value = self.position_value(price);
        let point = EquityPoint {
            timestamp,
            cash: self.cash,
            position_value,
            total_value: self.cash + position_value,
        };

        #[cfg(debug_assertions)]
        {
            let expected = self.equity(price);
            assert!(
                (point.total_value - expected).abs() <= 1e-9 * expected.abs().max(1.0),
                "capital conservation violated: total={}, cash={} + position={}",
                point.total_value,
                self.cash,
                position_value
            );
        }

        self.equity_curve.push(point);
        point
    }

    /// Equity values only, in sample order.
    pub fn equity_values(&self) -> Vec<f64> {
        self.equity_curve.iter().map(|p| p.total_value).collect()
    }
}
