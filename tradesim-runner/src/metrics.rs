//! Performance metrics — pure functions that compute strategy statistics.
//!
//! Every metric is a pure function: equity curve and/or trade ledger in, scalar out.
//! Win/loss classification goes through [`Trade::is_win`] and nothing else.

use serde::{Deserialize, Serialize};
use tradesim_core::domain::{EquityPoint, Trade};

/// Profit factor reported when there are winning trades and no losing ones.
pub const PROFIT_FACTOR_CAP: f64 = 100.0;

/// Which return series Sharpe and Sortino are computed on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnBasis {
    /// Per-bar equity returns, annualized by `periods_per_year`.
    #[default]
    Bar,
    /// Per-trade `return_pct`, not annualized.
    Trade,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub initial_capital: f64,
    pub return_basis: ReturnBasis,
    pub periods_per_year: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000_000.0,
            return_basis: ReturnBasis::Bar,
            periods_per_year: 365.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricsStatus {
    #[default]
    Ok,
    /// No trades, or too few equity samples for ratio metrics.
    InsufficientData,
}

/// Aggregate performance metrics for one simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return_pct: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    /// Non-positive fraction (-0.15 = 15% drawdown).
    pub max_drawdown_pct: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub trade_count: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub avg_trade_return_pct: f64,
    /// Fraction of equity samples with an open position.
    pub exposure: f64,
    pub status: MetricsStatus,
}

impl PerformanceMetrics {
    /// Compute all metrics from a trade ledger and equity curve.
    pub fn compute(trades: &[Trade], equity_curve: &[EquityPoint], config: &MetricsConfig) -> Self {
        let values = equity_values(equity_curve, config.initial_capital);
        let returns = match config.return_basis {
            ReturnBasis::Bar => period_returns(&values),
            ReturnBasis::Trade => trades.iter().map(|t| t.return_pct).collect(),
        };
        let annualization = match config.return_basis {
            ReturnBasis::Bar => config.periods_per_year.max(0.0).sqrt(),
            ReturnBasis::Trade => 1.0,
        };

        let status = if trades.is_empty() || equity_curve.is_empty() {
            MetricsStatus::InsufficientData
        } else {
            MetricsStatus::Ok
        };

        Self {
            total_return_pct: total_return(&values),
            sharpe_ratio: sharpe_ratio(&returns) * annualization,
            sortino_ratio: sortino_ratio(&returns) * annualization,
            max_drawdown_pct: max_drawdown(&values),
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades),
            trade_count: trades.len(),
            winning_trades: trades.iter().filter(|t| t.is_win()).count(),
            losing_trades: trades.iter().filter(|t| t.is_loss()).count(),
            avg_trade_return_pct: mean_f64(&trades.iter().map(|t| t.return_pct).collect::<Vec<_>>()),
            exposure: exposure(equity_curve),
            status,
        }
    }

    pub fn has_data(&self) -> bool {
        self.status == MetricsStatus::Ok
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(values: &[f64]) -> f64 {
    match (values.first(), values.last()) {
        (Some(&initial), Some(&last)) if initial > 0.0 => (last - initial) / initial,
        _ => 0.0,
    }
}

/// Mean over sample standard deviation of `returns`, unannualized.
///
/// Returns 0.0 if variance is zero or fewer than 2 returns.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(returns) / std
}

/// Mean over downside deviation of `returns`, unannualized.
///
/// Returns 0.0 if there is no downside or fewer than 2 returns.
pub fn sortino_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let downside_sq: f64 = returns.iter().filter(|&&r| r < 0.0).map(|r| r * r).sum();
    if downside_sq <= 0.0 {
        return 0.0;
    }
    let downside_std = (downside_sq / returns.len() as f64).sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    mean_f64(returns) / downside_std
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
///
/// Returns 0.0 if equity is constant or monotonically increasing.
pub fn max_drawdown(values: &[f64]) -> f64 {
    let mut peak = match values.first() {
        Some(&v) => v,
        None => return 0.0,
    };
    let mut max_dd = 0.0_f64;

    for &eq in values {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            let dd = (eq - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Fraction of ledger records that are wins.
pub fn win_rate(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_win()).count();
    winners as f64 / trades.len() as f64
}

/// Capital-weighted gross profit over gross loss.
///
/// Each trade contributes `return_pct × capital_committed`. Capped at
/// [`PROFIT_FACTOR_CAP`] when there are no losses.
pub fn profit_factor(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let weighted = |t: &Trade| t.return_pct * t.capital_committed;
    let gross_profit: f64 = trades.iter().filter(|t| t.is_win()).map(weighted).sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.is_loss())
        .map(|t| weighted(t).abs())
        .sum();

    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { PROFIT_FACTOR_CAP } else { 0.0 };
    }
    (gross_profit / gross_loss).min(PROFIT_FACTOR_CAP)
}

/// Fraction of equity samples where a position was held.
pub fn exposure(equity_curve: &[EquityPoint]) -> f64 {
    if equity_curve.is_empty() {
        return 0.0;
    }
    let held = equity_curve.iter().filter(|p| p.position_value > 0.0).count();
    held as f64 / equity_curve.len() as f64
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Equity values prefixed with the initial capital, so the first bar's move counts.
fn equity_values(equity_curve: &[EquityPoint], initial_capital: f64) -> Vec<f64> {
    std::iter::once(initial_capital)
        .chain(equity_curve.iter().map(|p| p.total_value))
        .collect()
}

/// Simple returns between consecutive values.
pub fn period_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .map(|w| {
            if w[0] > 0.0 {
                (w[1] - w[0]) / w[0]
            } else {
                0.0
            }
        })
        .collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
