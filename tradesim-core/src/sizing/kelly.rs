//! Fractional Kelly sizer over a rolling window of closed trades.
//!
//! f* = p - (1 - p) / b, where p is the window win rate and b the ratio of the
//! average winning return to the average losing return. The result is scaled by
//! `multiplier`, then clamped to [0, ceiling]. With fewer than `min_trades`
//! closed trades in the window the fallback fraction is used instead.

use crate::domain::{Signal, Trade};

use super::{PositionSizer, SizingContext};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KellySizer {
    pub window: usize,
    pub min_trades: usize,
    pub multiplier: f64,
    pub ceiling: f64,
    pub fallback: f64,
}

impl Default for KellySizer {
    fn default() -> Self {
        Self {
            window: 20,
            min_trades: 10,
            multiplier: 0.5,
            ceiling: 0.8,
            fallback: 0.25,
        }
    }
}

impl KellySizer {
    /// Unscaled Kelly fraction for a slice of trades, or `None` if it is undefined.
    pub fn kelly_fraction(trades: &[Trade]) -> Option<f64> {
        if trades.is_empty() {
            return None;
        }
        let (wins, losses): (Vec<f64>, Vec<f64>) = trades
            .iter()
            .filter(|t| t.return_pct != 0.0)
            .map(|t| t.return_pct)
            .partition(|r| *r > 0.0);

        let p = trades.iter().filter(|t| t.is_win()).count() as f64 / trades.len() as f64;
        if losses.is_empty() {
            return Some(p);
        }
        if wins.is_empty() {
            return Some(0.0);
        }
        let avg_win = wins.iter().sum::<f64>() / wins.len() as f64;
        let avg_loss = losses.iter().map(|r| r.abs()).sum::<f64>() / losses.len() as f64;
        if avg_loss == 0.0 {
            return Some(p);
        }
        let b = avg_win / avg_loss;
        Some(p - (1.0 - p) / b)
    }
}

impl PositionSizer for KellySizer {
    fn name(&self) -> &str {
        "kelly"
    }

    fn size(&self, _signal: &Signal, ctx: &SizingContext<'_>) -> f64 {
        let start = ctx.recent_trades.len().saturating_sub(self.window);
        let window = &ctx.recent_trades[start..];
        if window.len() < self.min_trades {
            return self.fallback;
        }
        match Self::kelly_fraction(window) {
            Some(f) => (f * self.multiplier).clamp(0.0, self.ceiling),
            None => self.fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn fallback_below_min_trades() {
        let sizer = KellySizer::default();
        let history = vec![trade(0.1); 5];
        assert_eq!(sizer.fraction(&buy(), &ctx(&history)), 0.25);
    }

    #[test]
    fn half_kelly_on_known_edge() {
        // p = 0.6, b = 0.10 / 0.05 = 2 -> f* = 0.6 - 0.4 / 2 = 0.4, half = 0.2
        let mut history = vec![trade(0.10); 6];
        history.extend(vec![trade(-0.05); 4]);
        let f = KellySizer::default().fraction(&buy(), &ctx(&history));
        assert!((f - 0.2).abs() < 1e-12);
    }

    #[test]
    fn negative_edge_sizes_to_zero() {
        let mut history = vec![trade(0.01); 3];
        history.extend(vec![trade(-0.10); 7]);
        assert_eq!(KellySizer::default().fraction(&buy(), &ctx(&history)), 0.0);
    }

    #[test]
    fn ceiling_caps_the_fraction() {
        let sizer = KellySizer {
            multiplier: 1.0,
            ..Default::default()
        };
        let history = vec![trade(0.2); 12];
        assert_eq!(sizer.fraction(&buy(), &ctx(&history)), 0.8);
    }

    #[test]
    fn only_the_window_counts() {
        let sizer = KellySizer {
            window: 10,
            ..Default::default()
        };
        // Old losers fall out of the window; the recent ten are all winners.
        let mut history = vec![trade(-0.3); 20];
        history.extend(vec![trade(0.05); 10]);
        assert_eq!(sizer.fraction(&buy(), &ctx(&history)), 0.5);
    }
}
