//! Position sizing — how much of the sizing basis an entry commits.
//!
//! Sizers return a fraction in [0, 1]. They never see prices, quantities or the
//! portfolio itself; the simulator turns the fraction into committed cash and
//! enforces that it fits into available cash.

pub mod confidence;
pub mod fixed;
pub mod kelly;
pub mod tier;

pub use confidence::ConfidenceSizer;
pub use fixed::FixedFractionSizer;
pub use kelly::KellySizer;
pub use tier::TierSizer;

use crate::domain::{Signal, Trade};

/// Inputs available to a sizer at entry time.
#[derive(Debug, Clone, Copy)]
pub struct SizingContext<'a> {
    pub available_capital: f64,
    /// Closed trades of the current run, oldest first.
    pub recent_trades: &'a [Trade],
}

/// Position sizing logic.
///
/// # Responsibilities
/// - Map an entry signal plus run history to a capital fraction
///
/// # Non-Responsibilities
/// - Sizers do NOT decide entry/exit (that's the signal's job)
/// - Sizers do NOT check cash sufficiency (that's the simulator's job)
pub trait PositionSizer: Send + Sync {
    /// Sizer name for logs and manifests.
    fn name(&self) -> &str;

    /// Raw fraction. May fall outside [0, 1]; callers use [`PositionSizer::fraction`].
    fn size(&self, signal: &Signal, ctx: &SizingContext<'_>) -> f64;

    /// Clamped fraction. Zero when there is no capital to size against.
    fn fraction(&self, signal: &Signal, ctx: &SizingContext<'_>) -> f64 {
        if ctx.available_capital <= 0.0 {
            return 0.0;
        }
        clamp_fraction(self.size(signal, ctx))
    }
}

/// Clamp to [0, 1], mapping NaN to 0.
pub fn clamp_fraction(f: f64) -> f64 {
    if f.is_nan() {
        0.0
    } else {
        f.clamp(0.0, 1.0)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    struct Reckless;

    impl PositionSizer for Reckless {
        fn name(&self) -> &str {
            "reckless"
        }

        fn size(&self, _signal: &Signal, _ctx: &SizingContext<'_>) -> f64 {
            3.0
        }
    }

    #[test]
    fn fraction_is_clamped() {
        assert_eq!(Reckless.fraction(&buy(), &ctx(&[])), 1.0);
    }

    #[test]
    fn zero_capital_sizes_to_zero() {
        let empty = SizingContext {
            available_capital: 0.0,
            recent_trades: &[],
        };
        assert_eq!(Reckless.fraction(&buy(), &empty), 0.0);
    }

    #[test]
    fn nan_clamps_to_zero() {
        assert_eq!(clamp_fraction(f64::NAN), 0.0);
        assert_eq!(clamp_fraction(-0.5), 0.0);
        assert_eq!(clamp_fraction(0.4), 0.4);
    }
}
