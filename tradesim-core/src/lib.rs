//! tradesim core — domain types, fee model, exit and sizing policies, simulator.
//!
//! This crate contains the deterministic simulation engine:
//! - Domain types (bars, price series, signals, positions, trades, portfolio state)
//! - Validated signal store
//! - Per-leg fee and slippage model
//! - Exit policies with the ratchet rule for trailing stops
//! - Position sizing policies
//! - Config-driven policy factory
//! - The single-position, long-only simulator

pub mod domain;
pub mod engine;
pub mod exit;
pub mod factory;
pub mod fees;
pub mod signals;
pub mod sizing;

pub use domain::{
    Bar, EquityPoint, ExitReason, PortfolioState, Position, PriceSeries, Signal, SignalAction,
    Timeframe, Trade,
};
pub use engine::{simulate, SimConfig, SimError, SimulationOutput};
pub use factory::{create_exit_policy, create_sizer, ExitPolicyConfig, SizingPolicyConfig};
pub use fees::{FeeModel, SlippageLeg};
pub use signals::{SignalStore, SignalValidationReport};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types shared across matrix worker threads are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Inputs
        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::PriceSeries>();
        require_sync::<domain::PriceSeries>();
        require_send::<domain::Signal>();
        require_sync::<domain::Signal>();
        require_send::<signals::SignalStore>();
        require_sync::<signals::SignalStore>();
        require_send::<fees::FeeModel>();
        require_sync::<fees::FeeModel>();

        // Configs
        require_send::<factory::ExitPolicyConfig>();
        require_sync::<factory::ExitPolicyConfig>();
        require_send::<factory::SizingPolicyConfig>();
        require_sync::<factory::SizingPolicyConfig>();
        require_send::<engine::SimConfig>();
        require_sync::<engine::SimConfig>();

        // Outputs
        require_send::<domain::Trade>();
        require_sync::<domain::Trade>();
        require_send::<engine::SimulationOutput>();
        require_sync::<engine::SimulationOutput>();
        require_send::<engine::SimError>();
        require_sync::<engine::SimError>();

        // Policy trait objects
        require_send::<Box<dyn exit::ExitPolicy>>();
        require_sync::<Box<dyn exit::ExitPolicy>>();
        require_send::<Box<dyn sizing::PositionSizer>>();
        require_sync::<Box<dyn sizing::PositionSizer>>();
    }

    /// Architecture contract: exit policies cannot see the portfolio.
    ///
    /// `check()` takes the position and a market context only. Adding a
    /// portfolio parameter would break this function and every policy.
    #[test]
    fn exit_policy_has_no_portfolio_parameter() {
        fn _check_trait_object_builds(
            policy: &dyn exit::ExitPolicy,
            position: &domain::Position,
            ctx: &exit::MarketContext<'_>,
        ) -> exit::ExitDecision {
            policy.check(position, ctx)
        }
    }

    /// Architecture contract: sizers return a fraction, never a quantity.
    #[test]
    fn sizer_returns_fraction_of_basis() {
        fn _check_trait_object_builds(
            sizer: &dyn sizing::PositionSizer,
            signal: &domain::Signal,
            ctx: &sizing::SizingContext<'_>,
        ) -> f64 {
            sizer.fraction(signal, ctx)
        }
    }
}
