//! Domain types for tradesim

pub mod bar;
pub mod portfolio;
pub mod position;
pub mod signal;
pub mod trade;

pub use bar::{Bar, BarError, BarGap, PriceSeries, Timeframe};
pub use portfolio::{EquityPoint, PortfolioState};
pub use position::Position;
pub use signal::{Signal, SignalAction};
pub use trade::{ExitReason, Trade};
