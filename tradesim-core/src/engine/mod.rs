//! Portfolio simulator — walks one price series, one position at a time.
//!
//! The simulator consumes validated signals and a price series, sizes entries
//! with a [`PositionSizer`](crate::sizing::PositionSizer), closes positions via
//! an [`ExitPolicy`](crate::exit::ExitPolicy) or exit signals, and charges the
//! [`FeeModel`](crate::fees::FeeModel) on every fill. It performs no I/O.

pub mod accounting;
pub mod error;
pub mod simulator;
pub mod state;

pub use error::{MissedEntry, SimError};
pub use simulator::simulate;
pub use state::{
    GapPolicy, Phase, SimConfig, SimState, SimulationOutput, SimulationReport, SizingBasis,
};
