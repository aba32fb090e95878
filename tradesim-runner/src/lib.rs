//! tradesim runner — evaluation matrix, walk-forward validation, metrics.
//!
//! This crate builds on `tradesim-core` to provide:
//! - TOML evaluation configuration with fail-fast validation
//! - Signal feed and price series loading
//! - Performance metrics over trade ledgers and equity curves
//! - The parallel (year × horizon) evaluation matrix
//! - Horizon selection on training years and out-of-sample degradation
//! - JSON / CSV export of results

pub mod config;
pub mod data_loader;
pub mod export;
pub mod matrix;
pub mod metrics;
pub mod scoring;
pub mod walk_forward;

pub use config::{ConfigError, EvaluationConfig};
pub use data_loader::{load_prices, load_signals, LoadError, ParsedSignals, SignalFormat};
pub use export::{load_artifacts, save_artifacts};
pub use matrix::{
    evaluate, evaluate_store, evaluate_with_cancel, EvaluationError, EvaluationMatrix,
    EvaluationResult, SCHEMA_VERSION,
};
pub use metrics::{MetricsConfig, MetricsStatus, PerformanceMetrics, ReturnBasis};
pub use scoring::ScoreWeights;
pub use walk_forward::{
    DegradationFlag, DegradationMetric, TrainingAggregate, ValidationOutcome,
};
