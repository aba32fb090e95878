//! Evaluation matrix — every (year × holding horizon) cell, selection, validation.
//!
//! Two parallel phases separated by a barrier:
//! 1. Every non-validation year × every horizon, each with the exit policy's
//!    timeout overridden to the horizon.
//! 2. After the horizon is selected on training years, the validation year ×
//!    every horizon.
//!
//! Cells share read-only inputs and build their own policy objects. Results are
//! collected in (year, horizon) order so output is identical across runs.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use tradesim_core::domain::{EquityPoint, PriceSeries, Signal, Trade};
use tradesim_core::engine::{simulate, SimError, SimulationReport};
use tradesim_core::factory::{create_exit_policy, create_sizer};
use tradesim_core::signals::{year_bounds, SignalStore, SignalValidationReport};

use crate::config::{cell_window, ConfigError, EvaluationConfig};
use crate::metrics::PerformanceMetrics;
use crate::walk_forward::{
    aggregate_training, select_horizon, validate_selection, TrainingAggregate, ValidationOutcome,
};

/// Current schema version for persisted matrices.
pub const SCHEMA_VERSION: u32 = 1;

/// Errors from the matrix runner. Cell errors name the cell.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("simulation failed for year {year}, horizon {horizon_hours}h: {source}")]
    Simulation {
        year: i32,
        horizon_hours: u32,
        #[source]
        source: SimError,
    },
    #[error("cancelled before year {year}, horizon {horizon_hours}h started")]
    Cancelled { year: i32, horizon_hours: u32 },
    #[error("no training cells to select a horizon from")]
    NoTrainingCells,
}

/// One (year, horizon) outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub year: i32,
    pub horizon_hours: u32,
    pub metrics: PerformanceMetrics,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub report: SimulationReport,
    /// Signals emitted during the year that reached the simulator.
    pub signal_count: usize,
    /// Signals timestamped in this year that validation dropped.
    pub rejected_signals: usize,
    pub missed_entries: usize,
}

/// The full grid plus selection and out-of-sample verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMatrix {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub config_hash: String,
    pub config: EvaluationConfig,
    pub signal_report: SignalValidationReport,
    /// All cells, ordered by (year, horizon).
    pub cells: Vec<EvaluationResult>,
    /// One aggregate per horizon, ascending.
    pub training: Vec<TrainingAggregate>,
    pub selected_horizon_hours: u32,
    pub validation: ValidationOutcome,
    pub degradation_pct: Option<f64>,
    pub overfit: bool,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl EvaluationMatrix {
    pub fn cell(&self, year: i32, horizon_hours: u32) -> Option<&EvaluationResult> {
        self.cells
            .iter()
            .find(|c| c.year == year && c.horizon_hours == horizon_hours)
    }

    /// The selected horizon's validation-year cell.
    pub fn validation_result(&self) -> Option<&EvaluationResult> {
        self.cell(self.validation.validation_year, self.selected_horizon_hours)
    }
}

/// Evaluate a raw signal feed. Signals are validated once here.
pub fn evaluate(
    signals: &[Signal],
    prices: &PriceSeries,
    config: &EvaluationConfig,
) -> Result<EvaluationMatrix, EvaluationError> {
    evaluate_with_cancel(signals, prices, config, &AtomicBool::new(false))
}

/// [`evaluate`] with a cancellation flag checked as each cell starts.
pub fn evaluate_with_cancel(
    signals: &[Signal],
    prices: &PriceSeries,
    config: &EvaluationConfig,
    cancel: &AtomicBool,
) -> Result<EvaluationMatrix, EvaluationError> {
    config.validate()?;
    let (store, report) = SignalStore::from_signals(signals.to_vec());
    evaluate_store(&store, report, prices, config, cancel)
}

/// Evaluate an already-validated store (e.g. straight from the loader).
pub fn evaluate_store(
    store: &SignalStore,
    signal_report: SignalValidationReport,
    prices: &PriceSeries,
    config: &EvaluationConfig,
    cancel: &AtomicBool,
) -> Result<EvaluationMatrix, EvaluationError> {
    config.validate()?;
    let config_hash = config.config_hash()?;
    let horizons = config.sorted_horizons();
    let ctx = CellContext {
        store,
        signal_report: &signal_report,
        prices,
        config,
        cancel,
    };

    // ── Phase 1: every non-validation year ──
    let phase1: Vec<(i32, u32)> = config
        .non_validation_years()
        .into_iter()
        .flat_map(|y| horizons.iter().map(move |&h| (y, h)))
        .collect();
    info!(cells = phase1.len(), "phase 1: evaluating training cells");
    let mut cells = run_cells(&ctx, &phase1)?;

    // ── Barrier: select on training years only ──
    let training: Vec<TrainingAggregate> = horizons
        .iter()
        .map(|&h| {
            let cells_for_h: Vec<&EvaluationResult> = cells
                .iter()
                .filter(|c| c.horizon_hours == h && config.training_years.contains(&c.year))
                .collect();
            aggregate_training(h, &cells_for_h, &config.score_weights)
        })
        .collect();
    let selected = select_horizon(&training)
        .cloned()
        .ok_or(EvaluationError::NoTrainingCells)?;
    info!(
        horizon_hours = selected.horizon_hours,
        score = selected.score,
        "horizon selected on training years"
    );

    // ── Phase 2: validation year ──
    let phase2: Vec<(i32, u32)> = horizons
        .iter()
        .map(|&h| (config.validation_year, h))
        .collect();
    info!(
        cells = phase2.len(),
        year = config.validation_year,
        "phase 2: evaluating validation cells"
    );
    cells.extend(run_cells(&ctx, &phase2)?);
    cells.sort_by_key(|c| (c.year, c.horizon_hours));

    let validation_cell = cells
        .iter()
        .find(|c| c.year == config.validation_year && c.horizon_hours == selected.horizon_hours)
        .ok_or(EvaluationError::NoTrainingCells)?;
    let validation = validate_selection(
        &selected,
        validation_cell,
        config.degradation_metric,
        config.degradation_threshold,
    );
    if validation.overfit {
        warn!(
            horizon_hours = validation.horizon_hours,
            degradation_pct = ?validation.degradation_pct,
            threshold = validation.threshold,
            "selected horizon degrades out of sample: flagged as overfit"
        );
    }

    Ok(EvaluationMatrix {
        schema_version: SCHEMA_VERSION,
        config_hash,
        config: config.clone(),
        signal_report,
        cells,
        training,
        selected_horizon_hours: selected.horizon_hours,
        degradation_pct: validation.degradation_pct,
        overfit: validation.overfit,
        validation,
    })
}

// ─── Cells ───────────────────────────────────────────────────────────

struct CellContext<'a> {
    store: &'a SignalStore,
    signal_report: &'a SignalValidationReport,
    prices: &'a PriceSeries,
    config: &'a EvaluationConfig,
    cancel: &'a AtomicBool,
}

/// Run cells in parallel; the first error in input order wins.
fn run_cells(
    ctx: &CellContext<'_>,
    cells: &[(i32, u32)],
) -> Result<Vec<EvaluationResult>, EvaluationError> {
    let results: Vec<Result<EvaluationResult, EvaluationError>> = cells
        .par_iter()
        .map(|&(year, horizon)| run_cell(ctx, year, horizon))
        .collect();
    results.into_iter().collect()
}

fn run_cell(
    ctx: &CellContext<'_>,
    year: i32,
    horizon_hours: u32,
) -> Result<EvaluationResult, EvaluationError> {
    if ctx.cancel.load(Ordering::Relaxed) {
        return Err(EvaluationError::Cancelled {
            year,
            horizon_hours,
        });
    }
    let config = ctx.config;
    let (Some((start, end)), Some((_, window_end))) =
        (year_bounds(year), cell_window(year, horizon_hours))
    else {
        return Err(EvaluationError::Config(ConfigError::Invalid {
            field: "horizons",
            reason: format!("year {year} + {horizon_hours}h has no representable window"),
        }));
    };

    // Signals are restricted to the year; bars extend one horizon past it so
    // late entries can still time out.
    let signals = ctx.store.range(start, end);
    let window = ctx.prices.window(start, window_end);

    let exit_policy = create_exit_policy(&config.exit_policy.with_timeout(horizon_hours))
        .map_err(ConfigError::from)?;
    let sizer = create_sizer(&config.position_policy).map_err(ConfigError::from)?;

    let output = simulate(
        signals,
        &window,
        &config.fee_model(),
        exit_policy.as_ref(),
        sizer.as_ref(),
        &config.sim_config(),
    )
    .map_err(|source| EvaluationError::Simulation {
        year,
        horizon_hours,
        source,
    })?;

    let metrics =
        PerformanceMetrics::compute(&output.trades, &output.equity_curve, &config.metrics_config());
    let rejected_signals = ctx
        .signal_report
        .rejected
        .iter()
        .filter_map(|r| r.timestamp())
        .filter(|ts| *ts >= start && *ts < end)
        .count();

    debug!(
        year,
        horizon_hours,
        trades = metrics.trade_count,
        total_return = metrics.total_return_pct,
        "cell evaluated"
    );

    Ok(EvaluationResult {
        year,
        horizon_hours,
        signal_count: signals.len(),
        rejected_signals,
        missed_entries: output.report.missed_entry_count(),
        metrics,
        trades: output.trades,
        equity_curve: output.equity_curve,
        report: output.report,
    })
}
