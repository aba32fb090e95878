//! BDD tests for the evaluation matrix.
//!
//! These tests verify:
//! - The full (year × horizon) grid is produced in deterministic order
//! - Horizon selection uses training years only
//! - Strong training / weak validation data is flagged as overfit
//! - Identical inputs produce byte-identical JSON
//! - Configuration errors fail before any simulation

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use tradesim_core::domain::{Bar, PriceSeries, Signal, SignalAction, Timeframe};
use tradesim_core::factory::{ExitPolicyConfig, SizingPolicyConfig};
use tradesim_runner::export::{export_json, import_json};
use tradesim_runner::{
    evaluate, DegradationFlag, EvaluationConfig, EvaluationError, ScoreWeights,
};

// ── Helpers ──────────────────────────────────────────────────────────

fn day(d: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap() + Duration::days(d)
}

/// Daily bars from 2021-01-01 to mid-January 2024. Each year drifts by its own
/// daily factor; 2024 is flat.
fn drifting_series(validation_factor: f64) -> PriceSeries {
    let mut close = 100.0_f64;
    let mut bars = Vec::new();
    let mut d = 0;
    loop {
        let ts = day(d);
        if ts >= Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap() {
            break;
        }
        let factor = match ts.year() {
            2021 | 2022 => 1.01,
            2023 => validation_factor,
            _ => 1.0,
        };
        let open = close;
        close *= factor;
        bars.push(Bar::new(ts, open, open.max(close), open.min(close), close));
        d += 1;
    }
    PriceSeries::new(Timeframe::Days(1), bars).unwrap()
}

/// BUY at the close every ten days.
fn periodic_buys(prices: &PriceSeries) -> Vec<Signal> {
    prices
        .bars()
        .iter()
        .enumerate()
        .filter(|(i, b)| i % 10 == 0 && b.timestamp.year() < 2024)
        .map(|(_, b)| Signal::new(b.timestamp, SignalAction::Buy, b.close))
        .collect()
}

fn config() -> EvaluationConfig {
    let mut cfg = EvaluationConfig::new(vec![2021, 2022], 2023, vec![240, 24, 72]);
    cfg.timeframe = Timeframe::Days(1);
    cfg.score_weights = ScoreWeights::new(1.0, 0.0, 0.0);
    cfg.exit_policy = ExitPolicyConfig::SignalOnly;
    cfg.position_policy = SizingPolicyConfig::Fixed { fraction: 1.0 };
    cfg
}

// ── Scenarios ────────────────────────────────────────────────────────

#[test]
fn bdd_scenario_full_grid_in_year_horizon_order() {
    // GIVEN three years of data and three horizons
    let prices = drifting_series(1.01);
    let signals = periodic_buys(&prices);

    // WHEN the matrix is evaluated
    let matrix = evaluate(&signals, &prices, &config()).expect("evaluation should succeed");

    // THEN every (year, horizon) cell exists, sorted
    let keys: Vec<(i32, u32)> = matrix
        .cells
        .iter()
        .map(|c| (c.year, c.horizon_hours))
        .collect();
    assert_eq!(
        keys,
        vec![
            (2021, 24),
            (2021, 72),
            (2021, 240),
            (2022, 24),
            (2022, 72),
            (2022, 240),
            (2023, 24),
            (2023, 72),
            (2023, 240),
        ]
    );

    // AND no cell holds a position longer than its horizon
    for cell in &matrix.cells {
        for trade in &cell.trades {
            assert!(trade.hold_duration <= i64::from(cell.horizon_hours) * 3600);
        }
    }
}

#[test]
fn bdd_scenario_selection_uses_training_years_only() {
    // GIVEN rising training years where longer holds capture more of the trend
    let prices = drifting_series(0.99);
    let signals = periodic_buys(&prices);

    // WHEN the matrix is evaluated with a return-only score
    let matrix = evaluate(&signals, &prices, &config()).unwrap();

    // THEN the longest horizon wins on training data even though it is worst out of sample
    assert_eq!(matrix.selected_horizon_hours, 240);
    assert_eq!(matrix.training.len(), 3);
    for agg in &matrix.training {
        assert_eq!(agg.years, vec![2021, 2022]);
    }
    let v24 = matrix.cell(2023, 24).unwrap().metrics.total_return_pct;
    let v240 = matrix.cell(2023, 240).unwrap().metrics.total_return_pct;
    assert!(v240 < v24);
}

#[test]
fn bdd_scenario_overfit_flag_on_weak_validation_year() {
    // GIVEN strong training years and a falling validation year
    let prices = drifting_series(0.995);
    let signals = periodic_buys(&prices);

    // WHEN the matrix is evaluated
    let matrix = evaluate(&signals, &prices, &config()).unwrap();

    // THEN the degradation crosses the threshold and the selection is flagged
    let degradation = matrix.degradation_pct.expect("non-zero training baseline");
    assert!(degradation < -0.20, "degradation {degradation}");
    assert!(matrix.overfit);
    assert!(matrix.validation.overfit);
    assert_eq!(matrix.validation.degradation_flag, DegradationFlag::Normal);
    assert!(matrix.validation.training_value > 0.0);
    assert!(matrix.validation.validation_value < 0.0);
}

#[test]
fn bdd_scenario_consistent_validation_year_not_flagged() {
    // GIVEN a validation year that behaves exactly like training
    let prices = drifting_series(1.01);
    let signals = periodic_buys(&prices);

    // WHEN the matrix is evaluated
    let matrix = evaluate(&signals, &prices, &config()).unwrap();

    // THEN degradation stays inside the threshold
    let degradation = matrix.degradation_pct.unwrap();
    assert!(degradation > -0.20, "degradation {degradation}");
    assert!(!matrix.overfit);
}

#[test]
fn bdd_scenario_identical_inputs_give_identical_json() {
    // GIVEN the same inputs twice
    let prices = drifting_series(0.995);
    let signals = periodic_buys(&prices);
    let cfg = config();

    // WHEN evaluated twice
    let a = export_json(&evaluate(&signals, &prices, &cfg).unwrap()).unwrap();
    let b = export_json(&evaluate(&signals, &prices, &cfg).unwrap()).unwrap();

    // THEN the serialized matrices are byte-identical
    assert_eq!(a, b);
    assert!(a.contains("\"schema_version\": 1"));
}

#[test]
fn bdd_scenario_rejected_signals_are_reported_not_fatal() {
    // GIVEN a feed with one out-of-order and one non-positive-price signal
    let prices = drifting_series(1.01);
    let mut signals = periodic_buys(&prices);
    signals.insert(3, Signal::new(day(1), SignalAction::Sell, 101.0));
    signals.push(Signal::new(
        Utc.with_ymd_and_hms(2023, 12, 31, 12, 0, 0).unwrap(),
        SignalAction::Buy,
        0.0,
    ));

    // WHEN the matrix is evaluated
    let matrix = evaluate(&signals, &prices, &config()).unwrap();

    // THEN both are listed in the report and attributed to their years
    assert_eq!(matrix.signal_report.rejected_count(), 2);
    assert_eq!(matrix.cell(2021, 24).unwrap().rejected_signals, 1);
    assert_eq!(matrix.cell(2023, 24).unwrap().rejected_signals, 1);
    assert_eq!(matrix.cell(2022, 24).unwrap().rejected_signals, 0);
}

#[test]
fn bdd_scenario_non_finite_rejection_reloads() {
    // GIVEN a feed whose SELL carries a NaN price
    let prices = drifting_series(1.01);
    let signals = vec![
        Signal::new(day(3), SignalAction::Buy, 100.0),
        Signal::new(day(5), SignalAction::Sell, f64::NAN),
    ];

    // WHEN the matrix is evaluated, exported and imported again
    let matrix = evaluate(&signals, &prices, &config()).unwrap();
    let json = export_json(&matrix).unwrap();
    let reloaded = import_json(&json).expect("exported matrix should reload");

    // THEN the rejection is preserved with its raw value
    assert_eq!(reloaded.signal_report, matrix.signal_report);
    assert_eq!(reloaded.signal_report.rejected_count(), 1);
    assert!(json.contains("\"NaN\""));
}

#[test]
fn bdd_scenario_config_error_fails_fast() {
    // GIVEN a validation year that is also a training year
    let mut cfg = config();
    cfg.training_years = vec![2021, 2023];

    // WHEN evaluated
    let err = evaluate(&[], &drifting_series(1.0), &cfg).unwrap_err();

    // THEN a configuration error is returned before any cell runs
    assert!(matches!(err, EvaluationError::Config(_)));
}

#[test]
fn bdd_scenario_gap_aborts_with_cell_context() {
    // GIVEN a series with a missing week in 2022
    let full = drifting_series(1.01);
    let bars: Vec<Bar> = full
        .bars()
        .iter()
        .filter(|b| {
            let t = b.timestamp;
            !(t >= Utc.with_ymd_and_hms(2022, 5, 1, 0, 0, 0).unwrap()
                && t < Utc.with_ymd_and_hms(2022, 5, 8, 0, 0, 0).unwrap())
        })
        .cloned()
        .collect();
    let prices = PriceSeries::new(Timeframe::Days(1), bars).unwrap();

    // WHEN evaluated with the default abort gap policy
    let err = evaluate(&periodic_buys(&prices), &prices, &config()).unwrap_err();

    // THEN the error names the first failing cell
    match err {
        EvaluationError::Simulation {
            year,
            horizon_hours,
            ..
        } => {
            assert_eq!(year, 2022);
            assert_eq!(horizon_hours, 24);
        }
        other => panic!("expected simulation error, got {other}"),
    }
}

#[test]
fn bdd_scenario_gap_carry_forward_completes() {
    // GIVEN the same gap but the carry-forward policy
    let full = drifting_series(1.01);
    let bars: Vec<Bar> = full
        .bars()
        .iter()
        .filter(|b| b.timestamp.year() != 2022 || b.timestamp.month() != 5 || b.timestamp.day() > 7)
        .cloned()
        .collect();
    let prices = PriceSeries::new(Timeframe::Days(1), bars).unwrap();
    let mut cfg = config();
    cfg.gap_policy = tradesim_core::engine::GapPolicy::CarryForward;

    // WHEN evaluated
    let matrix = evaluate(&periodic_buys(&prices), &prices, &cfg).unwrap();

    // THEN synthesized bars are reported on the affected cells
    assert!(matrix.cell(2022, 24).unwrap().report.synthesized_bars > 0);
    assert_eq!(matrix.cell(2021, 24).unwrap().report.synthesized_bars, 0);
}
