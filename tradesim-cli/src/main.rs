//! tradesim CLI — evaluation matrix, single simulations, and feed checks.
//!
//! Commands:
//! - `evaluate` — run the (year × horizon) matrix from a TOML config and save artifacts
//! - `simulate` — one simulation over a date window, metrics printed as JSON
//! - `check-signals` — validate a signal feed and print the report

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tradesim_core::{create_exit_policy, create_sizer, simulate};
use tradesim_runner::data_loader::{load_prices, load_signals, parse_timestamp};
use tradesim_runner::export::{export_equity_csv, export_trades_csv};
use tradesim_runner::{
    evaluate_store, save_artifacts, EvaluationConfig, EvaluationMatrix, PerformanceMetrics,
};

#[derive(Parser)]
#[command(
    name = "tradesim",
    about = "tradesim — deterministic portfolio simulation and strategy evaluation"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every (year, horizon) cell, select a horizon on training years,
    /// and validate it out of sample.
    Evaluate {
        /// Path to the TOML evaluation config.
        #[arg(long)]
        config: PathBuf,

        /// Signal feed (.jsonl, .ndjson or .csv).
        #[arg(long)]
        signals: PathBuf,

        /// Price series CSV (timestamp,open,high,low,close[,volume]).
        #[arg(long)]
        prices: PathBuf,

        /// Output directory for matrix.json, summary.csv and per-cell files.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Run a single simulation and print its metrics as JSON.
    Simulate {
        /// Path to the TOML evaluation config (fees, policies, capital).
        #[arg(long)]
        config: PathBuf,

        /// Signal feed (.jsonl, .ndjson or .csv).
        #[arg(long)]
        signals: PathBuf,

        /// Price series CSV.
        #[arg(long)]
        prices: PathBuf,

        /// Window start (inclusive), e.g. 2023-01-01 or an RFC 3339 timestamp.
        #[arg(long)]
        from: Option<String>,

        /// Window end (exclusive).
        #[arg(long)]
        to: Option<String>,

        /// Force a holding horizon in hours on top of the configured exit policy.
        #[arg(long)]
        horizon: Option<u32>,

        /// Write the trade ledger and equity curve CSVs into this directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Validate a signal feed and print the report as JSON.
    CheckSignals {
        /// Signal feed (.jsonl, .ndjson or .csv).
        #[arg(long)]
        signals: PathBuf,

        /// Exit with an error if any signal was rejected.
        #[arg(long, default_value_t = false)]
        strict: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Evaluate {
            config,
            signals,
            prices,
            output_dir,
        } => run_evaluate(&config, &signals, &prices, &output_dir),
        Commands::Simulate {
            config,
            signals,
            prices,
            from,
            to,
            horizon,
            output_dir,
        } => run_simulate(
            &config,
            &signals,
            &prices,
            from.as_deref(),
            to.as_deref(),
            horizon,
            output_dir.as_deref(),
        ),
        Commands::CheckSignals { signals, strict } => run_check_signals(&signals, strict),
    }
}

fn run_evaluate(
    config_path: &Path,
    signals_path: &Path,
    prices_path: &Path,
    output_dir: &Path,
) -> Result<()> {
    let config = EvaluationConfig::from_toml_file(config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    let prices = load_prices(prices_path, config.timeframe)
        .with_context(|| format!("loading prices {}", prices_path.display()))?;
    let (store, report) = load_signals(signals_path)
        .with_context(|| format!("loading signals {}", signals_path.display()))?;

    let matrix = evaluate_store(&store, report, &prices, &config, &AtomicBool::new(false))
        .context("evaluation failed")?;

    print_summary(&matrix);

    let dir = save_artifacts(&matrix, output_dir)?;
    println!("Artifacts saved to: {}", dir.display());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_simulate(
    config_path: &Path,
    signals_path: &Path,
    prices_path: &Path,
    from: Option<&str>,
    to: Option<&str>,
    horizon: Option<u32>,
    output_dir: Option<&Path>,
) -> Result<()> {
    let config = EvaluationConfig::from_toml_file(config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    let prices = load_prices(prices_path, config.timeframe)
        .with_context(|| format!("loading prices {}", prices_path.display()))?;
    let (store, report) = load_signals(signals_path)
        .with_context(|| format!("loading signals {}", signals_path.display()))?;

    let (Some(first), Some(last)) = (prices.first(), prices.last()) else {
        bail!("price series {} is empty", prices_path.display());
    };
    let start = match from {
        Some(s) => parse_timestamp(s).with_context(|| format!("invalid --from '{s}'"))?,
        None => first.timestamp,
    };
    let end = match to {
        Some(s) => parse_timestamp(s).with_context(|| format!("invalid --to '{s}'"))?,
        None => last.timestamp + prices.timeframe.duration(),
    };
    if end <= start {
        bail!("--to must be after --from");
    }

    let exit_config = match horizon {
        Some(0) => bail!("--horizon must be > 0"),
        Some(h) => config.exit_policy.with_timeout(h),
        None => config.exit_policy.clone(),
    };
    let exit_policy = create_exit_policy(&exit_config)?;
    let sizer = create_sizer(&config.position_policy)?;

    let window = prices.window(start, end);
    let signals = store.range(start, end);
    info!(
        bars = window.len(),
        signals = signals.len(),
        rejected = report.rejected_count(),
        "simulating window"
    );

    let output = simulate(
        signals,
        &window,
        &config.fee_model(),
        exit_policy.as_ref(),
        sizer.as_ref(),
        &config.sim_config(),
    )
    .context("simulation failed")?;
    let metrics =
        PerformanceMetrics::compute(&output.trades, &output.equity_curve, &config.metrics_config());

    let summary = serde_json::json!({
        "from": start,
        "to": end,
        "signals": signals.len(),
        "metrics": metrics,
        "report": output.report,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if let Some(dir) = output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        std::fs::write(dir.join("trades.csv"), export_trades_csv(&output.trades)?)
            .with_context(|| format!("failed to write trades into {}", dir.display()))?;
        std::fs::write(dir.join("equity.csv"), export_equity_csv(&output.equity_curve)?)
            .with_context(|| format!("failed to write equity into {}", dir.display()))?;
        eprintln!("Ledger saved to: {}", dir.display());
    }
    Ok(())
}

fn run_check_signals(signals_path: &Path, strict: bool) -> Result<()> {
    let (_, report) = load_signals(signals_path)
        .with_context(|| format!("loading signals {}", signals_path.display()))?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if strict && !report.is_clean() {
        bail!(
            "{} of {} signals rejected",
            report.rejected_count(),
            report.total
        );
    }
    Ok(())
}

fn print_summary(matrix: &EvaluationMatrix) {
    let config = &matrix.config;
    println!();
    println!("=== Evaluation Matrix ===");
    println!("Config hash:    {}", matrix.config_hash);
    println!(
        "Signals:        {} accepted, {} rejected",
        matrix.signal_report.accepted,
        matrix.signal_report.rejected_count()
    );
    println!("Training years: {:?}", config.training_years);
    println!("Validation:     {}", config.validation_year);
    println!();
    println!(
        "{:<6} {:>8} {:<10} {:>10} {:>8} {:>9} {:>7}",
        "Year", "Horizon", "Role", "Return", "Sharpe", "MaxDD", "Trades"
    );
    println!("{}", "-".repeat(64));
    for c in &matrix.cells {
        let role = if c.year == config.validation_year {
            "validation"
        } else if config.training_years.contains(&c.year) {
            "training"
        } else {
            "other"
        };
        println!(
            "{:<6} {:>7}h {:<10} {:>9.2}% {:>8.3} {:>8.2}% {:>7}",
            c.year,
            c.horizon_hours,
            role,
            c.metrics.total_return_pct * 100.0,
            c.metrics.sharpe_ratio,
            c.metrics.max_drawdown_pct * 100.0,
            c.metrics.trade_count
        );
    }
    println!();
    println!("--- Selection ---");
    for agg in &matrix.training {
        let marker = if agg.horizon_hours == matrix.selected_horizon_hours {
            "*"
        } else {
            " "
        };
        println!(
            "{marker} {:>5}h  score {:>9.4}  mean return {:>8.2}%  mean sharpe {:>7.3}",
            agg.horizon_hours,
            agg.score,
            agg.mean_return * 100.0,
            agg.mean_sharpe
        );
    }
    let v = &matrix.validation;
    println!();
    println!(
        "Validation {:?}: training {:.4} → validation {:.4}",
        v.metric, v.training_value, v.validation_value
    );
    match v.degradation_pct {
        Some(d) => println!(
            "Degradation:    {:.1}% (threshold {:.1}%)",
            d * 100.0,
            v.threshold * 100.0
        ),
        None => println!("Degradation:    n/a (zero training baseline)"),
    }
    if matrix.overfit {
        println!("WARNING: selected horizon flagged as OVERFIT");
    }
    println!();
}
