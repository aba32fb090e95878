//! Export — evaluation matrix JSON plus per-cell CSV ledgers and equity curves.
//!
//! All persisted matrices carry a `schema_version`. Newer versions are rejected
//! on load. Output is deterministic: identical matrices produce identical bytes.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tradesim_core::domain::{EquityPoint, Trade};

use crate::matrix::{EvaluationMatrix, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize an `EvaluationMatrix` to pretty JSON.
pub fn export_json(matrix: &EvaluationMatrix) -> Result<String> {
    serde_json::to_string_pretty(matrix).context("failed to serialize EvaluationMatrix to JSON")
}

/// Deserialize an `EvaluationMatrix` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<EvaluationMatrix> {
    let matrix: EvaluationMatrix =
        serde_json::from_str(json).context("failed to deserialize EvaluationMatrix from JSON")?;
    if matrix.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            matrix.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(matrix)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export a trade ledger as CSV.
///
/// Columns: entry_time, entry_price, exit_time, exit_price, quantity,
/// capital_committed, entry_fee, exit_fee, net_proceeds, return_pct,
/// exit_reason, hold_secs, partial, strategy_tag
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "entry_time",
        "entry_price",
        "exit_time",
        "exit_price",
        "quantity",
        "capital_committed",
        "entry_fee",
        "exit_fee",
        "net_proceeds",
        "return_pct",
        "exit_reason",
        "hold_secs",
        "partial",
        "strategy_tag",
    ])?;

    for t in trades {
        wtr.write_record([
            t.entry_time.to_rfc3339(),
            format!("{:.8}", t.entry_price),
            t.exit_time.to_rfc3339(),
            format!("{:.8}", t.exit_price),
            format!("{:.10}", t.quantity),
            format!("{:.2}", t.capital_committed),
            format!("{:.2}", t.entry_fee),
            format!("{:.2}", t.exit_fee),
            format!("{:.2}", t.net_proceeds),
            format!("{:.6}", t.return_pct),
            t.exit_reason.to_string(),
            t.hold_duration.to_string(),
            t.partial.to_string(),
            t.strategy_tag.clone().unwrap_or_default(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export an equity curve as CSV.
pub fn export_equity_csv(equity_curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "cash", "position_value", "total_value"])?;
    for p in equity_curve {
        wtr.write_record([
            p.timestamp.to_rfc3339(),
            format!("{:.2}", p.cash),
            format!("{:.2}", p.position_value),
            format!("{:.2}", p.total_value),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// One row per (year, horizon) cell with its headline metrics.
pub fn export_summary_csv(matrix: &EvaluationMatrix) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "year",
        "horizon_hours",
        "role",
        "total_return_pct",
        "sharpe_ratio",
        "sortino_ratio",
        "max_drawdown_pct",
        "win_rate",
        "profit_factor",
        "trade_count",
        "exposure",
        "status",
        "missed_entries",
        "rejected_signals",
    ])?;
    for c in &matrix.cells {
        let role = if c.year == matrix.config.validation_year {
            "validation"
        } else if matrix.config.training_years.contains(&c.year) {
            "training"
        } else {
            "other"
        };
        let m = &c.metrics;
        wtr.write_record([
            c.year.to_string(),
            c.horizon_hours.to_string(),
            role.to_string(),
            format!("{:.6}", m.total_return_pct),
            format!("{:.4}", m.sharpe_ratio),
            format!("{:.4}", m.sortino_ratio),
            format!("{:.6}", m.max_drawdown_pct),
            format!("{:.4}", m.win_rate),
            format!("{:.4}", m.profit_factor),
            m.trade_count.to_string(),
            format!("{:.4}", m.exposure),
            format!("{:?}", m.status),
            c.missed_entries.to_string(),
            c.rejected_signals.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for an evaluation.
///
/// Writes into `output_dir`:
/// - `matrix.json` — the full `EvaluationMatrix`
/// - `summary.csv` — headline metrics per cell
/// - `cells/{year}_{horizon}h_trades.csv` and `..._equity.csv` per cell
///
/// Returns `output_dir`.
pub fn save_artifacts(matrix: &EvaluationMatrix, output_dir: &Path) -> Result<PathBuf> {
    let cells_dir = output_dir.join("cells");
    std::fs::create_dir_all(&cells_dir)
        .with_context(|| format!("failed to create artifact dir: {}", cells_dir.display()))?;

    write(&output_dir.join("matrix.json"), &export_json(matrix)?)?;
    write(&output_dir.join("summary.csv"), &export_summary_csv(matrix)?)?;

    for c in &matrix.cells {
        let stem = format!("{}_{}h", c.year, c.horizon_hours);
        write(
            &cells_dir.join(format!("{stem}_trades.csv")),
            &export_trades_csv(&c.trades)?,
        )?;
        write(
            &cells_dir.join(format!("{stem}_equity.csv")),
            &export_equity_csv(&c.equity_curve)?,
        )?;
    }

    Ok(output_dir.to_path_buf())
}

/// Load an `EvaluationMatrix` from an artifact directory's matrix.json.
pub fn load_artifacts(dir: &Path) -> Result<EvaluationMatrix> {
    let path = dir.join("matrix.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

fn write(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}
