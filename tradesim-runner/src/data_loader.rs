//! Loading the external signal feed and the price series from files.
//!
//! Signal feeds are JSON Lines (one `Signal` object per line) or CSV with a
//! header `timestamp,action,price[,score][,confidence][,market_state]`. Any
//! further CSV columns land in the signal's metadata. A signal line that fails
//! to parse is rejected individually and reported; it never aborts the load.
//!
//! Price files are CSV `timestamp,open,high,low,close[,volume]`. A bad price
//! row is fatal: fills cannot be computed against a series with holes in it.
//!
//! Timestamps are RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC), `YYYY-MM-DD`, or unix
//! seconds.

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;
use tracing::{info, warn};

use tradesim_core::domain::{Bar, BarError, PriceSeries, Signal, SignalAction, Timeframe};
use tradesim_core::signals::{SignalRejection, SignalStore, SignalValidationReport};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),
    #[error("price row {line}: {message}")]
    BadPriceRow { line: usize, message: String },
    #[error("invalid price series: {0}")]
    Series(#[from] BarError),
    #[error("cannot infer signal format from {0} (expected .jsonl, .ndjson or .csv)")]
    UnknownFormat(PathBuf),
}

/// On-disk layout of a signal feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalFormat {
    JsonLines,
    Csv,
}

impl SignalFormat {
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("jsonl") | Some("ndjson") | Some("json") => Ok(SignalFormat::JsonLines),
            Some("csv") => Ok(SignalFormat::Csv),
            _ => Err(LoadError::UnknownFormat(path.to_path_buf())),
        }
    }
}

/// Parsed signals in feed order plus the lines that did not parse.
#[derive(Debug, Clone, Default)]
pub struct ParsedSignals {
    pub signals: Vec<Signal>,
    pub unparseable: Vec<SignalRejection>,
}

impl ParsedSignals {
    /// Validate into a store; parse failures are folded into the report.
    pub fn into_store(self) -> (SignalStore, SignalValidationReport) {
        let (store, mut report) = SignalStore::from_signals(self.signals);
        report.merge_rejections(self.unparseable);
        (store, report)
    }
}

// ─── Signals ─────────────────────────────────────────────────────────

/// Read and validate a signal feed.
pub fn load_signals(path: &Path) -> Result<(SignalStore, SignalValidationReport), LoadError> {
    let format = SignalFormat::from_path(path)?;
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed = match format {
        SignalFormat::JsonLines => parse_signals_jsonl(BufReader::new(file)).map_err(|source| {
            LoadError::Io {
                path: path.to_path_buf(),
                source,
            }
        })?,
        SignalFormat::Csv => parse_signals_csv(file)?,
    };
    let (store, report) = parsed.into_store();
    info!(
        path = %path.display(),
        accepted = report.accepted,
        rejected = report.rejected_count(),
        "signals loaded"
    );
    Ok((store, report))
}

/// One `Signal` JSON object per line. Blank lines are skipped.
pub fn parse_signals_jsonl<R: BufRead>(reader: R) -> std::io::Result<ParsedSignals> {
    let mut parsed = ParsedSignals::default();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<Signal>(trimmed) {
            Ok(signal) => parsed.signals.push(signal),
            Err(e) => reject(&mut parsed, idx + 1, e.to_string()),
        }
    }
    Ok(parsed)
}

/// CSV with a header row. Unknown columns become string metadata.
pub fn parse_signals_csv<R: Read>(reader: R) -> Result<ParsedSignals, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let ts_col = column("timestamp").ok_or(LoadError::MissingColumn("timestamp"))?;
    let action_col = column("action").ok_or(LoadError::MissingColumn("action"))?;
    let price_col = column("price").ok_or(LoadError::MissingColumn("price"))?;
    let score_col = column("score");
    let confidence_col = column("confidence");
    let state_col = column("market_state");
    let known = [
        Some(ts_col),
        Some(action_col),
        Some(price_col),
        score_col,
        confidence_col,
        state_col,
    ];

    let mut parsed = ParsedSignals::default();
    for (idx, record) in rdr.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                reject(&mut parsed, line, e.to_string());
                continue;
            }
        };
        let field = |col: Option<usize>| col.and_then(|c| record.get(c)).filter(|v| !v.is_empty());

        let result = (|| -> Result<Signal, String> {
            let ts_raw = field(Some(ts_col)).ok_or("missing timestamp")?;
            let timestamp =
                parse_timestamp(ts_raw).ok_or_else(|| format!("bad timestamp '{ts_raw}'"))?;
            let action: SignalAction = field(Some(action_col)).ok_or("missing action")?.parse()?;
            let price = parse_f64(field(Some(price_col)), "price")?.ok_or("missing price")?;

            let mut signal = Signal::new(timestamp, action, price);
            signal.score = parse_f64(field(score_col), "score")?;
            signal.confidence = parse_f64(field(confidence_col), "confidence")?;
            signal.market_state = field(state_col).map(str::to_string);
            signal.metadata = extra_columns(&headers, &record, &known);
            Ok(signal)
        })();

        match result {
            Ok(signal) => parsed.signals.push(signal),
            Err(message) => reject(&mut parsed, line, message),
        }
    }
    Ok(parsed)
}

fn reject(parsed: &mut ParsedSignals, line: usize, message: String) {
    warn!(line, %message, "unparseable signal line");
    parsed
        .unparseable
        .push(SignalRejection::Unparseable { line, message });
}

fn parse_f64(raw: Option<&str>, name: &str) -> Result<Option<f64>, String> {
    raw.map(|v| v.parse::<f64>().map_err(|_| format!("bad {name} '{v}'")))
        .transpose()
}

/// Numeric-looking values become JSON numbers so policies can read them as such.
fn extra_columns(
    headers: &csv::StringRecord,
    record: &csv::StringRecord,
    known: &[Option<usize>],
) -> BTreeMap<String, serde_json::Value> {
    headers
        .iter()
        .enumerate()
        .filter(|(i, _)| !known.contains(&Some(*i)))
        .filter_map(|(i, name)| {
            let value = record.get(i).filter(|v| !v.is_empty())?;
            let json = value
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(serde_json::Value::Number)
                .unwrap_or_else(|| serde_json::Value::String(value.to_string()));
            Some((name.to_string(), json))
        })
        .collect()
}

// ─── Prices ──────────────────────────────────────────────────────────

/// Read a price CSV into a validated series.
pub fn load_prices(path: &Path, timeframe: Timeframe) -> Result<PriceSeries, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let series = parse_prices_csv(file, timeframe)?;
    let gaps = series.gaps().len();
    info!(
        path = %path.display(),
        bars = series.len(),
        gaps,
        timeframe = %timeframe,
        "prices loaded"
    );
    Ok(series)
}

pub fn parse_prices_csv<R: Read>(reader: R, timeframe: Timeframe) -> Result<PriceSeries, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    let column = |name: &'static str| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or(LoadError::MissingColumn(name))
    };
    let cols = [
        column("timestamp")?,
        column("open")?,
        column("high")?,
        column("low")?,
        column("close")?,
    ];
    let volume_col = headers.iter().position(|h| h.eq_ignore_ascii_case("volume"));

    let mut bars = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let line = idx + 2;
        let record = record?;
        let bad = |message: String| LoadError::BadPriceRow { line, message };
        let get = |c: usize| record.get(c).unwrap_or("");

        let timestamp = parse_timestamp(get(cols[0]))
            .ok_or_else(|| bad(format!("bad timestamp '{}'", get(cols[0]))))?;
        let mut ohlc = [0.0_f64; 4];
        for (slot, &c) in ohlc.iter_mut().zip(&cols[1..]) {
            *slot = get(c)
                .parse()
                .map_err(|_| bad(format!("bad number '{}'", get(c))))?;
        }
        let mut bar = Bar::new(timestamp, ohlc[0], ohlc[1], ohlc[2], ohlc[3]);
        if let Some(v) = volume_col.map(get).filter(|v| !v.is_empty()) {
            bar.volume = Some(v.parse().map_err(|_| bad(format!("bad volume '{v}'")))?);
        }
        bars.push(bar);
    }
    Ok(PriceSeries::new(timeframe, bars)?)
}

// ─── Timestamps ──────────────────────────────────────────────────────

/// Parse the timestamp forms accepted in signal and price files.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(secs) = raw.parse::<i64>() {
        return Utc.timestamp_opt(secs, 0).single();
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
