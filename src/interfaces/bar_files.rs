//! Loads OHLCV bars from local files.
//!
//! JSON files hold a prediction request (`{"symbol", "days", "marketData"}`)
//! and go through the same validation as remote requests. CSV files need a
//! header with `timestamp,open,high,low,close,volume` (RFC 3339 timestamps).

use crate::domain::market::ohlcv::{Bar, OhlcvSeries};
use crate::interfaces::api::PredictRequest;
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

#[derive(Debug, Deserialize)]
struct CsvBar {
    timestamp: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

pub fn read_request(path: &Path) -> Result<PredictRequest> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    serde_json::from_reader(file).with_context(|| format!("Failed to parse request {:?}", path))
}

pub fn parse_csv_bars<R: Read>(reader: R) -> Result<OhlcvSeries> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut bars = Vec::new();
    for (line, record) in rdr.deserialize::<CsvBar>().enumerate() {
        let row = record.with_context(|| format!("Invalid CSV row {}", line + 1))?;
        bars.push(Bar {
            timestamp: row.timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }
    bars.sort_by_key(|b| b.timestamp);
    Ok(OhlcvSeries::new(bars)?)
}

/// Reads bars from a `.json` request or a `.csv` file.
pub fn load_series(path: &Path) -> Result<OhlcvSeries> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    let series = match extension.as_deref() {
        Some("json") => read_request(path)?.validate()?,
        Some("csv") => {
            let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
            parse_csv_bars(file).with_context(|| format!("Failed to load bars from {:?}", path))?
        }
        _ => bail!("Unsupported bar file {:?}: expected .json or .csv", path),
    };
    info!("Loaded {} bars from {:?}", series.len(), path);
    Ok(series)
}
