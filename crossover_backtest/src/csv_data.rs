/// csv_data.rs — Candle CSV persistence
///
/// Columns: timestamp,open,high,low,close,volume
///   timestamp  RFC 3339, UTC
///   prices     plain decimals, already descaled
///
/// Decimal columns are read as text and parsed exactly; the csv crate's
/// type inference would otherwise route them through f64.
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crossover_engine::data::{Candle, Series};

#[derive(Debug, Serialize, Deserialize)]
struct CandleRecord {
    timestamp: DateTime<Utc>,
    open: String,
    high: String,
    low: String,
    close: String,
    volume: String,
}

impl CandleRecord {
    fn into_candle(self) -> Result<Candle> {
        let parse = |field: &str, raw: &str| {
            Decimal::from_str(raw.trim())
                .with_context(|| format!("bad {field} value {raw:?} at {}", self.timestamp))
        };
        Ok(Candle {
            timestamp: self.timestamp,
            open: parse("open", &self.open)?,
            high: parse("high", &self.high)?,
            low: parse("low", &self.low)?,
            close: parse("close", &self.close)?,
            volume: parse("volume", &self.volume)?,
        })
    }
}

impl From<&Candle> for CandleRecord {
    fn from(c: &Candle) -> Self {
        Self {
            timestamp: c.timestamp,
            open: c.open.to_string(),
            high: c.high.to_string(),
            low: c.low.to_string(),
            close: c.close.to_string(),
            volume: c.volume.to_string(),
        }
    }
}

/// Parse candles from any CSV source. Rows may be in any order.
pub fn read_candles<R: Read>(reader: R) -> Result<Series> {
    let mut rdr = csv::Reader::from_reader(reader);
    let candles = rdr
        .deserialize::<CandleRecord>()
        .enumerate()
        .map(|(i, row)| {
            row.with_context(|| format!("malformed CSV row {}", i + 1))?
                .into_candle()
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Series::new(candles))
}

/// Load a candle file. An empty file is an error: there is nothing to replay.
pub fn load_candles(path: &Path) -> Result<Series> {
    let file = File::open(path)
        .with_context(|| format!("Data file not found: {}", path.display()))?;
    let series = read_candles(file)?;
    if series.is_empty() {
        bail!("No candles found in {}", path.display());
    }
    Ok(series)
}

pub fn write_candles<W: Write>(writer: W, series: &Series) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for candle in series {
        wtr.serialize(CandleRecord::from(candle))?;
    }
    wtr.flush().context("failed to flush CSV writer")?;
    Ok(())
}

pub fn save_candles(path: &Path, series: &Series) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    write_candles(file, series)
}
