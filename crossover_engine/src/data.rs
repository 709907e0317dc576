/// data.rs — Candle Series Adapter
///
/// The venue encodes every price and volume as an integer scaled by 10^18
/// ("x18"). This module turns raw venue candle records into a uniform,
/// time-ordered `Series` of decimal `Candle`s, and owns the scaling helpers
/// used at the venue boundary.
///
/// The SMA in `strategy` is a trailing window, so the series must be sorted
/// by ascending timestamp before anything downstream sees it. Duplicate
/// timestamps are kept as-is.
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// 10^18, the venue's fixed-point scale.
pub const X18: i64 = 1_000_000_000_000_000_000;
const X18_SCALE: u32 = 18;

// ── Fixed-point helpers ───────────────────────────────────────────────────

/// Descale an x18 integer to a decimal. Exact.
pub fn from_x18(raw: i128) -> Result<Decimal> {
    Decimal::try_from_i128_with_scale(raw, X18_SCALE)
        .map(|d| d.normalize())
        .map_err(|e| Error::Decode(format!("x18 value {raw}: {e}")))
}

/// Scale a decimal to the venue's x18 integer, rounding half-to-even.
pub fn to_x18(value: Decimal) -> Result<i128> {
    value
        .checked_mul(Decimal::from(X18))
        .and_then(|scaled| scaled.round().to_i128())
        .ok_or_else(|| Error::Decode(format!("{value} does not fit in x18")))
}

/// Parse a string-encoded x18 integer (the venue's wire form) and descale it.
pub fn parse_x18(raw: &str) -> Result<Decimal> {
    let n: i128 = raw
        .trim()
        .parse()
        .map_err(|e| Error::Decode(format!("x18 string {raw:?}: {e}")))?;
    from_x18(n)
}

// ── Granularity ───────────────────────────────────────────────────────────

/// Candle interval tags accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Granularity {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    OneHour,
    TwoHours,
    FourHours,
    OneDay,
    OneWeek,
    FourWeeks,
}

impl Granularity {
    pub const TAGS: [&'static str; 9] = ["1M", "5M", "15M", "1H", "2H", "4H", "1D", "1W", "4W"];

    /// Venue granularity code: the interval length in seconds.
    pub fn seconds(self) -> u32 {
        match self {
            Self::OneMinute => 60,
            Self::FiveMinutes => 300,
            Self::FifteenMinutes => 900,
            Self::OneHour => 3_600,
            Self::TwoHours => 7_200,
            Self::FourHours => 14_400,
            Self::OneDay => 86_400,
            Self::OneWeek => 604_800,
            Self::FourWeeks => 2_419_200,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::OneMinute => "1M",
            Self::FiveMinutes => "5M",
            Self::FifteenMinutes => "15M",
            Self::OneHour => "1H",
            Self::TwoHours => "2H",
            Self::FourHours => "4H",
            Self::OneDay => "1D",
            Self::OneWeek => "1W",
            Self::FourWeeks => "4W",
        }
    }

    /// Annualisation factor for metrics.
    pub fn bars_per_year(self) -> f64 {
        365.0 * 86_400.0 / self.seconds() as f64
    }
}

impl FromStr for Granularity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "1M" => Ok(Self::OneMinute),
            "5M" => Ok(Self::FiveMinutes),
            "15M" => Ok(Self::FifteenMinutes),
            "1H" => Ok(Self::OneHour),
            "2H" => Ok(Self::TwoHours),
            "4H" => Ok(Self::FourHours),
            "1D" => Ok(Self::OneDay),
            "1W" => Ok(Self::OneWeek),
            "4W" => Ok(Self::FourWeeks),
            other => Err(Error::config(format!(
                "invalid interval {other:?}, expected one of {:?}",
                Self::TAGS
            ))),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// ── Candles ───────────────────────────────────────────────────────────────

/// Candle record as the venue indexer returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueCandle {
    /// Bar open time, unix seconds.
    pub timestamp: i64,
    pub open_x18: String,
    pub high_x18: String,
    pub low_x18: String,
    pub close_x18: String,
    pub volume: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Candle {
    pub fn from_venue(raw: &VenueCandle) -> Result<Self> {
        let timestamp = DateTime::from_timestamp(raw.timestamp, 0)
            .ok_or_else(|| Error::Decode(format!("timestamp {} out of range", raw.timestamp)))?;
        Ok(Self {
            timestamp,
            open: parse_x18(&raw.open_x18)?,
            high: parse_x18(&raw.high_x18)?,
            low: parse_x18(&raw.low_x18)?,
            close: parse_x18(&raw.close_x18)?,
            volume: parse_x18(&raw.volume)?,
        })
    }
}

/// Time-ordered candle sequence. Timestamps are non-decreasing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Series {
    candles: Vec<Candle>,
}

impl Series {
    /// Build a series from candles in any order. The sort is stable, so
    /// duplicate timestamps keep their input order.
    pub fn new(mut candles: Vec<Candle>) -> Self {
        candles.sort_by_key(|c| c.timestamp);
        Self { candles }
    }

    /// Descale and sort raw venue records. Empty input is `EmptyData`.
    pub fn from_venue(records: &[VenueCandle]) -> Result<Self> {
        if records.is_empty() {
            return Err(Error::EmptyData("venue returned no candles"));
        }
        let candles = records
            .iter()
            .map(Candle::from_venue)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(candles))
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candle> {
        self.candles.iter()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn closes(&self) -> Vec<Decimal> {
        self.candles.iter().map(|c| c.close).collect()
    }
}

impl<'a> IntoIterator for &'a Series {
    type Item = &'a Candle;
    type IntoIter = std::slice::Iter<'a, Candle>;

    fn into_iter(self) -> Self::IntoIter {
        self.candles.iter()
    }
}
