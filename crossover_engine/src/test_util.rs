use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::data::{Candle, Series};

/// Hourly candles with open = high = low = close.
pub(crate) fn series_from_closes(closes: &[Decimal]) -> Series {
    let candles = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Candle {
            timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64 * 3_600, 0).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(1),
        })
        .collect();
    Series::new(candles)
}

/// `n` closes rising linearly from `from` to `to` inclusive.
pub(crate) fn linear_closes(n: usize, from: Decimal, to: Decimal) -> Vec<Decimal> {
    let steps = Decimal::from(n - 1);
    (0..n).map(|i| from + (to - from) * Decimal::from(i) / steps).collect()
}
