/// strategy.rs — Signal Engine: SMA crossover
///
///   sma_short_t = mean(close_{t-short+1 ..= t})
///   sma_long_t  = mean(close_{t-long+1  ..= t})
///
///   signal_t = 0                              for t < short_window
///            = 1 if sma_short_t > sma_long_t  otherwise (undefined SMA ⇒ 0)
///
///   position_change_t = signal_t − signal_{t-1}   (undefined at t = 0)
///
/// The warm-up boundary is `short_window`, not `long_window`: between the two
/// the long SMA is still undefined and the comparison yields 0.
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::data::Series;

/// Classification of a row's `position_change`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossover {
    /// Short SMA just moved above the long SMA.
    Bullish,
    /// Short SMA just moved back to or below the long SMA.
    Bearish,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalRow {
    pub timestamp: DateTime<Utc>,
    pub close: Decimal,
    pub sma_short: Option<Decimal>,
    pub sma_long: Option<Decimal>,
    /// 1 while the short SMA is above the long SMA, else 0.
    pub signal: i8,
    /// +1 on a fresh buy crossover, −1 on a fresh sell crossover.
    pub position_change: Option<i8>,
}

impl SignalRow {
    pub fn crossover(&self) -> Crossover {
        match self.position_change {
            Some(1) => Crossover::Bullish,
            Some(-1) => Crossover::Bearish,
            _ => Crossover::None,
        }
    }
}

/// Trailing simple moving average; `None` for the first `window - 1` values.
///
/// Uses a running sum, which is exact in decimal arithmetic.
pub fn sma(values: &[Decimal], window: usize) -> Vec<Option<Decimal>> {
    let mut out = vec![None; values.len()];
    if window == 0 || values.len() < window {
        return out;
    }
    let divisor = Decimal::from(window);
    let mut sum: Decimal = values[..window].iter().copied().sum();
    out[window - 1] = Some(sum / divisor);
    for i in window..values.len() {
        sum += values[i] - values[i - window];
        out[i] = Some(sum / divisor);
    }
    out
}

/// Compute the crossover rows for a series, aligned 1:1 with its candles.
/// An empty series gives an empty vector.
pub fn generate_signals(series: &Series, short_window: usize, long_window: usize) -> Vec<SignalRow> {
    let closes = series.closes();
    let sma_short = sma(&closes, short_window);
    let sma_long = sma(&closes, long_window);

    let mut rows: Vec<SignalRow> = Vec::with_capacity(series.len());
    for (i, candle) in series.iter().enumerate() {
        let signal = if i < short_window {
            0
        } else {
            match (sma_short[i], sma_long[i]) {
                (Some(s), Some(l)) if s > l => 1,
                _ => 0,
            }
        };
        let position_change = rows.last().map(|prev| signal - prev.signal);
        rows.push(SignalRow {
            timestamp: candle.timestamp,
            close: candle.close,
            sma_short: sma_short[i],
            sma_long: sma_long[i],
            signal,
            position_change,
        });
    }
    rows
}

/// Newest row, the only one the live controller acts on.
pub fn latest(rows: &[SignalRow]) -> Option<&SignalRow> {
    rows.last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::series_from_closes;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn sma_matches_hand_computation() {
        let v = [dec!(1), dec!(2), dec!(3), dec!(4), dec!(5)];
        assert_eq!(
            sma(&v, 3),
            vec![None, None, Some(dec!(2)), Some(dec!(3)), Some(dec!(4))]
        );
    }

    #[test]
    fn sma_window_longer_than_series_is_all_undefined() {
        let v = [dec!(1), dec!(2)];
        assert_eq!(sma(&v, 3), vec![None, None]);
        assert_eq!(sma(&v, 0), vec![None, None]);
    }

    #[test]
    fn empty_series_gives_no_rows() {
        let rows = generate_signals(&Series::default(), 10, 30);
        assert!(rows.is_empty());
        assert!(latest(&rows).is_none());
    }

    #[test]
    fn first_row_has_no_position_change() {
        let rows = generate_signals(&series_from_closes(&[dec!(1), dec!(2), dec!(3)]), 1, 2);
        assert_eq!(rows[0].position_change, None);
        assert!(rows[1..].iter().all(|r| r.position_change.is_some()));
    }

    #[test]
    fn signal_held_at_zero_until_long_sma_defined() {
        // Rising prices: short > long as soon as both exist.
        let closes: Vec<Decimal> = (1..=8).map(Decimal::from).collect();
        let rows = generate_signals(&series_from_closes(&closes), 2, 5);
        let signals: Vec<i8> = rows.iter().map(|r| r.signal).collect();
        // indices 2,3 are past short warm-up but the long SMA is undefined
        assert_eq!(signals, vec![0, 0, 0, 0, 1, 1, 1, 1]);
        assert_eq!(rows[4].crossover(), Crossover::Bullish);
    }

    #[test]
    fn signal_forced_zero_before_short_window() {
        // short=3 > long=2: at index 2 both SMAs exist and short (5) > long (3),
        // yet the signal is only allowed to turn on from index 3.
        let closes = [dec!(9), dec!(5), dec!(1), dec!(1), dec!(1)];
        let rows = generate_signals(&series_from_closes(&closes), 3, 2);
        assert_eq!(rows[2].sma_short, Some(dec!(5)));
        assert_eq!(rows[2].sma_long, Some(dec!(3)));
        assert_eq!(rows[2].signal, 0);
        assert_eq!(rows[3].signal, 1);
    }

    #[test]
    fn crossover_down_is_bearish() {
        let mut closes: Vec<Decimal> = (1..=10).map(Decimal::from).collect();
        closes.extend((1..=10).rev().map(Decimal::from));
        let rows = generate_signals(&series_from_closes(&closes), 2, 4);
        let changes: Vec<Crossover> = rows.iter().map(SignalRow::crossover).collect();
        assert_eq!(changes.iter().filter(|c| **c == Crossover::Bullish).count(), 1);
        assert_eq!(changes.iter().filter(|c| **c == Crossover::Bearish).count(), 1);
        let up = changes.iter().position(|c| *c == Crossover::Bullish).unwrap();
        let down = changes.iter().position(|c| *c == Crossover::Bearish).unwrap();
        assert!(up < down);
    }

    proptest! {
        #[test]
        fn sma_defined_count(
            prices in prop::collection::vec(1u32..100_000, 1..120),
            w1 in 1usize..20,
            extra in 1usize..40,
        ) {
            let w2 = w1 + extra;
            let closes: Vec<Decimal> = prices.into_iter().map(Decimal::from).collect();
            let n = closes.len();
            prop_assume!(n >= w2);
            let short = sma(&closes, w1).iter().filter(|v| v.is_some()).count();
            let long = sma(&closes, w2).iter().filter(|v| v.is_some()).count();
            prop_assert_eq!(short, n - w1 + 1);
            prop_assert_eq!(long, n - w2 + 1);
        }

        #[test]
        fn signal_and_change_domains(
            prices in prop::collection::vec(1u32..1_000, 0..150),
            short in 1usize..15,
            long in 1usize..40,
        ) {
            let closes: Vec<Decimal> = prices.into_iter().map(Decimal::from).collect();
            let rows = generate_signals(&series_from_closes(&closes), short, long);
            prop_assert_eq!(rows.len(), closes.len());
            for r in &rows {
                prop_assert!(r.signal == 0 || r.signal == 1);
                prop_assert!(matches!(r.position_change, None | Some(-1) | Some(0) | Some(1)));
            }
            // crossovers alternate, so buys outnumber sells by at most one
            let buys = rows.iter().filter(|r| r.position_change == Some(1)).count();
            let sells = rows.iter().filter(|r| r.position_change == Some(-1)).count();
            prop_assert!(buys == sells || buys == sells + 1);
        }
    }
}
