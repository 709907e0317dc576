/// risk.rs — Protective order levels for an open long.
///
///   stop_price        = entry × (1 − STOP_LOSS_PERCENT / 100)
///   take_profit_price = entry × (1 + TAKE_PROFIT_PERCENT / 100)
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectionLevels {
    pub stop_price: Decimal,
    pub take_profit_price: Decimal,
}

impl ProtectionLevels {
    /// Levels for a long entered at `entry`. Percentages are in percent
    /// units (2.0 = 2%).
    pub fn for_long(entry: Decimal, stop_loss_pct: Decimal, take_profit_pct: Decimal) -> Self {
        Self {
            stop_price: entry * (Decimal::ONE - stop_loss_pct / dec!(100)),
            take_profit_price: entry * (Decimal::ONE + take_profit_pct / dec!(100)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_percentages() {
        let levels = ProtectionLevels::for_long(dec!(90000), dec!(2.0), dec!(4.0));
        assert_eq!(levels.stop_price, dec!(88200));
        assert_eq!(levels.take_profit_price, dec!(93600));
    }

    #[test]
    fn stop_below_entry_below_target() {
        let entry = dec!(123.45);
        let levels = ProtectionLevels::for_long(entry, dec!(0.5), dec!(1.5));
        assert!(levels.stop_price < entry && entry < levels.take_profit_price);
    }
}
