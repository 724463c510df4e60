// src/indicators/rsi.rs
use super::Indicator;
use crate::types::Candle;
use rust_decimal::prelude::ToPrimitive;
use ta::indicators::RelativeStrengthIndex;
use ta::Next;
use tracing::warn;

/// Relative strength index over candle closes.
#[derive(Debug, Clone)]
pub struct RsiIndicator {
    period: usize,
}

impl RsiIndicator {
    pub fn new(period: usize) -> Self {
        Self { period }
    }
}

impl Indicator for RsiIndicator {
    fn name(&self) -> &str {
        "RSI"
    }

    fn compute(&self, candles: &[Candle]) -> Vec<Option<f64>> {
        let mut rsi = match RelativeStrengthIndex::new(self.period) {
            Ok(rsi) => rsi,
            Err(e) => {
                warn!("Cannot build RSI({}): {:?}", self.period, e);
                return vec![None; candles.len()];
            }
        };

        candles
            .iter()
            .enumerate()
            .map(|(i, candle)| {
                let close = candle.close.to_f64()?;
                let value = rsi.next(close);
                if i < self.period || !value.is_finite() {
                    None
                } else {
                    Some(value)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn candles_from_closes(closes: &[i64]) -> Vec<Candle> {
        closes
            .iter()
            .map(|&c| Candle {
                close_time: Utc::now(),
                open: Decimal::from(c),
                high: Decimal::from(c),
                low: Decimal::from(c),
                close: Decimal::from(c),
                quote_volume: Decimal::ONE,
            })
            .collect()
    }

    #[test]
    fn test_output_is_aligned_with_warm_up() {
        let candles = candles_from_closes(&[10, 11, 12, 11, 13, 14, 13, 15]);
        let values = RsiIndicator::new(3).compute(&candles);

        assert_eq!(values.len(), candles.len());
        assert!(values[..3].iter().all(Option::is_none));
        assert!(values[3..].iter().all(Option::is_some));
    }

    #[test]
    fn test_falling_closes_are_oversold() {
        let closes: Vec<i64> = (0..30).map(|i| 200 - i * 3).collect();
        let values = RsiIndicator::new(14).compute(&candles_from_closes(&closes));
        let last = values.last().copied().flatten().unwrap();
        assert!(last < 30.0, "rsi = {}", last);
    }

    #[test]
    fn test_rising_closes_are_overbought() {
        let closes: Vec<i64> = (0..30).map(|i| 100 + i * 3).collect();
        let values = RsiIndicator::new(14).compute(&candles_from_closes(&closes));
        let last = values.last().copied().flatten().unwrap();
        assert!(last > 70.0, "rsi = {}", last);
    }

    #[test]
    fn test_invalid_period_yields_no_values() {
        let candles = candles_from_closes(&[10, 11, 12]);
        let values = RsiIndicator::new(0).compute(&candles);
        assert_eq!(values, vec![None, None, None]);
    }
}
