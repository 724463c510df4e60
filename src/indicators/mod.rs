// src/indicators/mod.rs
pub mod rsi;

pub use rsi::RsiIndicator;

use crate::types::Candle;

/// Derived series computed from an OHLCV history.
pub trait Indicator: Send + Sync {
    fn name(&self) -> &str;

    /// One value per input candle, aligned by index. Warm-up values are `None`.
    fn compute(&self, candles: &[Candle]) -> Vec<Option<f64>>;
}
