// src/strategies/traits.rs
use crate::core::asset::AssetState;
use crate::types::{Candle, Decision};
use chrono::{DateTime, Utc};

/// Market data a decision is based on. `candle` is always the last *closed* candle.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationInput<'a> {
    pub candle: &'a Candle,
    pub previous: Option<&'a Candle>,
    pub indicator: Option<f64>,
}

pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Sell conditions are checked before buy conditions.
    fn evaluate(&self, asset: &AssetState, input: &EvaluationInput<'_>, now: DateTime<Utc>)
        -> Decision;
}
