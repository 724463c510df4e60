// src/strategies/mod.rs
pub mod momentum;
pub mod oscillator;
pub mod traits;

use crate::config::{AppConfig, StrategyKind};
use crate::core::asset::AssetState;
use crate::indicators::Indicator;
use crate::types::Decision;
use chrono::{DateTime, Utc};
use momentum::MomentumBreakout;
use oscillator::OscillatorReversion;
use traits::{EvaluationInput, Strategy};

/// Decision policy chosen at configuration time.
#[derive(Debug, Clone)]
pub enum SignalEvaluator {
    Momentum(MomentumBreakout),
    Oscillator(OscillatorReversion),
}

impl SignalEvaluator {
    pub fn from_config(config: &AppConfig) -> Self {
        match config.strategy {
            StrategyKind::Momentum => {
                Self::Momentum(MomentumBreakout::new(&config.momentum, config.buy_cooldown()))
            }
            StrategyKind::Oscillator => Self::Oscillator(OscillatorReversion::new(
                &config.oscillator,
                config.buy_cooldown(),
            )),
        }
    }

    /// Indicator whose last closed value feeds `EvaluationInput::indicator`.
    pub fn indicator(&self) -> Option<&dyn Indicator> {
        match self {
            Self::Momentum(_) => None,
            Self::Oscillator(strategy) => Some(strategy.indicator()),
        }
    }
}

impl Strategy for SignalEvaluator {
    fn name(&self) -> &'static str {
        match self {
            Self::Momentum(strategy) => strategy.name(),
            Self::Oscillator(strategy) => strategy.name(),
        }
    }

    fn evaluate(
        &self,
        asset: &AssetState,
        input: &EvaluationInput<'_>,
        now: DateTime<Utc>,
    ) -> Decision {
        match self {
            Self::Momentum(strategy) => strategy.evaluate(asset, input, now),
            Self::Oscillator(strategy) => strategy.evaluate(asset, input, now),
        }
    }
}
