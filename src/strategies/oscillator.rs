// src/strategies/oscillator.rs
use crate::config::OscillatorConfig;
use crate::core::asset::AssetState;
use crate::indicators::RsiIndicator;
use crate::strategies::traits::{EvaluationInput, Strategy};
use crate::types::Decision;
use chrono::{DateTime, Utc};

/// RSI mean reversion: buy oversold, sell overbought.
#[derive(Debug, Clone)]
pub struct OscillatorReversion {
    indicator: RsiIndicator,
    oversold: f64,
    overbought: f64,
    cooldown: chrono::Duration,
}

impl OscillatorReversion {
    pub fn new(config: &OscillatorConfig, cooldown: chrono::Duration) -> Self {
        Self {
            indicator: RsiIndicator::new(config.rsi_period),
            oversold: config.oversold,
            overbought: config.overbought,
            cooldown,
        }
    }

    pub fn indicator(&self) -> &RsiIndicator {
        &self.indicator
    }
}

impl Strategy for OscillatorReversion {
    fn name(&self) -> &'static str {
        "OscillatorReversion"
    }

    fn evaluate(
        &self,
        asset: &AssetState,
        input: &EvaluationInput<'_>,
        now: DateTime<Utc>,
    ) -> Decision {
        let rsi = match input.indicator {
            Some(value) if value.is_finite() => value,
            _ => return Decision::Hold,
        };

        if asset.has_position() {
            if rsi > self.overbought {
                return Decision::Sell;
            }
            return Decision::Hold;
        }

        if rsi < self.oversold && !asset.in_cooldown(now, self.cooldown) {
            return Decision::Buy;
        }

        Decision::Hold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Candle;
    use chrono::Duration;
    use rust_decimal::Decimal;

    fn strategy() -> OscillatorReversion {
        OscillatorReversion::new(
            &OscillatorConfig {
                rsi_period: 14,
                oversold: 30.0,
                overbought: 70.0,
            },
            Duration::seconds(60),
        )
    }

    fn decide(asset: &AssetState, rsi: Option<f64>) -> Decision {
        let candle = Candle::default();
        let input = EvaluationInput {
            candle: &candle,
            previous: None,
            indicator: rsi,
        };
        strategy().evaluate(asset, &input, Utc::now())
    }

    fn holding() -> AssetState {
        let mut asset = AssetState::new("ADAUSD", "ADA");
        assert!(asset.begin_entry());
        asset.confirm_entry(Decimal::ONE, Decimal::ZERO, Utc::now());
        asset
    }

    #[test]
    fn test_buy_when_oversold_and_flat() {
        let asset = AssetState::new("ADAUSD", "ADA");
        assert_eq!(decide(&asset, Some(22.0)), Decision::Buy);
        assert_eq!(decide(&asset, Some(45.0)), Decision::Hold);
    }

    #[test]
    fn test_sell_when_overbought_and_holding() {
        let asset = holding();
        assert_eq!(decide(&asset, Some(78.0)), Decision::Sell);
        assert_eq!(decide(&asset, Some(50.0)), Decision::Hold);
    }

    #[test]
    fn test_holding_position_never_buys() {
        let asset = holding();
        assert_eq!(decide(&asset, Some(10.0)), Decision::Hold);
    }

    #[test]
    fn test_overbought_without_position_holds() {
        let asset = AssetState::new("ADAUSD", "ADA");
        assert_eq!(decide(&asset, Some(90.0)), Decision::Hold);
    }

    #[test]
    fn test_missing_or_nan_indicator_suppresses_decision() {
        let asset = AssetState::new("ADAUSD", "ADA");
        assert_eq!(decide(&asset, None), Decision::Hold);
        assert_eq!(decide(&asset, Some(f64::NAN)), Decision::Hold);
        assert_eq!(decide(&holding(), Some(f64::NAN)), Decision::Hold);
    }

    #[test]
    fn test_cooldown_gates_buy() {
        let mut asset = AssetState::new("ADAUSD", "ADA");
        asset.last_sell_time = Some(Utc::now() - Duration::seconds(10));
        assert_eq!(decide(&asset, Some(20.0)), Decision::Hold);
    }
}
