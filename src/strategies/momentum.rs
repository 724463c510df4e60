// src/strategies/momentum.rs
use crate::config::MomentumConfig;
use crate::core::asset::AssetState;
use crate::strategies::traits::{EvaluationInput, Strategy};
use crate::types::Decision;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::trace;

/// Buys a candle that pumps on a volume spike with a clean, bullish body.
/// Exits are left to the stop-loss.
#[derive(Debug, Clone)]
pub struct MomentumBreakout {
    pump_threshold_percent: Decimal,
    volume_multiple: Decimal,
    cooldown: chrono::Duration,
}

impl MomentumBreakout {
    pub fn new(config: &MomentumConfig, cooldown: chrono::Duration) -> Self {
        Self {
            pump_threshold_percent: config.pump_threshold_percent,
            volume_multiple: config.volume_multiple,
            cooldown,
        }
    }
}

impl Strategy for MomentumBreakout {
    fn name(&self) -> &'static str {
        "MomentumBreakout"
    }

    fn evaluate(
        &self,
        asset: &AssetState,
        input: &EvaluationInput<'_>,
        now: DateTime<Utc>,
    ) -> Decision {
        if asset.has_position() {
            return Decision::Hold;
        }

        let Some(previous) = input.previous else {
            return Decision::Hold;
        };

        let candle = input.candle;
        let change = candle.percentage_change();
        let price_trigger = change > self.pump_threshold_percent;
        let volume_trigger = candle.quote_volume > previous.quote_volume * self.volume_multiple;

        if !(price_trigger && volume_trigger) {
            return Decision::Hold;
        }

        if !candle.is_bullish_body() {
            trace!(
                symbol = %asset.symbol,
                change = %change.round_dp(2),
                "Pump rejected: candle body not bullish"
            );
            return Decision::Hold;
        }

        if asset.in_cooldown(now, self.cooldown) {
            trace!(symbol = %asset.symbol, "Pump rejected: cooling down after last sell");
            return Decision::Hold;
        }

        Decision::Buy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Candle;
    use chrono::Duration;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn strategy() -> MomentumBreakout {
        MomentumBreakout::new(
            &MomentumConfig {
                pump_threshold_percent: dec("2"),
                volume_multiple: dec("2"),
            },
            Duration::seconds(60),
        )
    }

    fn candle(open: &str, high: &str, low: &str, close: &str, volume: &str) -> Candle {
        Candle {
            close_time: Utc::now(),
            open: dec(open),
            high: dec(high),
            low: dec(low),
            close: dec(close),
            quote_volume: dec(volume),
        }
    }

    fn evaluate(asset: &mut AssetState, closed: Candle, previous: Candle, now: DateTime<Utc>) -> Decision {
        asset.update_candle(closed.clone());
        let input = EvaluationInput {
            candle: &closed,
            previous: Some(&previous),
            indicator: None,
        };
        strategy().evaluate(asset, &input, now)
    }

    fn pump() -> Candle {
        candle("100", "103.2", "99.8", "103", "400")
    }

    fn quiet() -> Candle {
        candle("99", "100.5", "98.5", "100", "100")
    }

    #[test]
    fn test_buys_on_pump_with_volume_spike() {
        let mut asset = AssetState::new("SOLUSD", "SOL");
        assert_eq!(evaluate(&mut asset, pump(), quiet(), Utc::now()), Decision::Buy);
    }

    #[test]
    fn test_requires_volume_spike() {
        let mut asset = AssetState::new("SOLUSD", "SOL");
        let previous = candle("99", "100.5", "98.5", "100", "250");
        assert_eq!(evaluate(&mut asset, pump(), previous, Utc::now()), Decision::Hold);
    }

    #[test]
    fn test_requires_price_change_above_threshold() {
        let mut asset = AssetState::new("SOLUSD", "SOL");
        let small = candle("100", "101.6", "99.9", "101.5", "400");
        assert_eq!(evaluate(&mut asset, small, quiet(), Utc::now()), Decision::Hold);
    }

    #[test]
    fn test_rejects_long_wick_candle() {
        let mut asset = AssetState::new("SOLUSD", "SOL");
        // open sits in the upper part of the range
        let wicky = candle("100", "103.5", "96", "103", "400");
        assert_eq!(evaluate(&mut asset, wicky, quiet(), Utc::now()), Decision::Hold);
    }

    #[test]
    fn test_cooldown_gates_buy() {
        let now = Utc::now();
        let mut asset = AssetState::new("SOLUSD", "SOL");

        asset.last_sell_time = Some(now - Duration::seconds(59));
        assert_eq!(evaluate(&mut asset, pump(), quiet(), now), Decision::Hold);

        asset.last_sell_time = Some(now - Duration::seconds(61));
        assert_eq!(evaluate(&mut asset, pump(), quiet(), now), Decision::Buy);
    }

    #[test]
    fn test_no_buy_while_holding() {
        let mut asset = AssetState::new("SOLUSD", "SOL");
        assert!(asset.begin_entry());
        asset.confirm_entry(dec("103"), dec("101.5"), Utc::now());
        assert_eq!(evaluate(&mut asset, pump(), quiet(), Utc::now()), Decision::Hold);
    }

    #[test]
    fn test_decides_on_given_candle_not_cached_one() {
        // asset still carries the quiet candle from the last cycle
        let mut asset = AssetState::new("SOLUSD", "SOL");
        asset.update_candle(quiet());
        let closed = pump();
        let previous = quiet();
        let input = EvaluationInput {
            candle: &closed,
            previous: Some(&previous),
            indicator: None,
        };
        assert_eq!(strategy().evaluate(&asset, &input, Utc::now()), Decision::Buy);

        asset.update_candle(pump());
        let input = EvaluationInput {
            candle: &previous,
            previous: Some(&previous),
            indicator: None,
        };
        assert_eq!(strategy().evaluate(&asset, &input, Utc::now()), Decision::Hold);
    }

    #[test]
    fn test_missing_previous_candle_holds() {
        let mut asset = AssetState::new("SOLUSD", "SOL");
        let closed = pump();
        asset.update_candle(closed.clone());
        let input = EvaluationInput {
            candle: &closed,
            previous: None,
            indicator: None,
        };
        assert_eq!(strategy().evaluate(&asset, &input, Utc::now()), Decision::Hold);
    }
}
