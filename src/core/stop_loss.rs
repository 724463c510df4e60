// src/core/stop_loss.rs
use crate::config::{InitialStop, StopLossConfig};
use crate::core::asset::AssetState;
use rust_decimal::Decimal;
use tracing::{debug, trace};

/// Two-phase exit protection: a static floor set at entry, then a trailing stop
/// that ratchets up behind the high-water mark once the position is far enough in profit.
#[derive(Debug, Clone)]
pub struct StopLossController {
    activation_percent: Decimal,
    trail_percent: Decimal,
    initial: InitialStop,
    initial_percent: Decimal,
}

impl StopLossController {
    pub fn new(config: &StopLossConfig) -> Self {
        Self {
            activation_percent: config.activation_percent,
            trail_percent: config.trail_percent,
            initial: config.initial,
            initial_percent: config.initial_percent,
        }
    }

    /// Static floor for a fresh position bought at `buy_price`.
    pub fn initial_stop(&self, asset: &AssetState, buy_price: Decimal) -> Decimal {
        match self.initial {
            InitialStop::Midpoint => asset.candle_midpoint(),
            InitialStop::BelowEntry => {
                buy_price * (Decimal::ONE - self.initial_percent / Decimal::ONE_HUNDRED)
            }
        }
    }

    /// Re-evaluates the stop after a price tick. The stop never moves down.
    pub fn adjust(&self, asset: &mut AssetState) {
        if asset.buy_price.is_zero() {
            return;
        }

        let unrealized = (asset.price - asset.buy_price) / asset.buy_price;
        let threshold = self.activation_percent / Decimal::ONE_HUNDRED;

        if !asset.trailing_active && unrealized > threshold {
            asset.trailing_active = true;
            asset.max_price = asset.price;
            self.raise_stop(asset);
            debug!(
                symbol = %asset.symbol,
                price = %asset.price,
                stop_loss = %asset.stop_loss,
                "Trailing stop activated"
            );
            return;
        }

        if asset.trailing_active && asset.price > asset.max_price {
            asset.max_price = asset.price;
            self.raise_stop(asset);
            trace!(
                symbol = %asset.symbol,
                max_price = %asset.max_price,
                stop_loss = %asset.stop_loss,
                "Trailing stop raised"
            );
        }
    }

    pub fn is_breached(&self, asset: &AssetState) -> bool {
        asset.price < asset.stop_loss
    }

    fn raise_stop(&self, asset: &mut AssetState) {
        let trail = asset.max_price * (Decimal::ONE - self.trail_percent / Decimal::ONE_HUNDRED);
        if trail > asset.stop_loss {
            asset.stop_loss = trail;
        }
    }
}
