// src/core/asset.rs
use crate::types::{Candle, MarketSummary};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Lifecycle of one asset. `Entering` and `Exiting` mark an order in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetPhase {
    Idle,
    Entering,
    Holding,
    Exiting,
}

/// Market view, position and risk state of one tradable pair.
#[derive(Debug, Clone)]
pub struct AssetState {
    pub symbol: String,
    pub base_currency: String,

    /// Last completed candle.
    pub candle: Candle,

    pub price: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,

    phase: AssetPhase,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    pub stop_loss: Decimal,
    pub max_price: Decimal,
    pub trailing_active: bool,

    pub last_buy_time: Option<DateTime<Utc>>,
    pub last_sell_time: Option<DateTime<Utc>>,
}

impl AssetState {
    pub fn new(symbol: impl Into<String>, base_currency: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            base_currency: base_currency.into(),
            candle: Candle::default(),
            price: Decimal::ZERO,
            bid: Decimal::ZERO,
            ask: Decimal::ZERO,
            phase: AssetPhase::Idle,
            buy_price: Decimal::ZERO,
            sell_price: Decimal::ZERO,
            stop_loss: Decimal::ZERO,
            max_price: Decimal::ZERO,
            trailing_active: false,
            last_buy_time: None,
            last_sell_time: None,
        }
    }

    pub fn phase(&self) -> AssetPhase {
        self.phase
    }

    pub fn has_position(&self) -> bool {
        self.phase == AssetPhase::Holding
    }

    pub fn update_candle(&mut self, candle: Candle) {
        self.candle = candle;
    }

    pub fn update_prices(&mut self, last: Decimal, bid: Decimal, ask: Decimal) {
        self.price = last;
        self.bid = bid;
        self.ask = ask;
    }

    /// Percentage move of the last candle body.
    pub fn percentage_price_change(&self) -> Decimal {
        self.candle.percentage_change()
    }

    /// Realized profit of the last round trip, in percent.
    pub fn profit_loss_percent(&self) -> Decimal {
        if self.buy_price.is_zero() {
            return Decimal::ZERO;
        }
        (self.sell_price - self.buy_price) / self.buy_price * Decimal::ONE_HUNDRED
    }

    pub fn candle_midpoint(&self) -> Decimal {
        self.candle.midpoint()
    }

    /// Price a buy is sized and limited at: the ask, or the close before the stream delivered one.
    pub fn entry_reference_price(&self) -> Decimal {
        if self.ask > Decimal::ZERO {
            self.ask
        } else {
            self.candle.close
        }
    }

    /// Price a sell is expected to fill at.
    pub fn exit_reference_price(&self) -> Decimal {
        if self.bid > Decimal::ZERO {
            self.bid
        } else if self.price > Decimal::ZERO {
            self.price
        } else {
            self.candle.close
        }
    }

    pub fn in_cooldown(&self, now: DateTime<Utc>, cooldown: chrono::Duration) -> bool {
        match self.last_sell_time {
            Some(sold_at) => now - sold_at < cooldown,
            None => false,
        }
    }

    pub fn held_for(&self, now: DateTime<Utc>) -> chrono::Duration {
        match self.last_buy_time {
            Some(bought_at) => now - bought_at,
            None => chrono::Duration::zero(),
        }
    }

    /// Idle -> Entering. Returns false when an order is already in flight or a position is open.
    pub fn begin_entry(&mut self) -> bool {
        if self.phase != AssetPhase::Idle {
            return false;
        }
        self.phase = AssetPhase::Entering;
        true
    }

    pub fn abort_entry(&mut self) {
        if self.phase == AssetPhase::Entering {
            self.phase = AssetPhase::Idle;
        }
    }

    /// Entering -> Holding with the filled price and the static stop floor.
    pub fn confirm_entry(&mut self, buy_price: Decimal, stop_loss: Decimal, now: DateTime<Utc>) {
        self.phase = AssetPhase::Holding;
        self.buy_price = buy_price;
        self.stop_loss = stop_loss;
        self.max_price = buy_price;
        self.trailing_active = false;
        self.last_buy_time = Some(now);
    }

    /// Holding -> Exiting. Only the first caller wins; later triggers see no position.
    pub fn begin_exit(&mut self) -> bool {
        if self.phase != AssetPhase::Holding {
            return false;
        }
        self.phase = AssetPhase::Exiting;
        true
    }

    pub fn record_exit(&mut self, sell_price: Decimal, now: DateTime<Utc>) {
        self.sell_price = sell_price;
        self.last_sell_time = Some(now);
    }

    /// Back to the flat state after a sell, successful or not.
    pub fn reset(&mut self) {
        self.phase = AssetPhase::Idle;
        self.buy_price = Decimal::ZERO;
        self.sell_price = Decimal::ZERO;
        self.stop_loss = Decimal::ZERO;
        self.max_price = Decimal::ZERO;
        self.trailing_active = false;
    }
}

/// Builds the trading universe: pairs quoted in `quote_currency` whose base is not excluded.
pub fn discover_assets(
    tickers: &HashMap<String, MarketSummary>,
    quote_currency: &str,
    excluded: &[String],
) -> Vec<AssetState> {
    let mut assets: Vec<AssetState> = tickers
        .iter()
        .filter(|(_, summary)| {
            summary.quote_currency.eq_ignore_ascii_case(quote_currency)
                && !excluded
                    .iter()
                    .any(|coin| coin.eq_ignore_ascii_case(&summary.base_currency))
        })
        .map(|(symbol, summary)| AssetState::new(symbol.clone(), summary.base_currency.clone()))
        .collect();
    assets.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    assets
}
