// src/types.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Available balance per currency code.
pub type Wallet = HashMap<String, Decimal>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

/// Best bid/ask/last-trade update for one symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    pub last: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    pub timestamp: u64,
}

/// One OHLCV bar. Volume is expressed in the quote currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub close_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub quote_volume: Decimal,
}

impl Default for Candle {
    fn default() -> Self {
        Self {
            close_time: DateTime::<Utc>::UNIX_EPOCH,
            open: Decimal::ZERO,
            high: Decimal::ZERO,
            low: Decimal::ZERO,
            close: Decimal::ZERO,
            quote_volume: Decimal::ZERO,
        }
    }
}

impl Candle {
    /// Percentage move of the body, `(close - open) / open * 100`.
    pub fn percentage_change(&self) -> Decimal {
        if self.open.is_zero() {
            return Decimal::ZERO;
        }
        (self.close - self.open) / self.open * Decimal::ONE_HUNDRED
    }

    /// True breakout candle: open in the lower third of the range, close in the upper third.
    pub fn is_bullish_body(&self) -> bool {
        let range = self.high - self.low;
        if range <= Decimal::ZERO {
            return false;
        }
        let three = Decimal::from(3);
        (self.open - self.low) * three < range && (self.close - self.low) * three > range * Decimal::TWO
    }

    pub fn midpoint(&self) -> Decimal {
        (self.high + self.low) / Decimal::TWO
    }
}

/// Entry of the exchange's ticker snapshot used to build the trading universe.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSummary {
    pub base_currency: String,
    pub quote_currency: String,
    pub volume: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Hold,
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub base_currency: String,
    pub quote_currency: String,
    pub side: Side,
    pub order_type: OrderType,
    pub amount: Decimal,
    /// Limit price for limit orders, reference price for market orders.
    pub price: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    pub status: OrderStatus,
    pub order_id: String,
    pub filled_price: Option<Decimal>,
    pub filled_amount: Option<Decimal>,
    pub message: Option<String>,
}

impl OrderResult {
    pub fn filled(order_id: String, price: Decimal, amount: Decimal) -> Self {
        Self {
            status: OrderStatus::Success,
            order_id,
            filled_price: Some(price),
            filled_amount: Some(amount),
            message: None,
        }
    }

    pub fn rejected(order_id: String, message: impl Into<String>) -> Self {
        Self {
            status: OrderStatus::Error,
            order_id,
            filled_price: None,
            filled_amount: None,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OrderStatus::Success
    }
}

/// Binance kline interval code for a candle period, if the exchange offers one.
pub fn interval_code(period_secs: u64) -> Option<&'static str> {
    let code = match period_secs {
        60 => "1m",
        180 => "3m",
        300 => "5m",
        900 => "15m",
        1800 => "30m",
        3600 => "1h",
        7200 => "2h",
        14400 => "4h",
        21600 => "6h",
        28800 => "8h",
        43200 => "12h",
        86400 => "1d",
        259200 => "3d",
        604800 => "1w",
        _ => return None,
    };
    Some(code)
}
