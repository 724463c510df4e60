// src/connectors/messages.rs
use rust_decimal::Decimal;
use serde::de::IgnoredAny;
use serde::Deserialize;

/// Element of the `!ticker@arr` stream payload (24h rolling window ticker).
#[derive(Debug, Deserialize)]
pub struct BinanceTickerEvent {
    #[serde(rename = "E")]
    pub event_time: u64,

    #[serde(rename = "s")]
    pub symbol: String,

    #[serde(rename = "c")]
    pub last_price: Decimal,

    #[serde(rename = "b")]
    pub best_bid: Decimal,

    #[serde(rename = "a")]
    pub best_ask: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeInfo {
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub symbol: String,
    pub status: String,
    pub base_asset: String,
    pub quote_asset: String,
}

/// Entry of `GET /api/v3/ticker/24hr`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTicker {
    pub symbol: String,
    #[serde(default)]
    pub quote_volume: Decimal,
}

/// Kline row: `[open time, open, high, low, close, volume, close time, quote volume,
/// trades, taker base volume, taker quote volume, ignore]`. Only the OHLC, close time
/// and quote volume are kept.
pub type RawKline = (
    IgnoredAny,
    Decimal,
    Decimal,
    Decimal,
    Decimal,
    IgnoredAny,
    i64,
    Decimal,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
);

#[derive(Debug, Deserialize)]
pub struct AccountInfo {
    pub balances: Vec<Balance>,
}

#[derive(Debug, Deserialize)]
pub struct Balance {
    pub asset: String,
    pub free: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinanceOrderResponse {
    pub order_id: u64,
    pub symbol: String,
    pub status: String,
    #[serde(default)]
    pub executed_qty: Decimal,
    #[serde(default)]
    pub cummulative_quote_qty: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct BinanceErrorBody {
    pub code: i64,
    pub msg: String,
}
