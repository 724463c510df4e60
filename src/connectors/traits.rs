// src/connectors/traits.rs
use crate::types::{Candle, MarketSummary, OrderRequest, OrderResult, Ticker, Wallet};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::mpsc;

#[async_trait]
pub trait MarketData: Send + Sync {
    /// Ticker snapshot of every tradable pair, keyed by symbol.
    async fn get_tickers(&self) -> Result<HashMap<String, MarketSummary>>;

    /// Most recent `limit` candles, oldest first. The last one is still forming.
    async fn get_candles(&self, symbol: &str, period_secs: u64, limit: u16) -> Result<Vec<Candle>>;
}

#[async_trait]
pub trait PriceStream: Send + Sync {
    /// Starts pushing bid/ask/last updates for `symbols` into `sender`.
    async fn subscribe_prices(&self, symbols: Vec<String>, sender: mpsc::Sender<Ticker>)
        -> Result<()>;
}

#[async_trait]
pub trait ExecutionHandler: Send + Sync {
    /// An exchange rejection comes back as `Ok` with `OrderStatus::Error`;
    /// `Err` means the order may not have reached the exchange.
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderResult>;

    async fn get_available_balances(&self) -> Result<Wallet>;
}
