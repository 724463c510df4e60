// src/connectors/mock.rs
use crate::connectors::traits::{ExecutionHandler, MarketData};
use crate::types::{Candle, MarketSummary, OrderRequest, OrderResult, Wallet};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

/// Scripted exchange for engine tests.
#[derive(Default)]
pub struct MockExchange {
    tickers: Mutex<HashMap<String, MarketSummary>>,
    candles: Mutex<HashMap<String, Vec<Candle>>>,
    failing_candles: Mutex<HashSet<String>>,
    balances: Mutex<Wallet>,
    wallet_failures: AtomicU32,
    balance_calls: AtomicU32,
    reject_orders: AtomicBool,
    fail_orders: AtomicBool,
    orders: Mutex<Vec<OrderRequest>>,
}

impl MockExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_market(&self, symbol: &str, base: &str, quote: &str) {
        self.tickers.lock().unwrap().insert(
            symbol.to_string(),
            MarketSummary {
                base_currency: base.to_string(),
                quote_currency: quote.to_string(),
                volume: Default::default(),
            },
        );
    }

    pub fn set_candles(&self, symbol: &str, candles: Vec<Candle>) {
        self.candles
            .lock()
            .unwrap()
            .insert(symbol.to_string(), candles);
    }

    pub fn fail_candles_for(&self, symbol: &str) {
        self.failing_candles
            .lock()
            .unwrap()
            .insert(symbol.to_string());
    }

    pub fn set_balance(&self, currency: &str, amount: rust_decimal::Decimal) {
        self.balances
            .lock()
            .unwrap()
            .insert(currency.to_string(), amount);
    }

    pub fn remove_balance(&self, currency: &str) {
        self.balances.lock().unwrap().remove(currency);
    }

    /// The next `times` balance requests fail.
    pub fn fail_wallet(&self, times: u32) {
        self.wallet_failures.store(times, Ordering::SeqCst);
    }

    pub fn reject_orders(&self, reject: bool) {
        self.reject_orders.store(reject, Ordering::SeqCst);
    }

    pub fn fail_orders(&self, fail: bool) {
        self.fail_orders.store(fail, Ordering::SeqCst);
    }

    pub fn orders(&self) -> Vec<OrderRequest> {
        self.orders.lock().unwrap().clone()
    }

    pub fn balance_calls(&self) -> u32 {
        self.balance_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketData for MockExchange {
    async fn get_tickers(&self) -> Result<HashMap<String, MarketSummary>> {
        Ok(self.tickers.lock().unwrap().clone())
    }

    async fn get_candles(&self, symbol: &str, _period_secs: u64, _limit: u16) -> Result<Vec<Candle>> {
        if self.failing_candles.lock().unwrap().contains(symbol) {
            return Err(anyhow!("candle request for {} timed out", symbol));
        }
        Ok(self
            .candles
            .lock()
            .unwrap()
            .get(symbol)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl ExecutionHandler for MockExchange {
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderResult> {
        // lets a competing task run while the order is "in flight"
        tokio::task::yield_now().await;

        let order_id = {
            let mut orders = self.orders.lock().unwrap();
            orders.push(request.clone());
            orders.len().to_string()
        };

        if self.fail_orders.load(Ordering::SeqCst) {
            return Err(anyhow!("connection reset while sending order {}", order_id));
        }
        if self.reject_orders.load(Ordering::SeqCst) {
            return Ok(OrderResult::rejected(order_id, "MIN_NOTIONAL"));
        }
        Ok(OrderResult::filled(order_id, request.price, request.amount))
    }

    async fn get_available_balances(&self) -> Result<Wallet> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        let failures = self.wallet_failures.load(Ordering::SeqCst);
        if failures > 0 {
            self.wallet_failures.store(failures - 1, Ordering::SeqCst);
            return Err(anyhow!("wallet endpoint unavailable"));
        }
        Ok(self.balances.lock().unwrap().clone())
    }
}
