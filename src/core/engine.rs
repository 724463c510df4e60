// src/core/engine.rs
use crate::config::AppConfig;
use crate::connectors::traits::{ExecutionHandler, MarketData};
use crate::core::asset::{discover_assets, AssetPhase, AssetState};
use crate::core::stop_loss::StopLossController;
use crate::error::EngineError;
use crate::logging::LEDGER;
use crate::strategies::traits::{EvaluationInput, Strategy};
use crate::strategies::SignalEvaluator;
use crate::types::{Decision, OrderRequest, OrderResult, OrderType, Side, Ticker, Wallet};
use crate::utils::precision::{normalize_quantity, rounded_shares};
use crate::utils::schedule::next_cycle_delay;
use anyhow::{anyhow, Context, Result};
use backoff::backoff::Constant;
use backoff::future::retry_notify;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

struct EngineState {
    assets: BTreeMap<String, AssetState>,
    wallet: Wallet,
    first_cycle: bool,
}

/// Owns every `AssetState` and the wallet cache behind one lock, and drives the
/// candle loop and the price loop against them. Clones share the same state.
#[derive(Clone)]
pub struct TradingEngine {
    config: Arc<AppConfig>,
    market: Arc<dyn MarketData>,
    execution: Arc<dyn ExecutionHandler>,
    evaluator: Arc<SignalEvaluator>,
    stop_loss: StopLossController,
    state: Arc<Mutex<EngineState>>,
}

impl TradingEngine {
    pub fn new(
        config: AppConfig,
        market: Arc<dyn MarketData>,
        execution: Arc<dyn ExecutionHandler>,
    ) -> Self {
        let evaluator = SignalEvaluator::from_config(&config);
        let stop_loss = StopLossController::new(&config.stop_loss);
        Self {
            config: Arc::new(config),
            market,
            execution,
            evaluator: Arc::new(evaluator),
            stop_loss,
            state: Arc::new(Mutex::new(EngineState {
                assets: BTreeMap::new(),
                wallet: Wallet::new(),
                first_cycle: true,
            })),
        }
    }

    /// Loads the trading universe from the exchange's ticker snapshot.
    pub async fn bootstrap(&self) -> Result<usize> {
        let tickers = self
            .market
            .get_tickers()
            .await
            .context("Failed to load ticker snapshot")?;

        let assets = discover_assets(
            &tickers,
            &self.config.quote_currency,
            &self.config.excluded_currencies,
        );

        let mut state = self.state.lock().await;
        for asset in assets {
            state.assets.insert(asset.symbol.clone(), asset);
        }

        let count = state.assets.len();
        if count == 0 {
            warn!(
                "No tradable {} pairs found among {} tickers",
                self.config.quote_currency,
                tickers.len()
            );
        } else {
            info!(
                "Tracking {} {} pairs with the {} strategy (indicator: {})",
                count,
                self.config.quote_currency,
                self.evaluator.name(),
                self.evaluator.indicator().map_or("none", |i| i.name())
            );
        }
        for symbol in state.assets.keys() {
            if let Some(summary) = tickers.get(symbol) {
                debug!("{}: 24h volume {} {}", symbol, summary.volume, summary.quote_currency);
            }
        }
        Ok(count)
    }

    pub async fn symbols(&self) -> Vec<String> {
        self.state.lock().await.assets.keys().cloned().collect()
    }

    #[cfg(test)]
    pub async fn snapshot(&self, symbol: &str) -> Option<AssetState> {
        self.state.lock().await.assets.get(symbol).cloned()
    }

    #[cfg(test)]
    pub async fn wallet_balance(&self, currency: &str) -> Decimal {
        self.state
            .lock()
            .await
            .wallet
            .get(currency)
            .copied()
            .unwrap_or_default()
    }

    /// Replaces the wallet cache with the exchange's balances, retrying with a fixed delay.
    pub async fn reconcile_wallet(&self) -> Result<(), EngineError> {
        let attempts = self.config.wallet_retry_attempts;
        let counter = AtomicU32::new(0);
        let counter = &counter;
        let execution = &self.execution;

        let wallet = retry_notify(
            Constant::new(self.config.wallet_retry_delay()),
            move || async move {
                let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
                execution.get_available_balances().await.map_err(|e| {
                    if attempt >= attempts {
                        backoff::Error::permanent(e)
                    } else {
                        backoff::Error::transient(e)
                    }
                })
            },
            |e: anyhow::Error, delay: Duration| {
                warn!(
                    "Wallet refresh failed ({}), retrying in {}s",
                    e,
                    delay.as_secs()
                );
            },
        )
        .await
        .map_err(|source| EngineError::WalletUnavailable { attempts, source })?;

        debug!("Wallet reconciled: {} currencies", wallet.len());
        self.state.lock().await.wallet = wallet;
        Ok(())
    }

    /// One slow-loop tick: reconcile the wallet, then evaluate every asset in turn.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<(), EngineError> {
        self.reconcile_wallet().await?;

        let trade = {
            let mut state = self.state.lock().await;
            let trade = !(self.config.skip_first_cycle && state.first_cycle);
            state.first_cycle = false;
            trade
        };
        if !trade {
            info!("First cycle since startup: refreshing candles without trading");
        }

        for symbol in self.symbols().await {
            if let Err(e) = self.evaluate_asset(&symbol, now, trade).await {
                if e.is_business_rejection() {
                    warn!("{}", e);
                } else {
                    error!("{}", e);
                }
            }
        }

        self.log_cycle_summary().await;
        Ok(())
    }

    async fn evaluate_asset(
        &self,
        symbol: &str,
        now: DateTime<Utc>,
        trade: bool,
    ) -> Result<(), EngineError> {
        let candles = self
            .market
            .get_candles(
                symbol,
                self.config.candle_period_secs,
                self.config.candle_limit,
            )
            .await
            .map_err(|source| EngineError::MarketData {
                symbol: symbol.to_string(),
                source,
            })?;

        let n = candles.len();
        if n < 3 {
            debug!("{}: only {} candles, skipping", symbol, n);
            return Ok(());
        }
        // candles[n-1] is still forming
        let closed = &candles[n - 2];
        let previous = &candles[n - 3];
        let indicator = self
            .evaluator
            .indicator()
            .and_then(|indicator| indicator.compute(&candles[..n - 1]).last().copied().flatten());

        let decision = {
            let mut state = self.state.lock().await;
            let asset = state
                .assets
                .get_mut(symbol)
                .ok_or_else(|| EngineError::UnknownAsset(symbol.to_string()))?;
            asset.update_candle(closed.clone());
            if !trade {
                return Ok(());
            }

            let input = EvaluationInput {
                candle: closed,
                previous: Some(previous),
                indicator,
            };
            self.evaluator.evaluate(asset, &input, now)
        };

        match decision {
            Decision::Buy => self.buy(symbol, now).await,
            Decision::Sell => self.sell(symbol, now).await.map(|_| ()),
            Decision::Hold => Ok(()),
        }
    }

    /// Opens a position worth one stake. The asset is ENTERING while the order is in flight.
    pub async fn buy(&self, symbol: &str, now: DateTime<Utc>) -> Result<(), EngineError> {
        let quote = self.config.quote_currency.clone();

        let request = {
            let mut state = self.state.lock().await;
            let open_positions = state
                .assets
                .values()
                .filter(|a| matches!(a.phase(), AssetPhase::Entering | AssetPhase::Holding))
                .count();
            let available = state.wallet.get(&quote).copied().unwrap_or_default();

            let asset = state
                .assets
                .get_mut(symbol)
                .ok_or_else(|| EngineError::UnknownAsset(symbol.to_string()))?;
            if asset.phase() != AssetPhase::Idle {
                return Ok(());
            }

            if open_positions >= self.config.max_open_positions {
                return Err(EngineError::PositionLimit(self.config.max_open_positions));
            }

            let required = self
                .config
                .balance_low_water_mark
                .max(self.config.stake_size);
            if available < required {
                return Err(EngineError::InsufficientFunds {
                    symbol: symbol.to_string(),
                    currency: quote,
                    available,
                    required,
                });
            }

            let price = asset.entry_reference_price();
            if price <= Decimal::ZERO {
                return Err(EngineError::NoPrice(symbol.to_string()));
            }
            let amount = rounded_shares(self.config.stake_size, price, self.config.lot_size);
            if amount.is_zero() {
                return Err(EngineError::ZeroQuantity {
                    symbol: symbol.to_string(),
                    price,
                });
            }

            asset.begin_entry();
            OrderRequest {
                symbol: symbol.to_string(),
                base_currency: asset.base_currency.clone(),
                quote_currency: quote.clone(),
                side: Side::Buy,
                order_type: OrderType::Limit,
                amount,
                price,
            }
        };

        info!(
            "Pump detected on {}: buying {} @ {}",
            symbol, request.amount, request.price
        );
        let outcome = self.execution.place_order(&request).await;

        let mut state = self.state.lock().await;
        let EngineState { assets, wallet, .. } = &mut *state;
        let asset = assets
            .get_mut(symbol)
            .ok_or_else(|| EngineError::UnknownAsset(symbol.to_string()))?;

        match outcome {
            Ok(result) if result.is_success() => {
                let buy_price = result.filled_price.unwrap_or(request.price);
                let stop_loss = self.stop_loss.initial_stop(asset, buy_price);
                asset.confirm_entry(buy_price, stop_loss, now);
                *wallet.entry(quote).or_default() -= self.config.stake_size;

                info!(
                    target: LEDGER,
                    symbol,
                    order_id = %result.order_id,
                    amount = %result.filled_amount.unwrap_or(request.amount),
                    price = %buy_price,
                    stop_loss = %stop_loss,
                    "BUY"
                );
                Ok(())
            }
            Ok(result) => {
                asset.abort_entry();
                Err(EngineError::OrderRejected {
                    symbol: symbol.to_string(),
                    side: "buy".to_string(),
                    reason: result.message.unwrap_or_default(),
                })
            }
            Err(source) => {
                asset.abort_entry();
                Err(EngineError::Execution {
                    symbol: symbol.to_string(),
                    source,
                })
            }
        }
    }

    /// Closes the position in `symbol`. Returns false when there was none to close,
    /// which is also what a second concurrent caller sees.
    pub async fn sell(&self, symbol: &str, now: DateTime<Utc>) -> Result<bool, EngineError> {
        {
            let mut state = self.state.lock().await;
            let asset = state
                .assets
                .get_mut(symbol)
                .ok_or_else(|| EngineError::UnknownAsset(symbol.to_string()))?;
            if !asset.begin_exit() {
                return Ok(false);
            }
        }

        self.complete_exit(symbol, now).await?;
        Ok(true)
    }

    /// Submits the exit order of an asset already in EXITING, records the outcome and
    /// resets the asset to flat whether the order went through or not.
    async fn complete_exit(&self, symbol: &str, now: DateTime<Utc>) -> Result<(), EngineError> {
        let outcome = self.submit_exit_order(symbol).await;

        let mut state = self.state.lock().await;
        let EngineState { assets, wallet, .. } = &mut *state;
        let asset = assets
            .get_mut(symbol)
            .ok_or_else(|| EngineError::UnknownAsset(symbol.to_string()))?;

        let sell_price = outcome
            .as_ref()
            .ok()
            .and_then(|result| result.filled_price)
            .unwrap_or_else(|| asset.exit_reference_price());
        asset.record_exit(sell_price, now);

        match &outcome {
            Ok(result) => {
                wallet.remove(&asset.base_currency);
                info!(
                    target: LEDGER,
                    symbol,
                    order_id = %result.order_id,
                    buy_price = %asset.buy_price,
                    sell_price = %sell_price,
                    pnl_percent = %asset.profit_loss_percent().round_dp(2),
                    "SELL"
                );
            }
            Err(e) => {
                error!(
                    target: LEDGER,
                    symbol,
                    buy_price = %asset.buy_price,
                    "SELL FAILED, position cleared: {}",
                    e
                );
            }
        }

        asset.reset();
        outcome.map(|_| ())
    }

    async fn submit_exit_order(&self, symbol: &str) -> Result<OrderResult, EngineError> {
        let (base, price, mut amount) = {
            let state = self.state.lock().await;
            let asset = state
                .assets
                .get(symbol)
                .ok_or_else(|| EngineError::UnknownAsset(symbol.to_string()))?;
            let amount = state.wallet.get(&asset.base_currency).copied();
            (
                asset.base_currency.clone(),
                asset.exit_reference_price(),
                amount,
            )
        };

        if amount.map_or(true, |a| a <= Decimal::ZERO) {
            debug!("{} balance not cached, refreshing wallet before selling", base);
            match self.execution.get_available_balances().await {
                Ok(fresh) => {
                    amount = fresh.get(&base).copied();
                    self.state.lock().await.wallet = fresh;
                }
                Err(e) => warn!("Wallet refresh before selling {} failed: {}", symbol, e),
            }
        }

        // fees taken in the base coin leave dust below the lot step
        let amount = amount
            .map(|a| normalize_quantity(a, self.config.lot_size))
            .filter(|a| *a > Decimal::ZERO)
            .ok_or_else(|| EngineError::NothingToSell {
                symbol: symbol.to_string(),
                currency: base.clone(),
            })?;

        let request = OrderRequest {
            symbol: symbol.to_string(),
            base_currency: base,
            quote_currency: self.config.quote_currency.clone(),
            side: Side::Sell,
            order_type: OrderType::Market,
            amount,
            price,
        };

        match self.execution.place_order(&request).await {
            Ok(result) if result.is_success() => Ok(result),
            Ok(result) => Err(EngineError::OrderRejected {
                symbol: symbol.to_string(),
                side: "sell".to_string(),
                reason: result.message.unwrap_or_default(),
            }),
            Err(source) => Err(EngineError::Execution {
                symbol: symbol.to_string(),
                source,
            }),
        }
    }

    /// Fast-loop handler. Returns the handle of the sell task when the tick breached the stop.
    pub async fn on_price_update(
        &self,
        ticker: &Ticker,
        now: DateTime<Utc>,
    ) -> Option<JoinHandle<()>> {
        if ticker.last <= Decimal::ZERO {
            return None;
        }

        {
            let mut state = self.state.lock().await;
            let asset = state.assets.get_mut(&ticker.symbol)?;
            asset.update_prices(ticker.last, ticker.bid, ticker.ask);

            if !asset.has_position() {
                return None;
            }
            self.stop_loss.adjust(asset);
            if !self.stop_loss.is_breached(asset) {
                return None;
            }
            if asset.held_for(now) < self.config.min_hold() {
                trace!(
                    "{} below stop {} but inside minimum hold time",
                    asset.symbol,
                    asset.stop_loss
                );
                return None;
            }
            if !asset.begin_exit() {
                return None;
            }
            info!(
                "Stop-loss hit on {}: price {} < stop {}",
                asset.symbol, asset.price, asset.stop_loss
            );
        }

        let engine = self.clone();
        let symbol = ticker.symbol.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = engine.complete_exit(&symbol, now).await {
                error!("Stop-loss exit for {} failed: {}", symbol, e);
            }
        }))
    }

    pub async fn run_price_loop(&self, mut receiver: mpsc::Receiver<Ticker>) {
        while let Some(ticker) = receiver.recv().await {
            self.on_price_update(&ticker, Utc::now()).await;
        }
    }

    pub async fn run_candle_loop(&self) {
        let period = self.config.candle_period();
        let delay = next_cycle_delay(Utc::now(), period, self.config.candle_close_offset());
        info!("First evaluation cycle in {}s", delay.as_secs());

        let mut ticker = interval_at(Instant::now() + delay, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = self.run_cycle(Utc::now()).await {
                error!("Evaluation cycle abandoned: {}", e);
            }
        }
    }

    /// Runs both loops until the price stream ends.
    pub async fn run(&self, receiver: mpsc::Receiver<Ticker>) -> Result<()> {
        tokio::select! {
            _ = self.run_price_loop(receiver) => Err(anyhow!("Price stream closed")),
            _ = self.run_candle_loop() => Ok(()),
        }
    }

    async fn log_cycle_summary(&self) {
        let state = self.state.lock().await;

        let mut movers: Vec<&AssetState> = state.assets.values().collect();
        movers.sort_by(|a, b| b.percentage_price_change().cmp(&a.percentage_price_change()));
        for asset in movers.iter().take(3) {
            debug!(
                "Top mover {}: {}% (close {}, volume {})",
                asset.symbol,
                asset.percentage_price_change().round_dp(2),
                asset.candle.close,
                asset.candle.quote_volume.round_dp(2)
            );
        }

        for asset in state.assets.values().filter(|a| a.has_position()) {
            debug!(
                "Holding {}: bought {}, stop {}, close {}, trailing {}",
                asset.symbol,
                asset.buy_price,
                asset.stop_loss,
                asset.candle.close,
                asset.trailing_active
            );
        }
    }
}
