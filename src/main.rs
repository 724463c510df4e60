// src/main.rs
use crate::config::AppConfig;
use crate::connectors::binance::BinanceClient;
use crate::connectors::paper::PaperExecution;
use crate::connectors::traits::{ExecutionHandler, PriceStream};
use crate::core::engine::TradingEngine;
use anyhow::Context;
use dotenvy::dotenv;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

mod config;
mod connectors;
mod core;
mod error;
mod indicators;
mod logging;
mod strategies;
mod types;
mod utils;

const TICKER_CHANNEL_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();

    let config = match AppConfig::new() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let _guards = match logging::init(&config.log_dir) {
        Ok(guards) => guards,
        Err(e) => {
            eprintln!("Failed to initialize logging: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Fatal engine error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    info!("========================================");
    info!("       PUMP SNIPER - v{}", env!("CARGO_PKG_VERSION"));
    info!("========================================");
    info!(
        "Quote: {} | Stake: {} | Candles: {}s | Mode: {}",
        config.quote_currency,
        config.stake_size,
        config.candle_period_secs,
        if config.live_trading {
            "🚨 LIVE TRADING"
        } else {
            "📝 PAPER TRADING"
        }
    );

    let client = Arc::new(BinanceClient::from_config(&config)?);
    let execution: Arc<dyn ExecutionHandler> = if config.live_trading {
        client.clone()
    } else {
        Arc::new(PaperExecution::new(
            &config.quote_currency,
            config.paper_quote_balance,
        ))
    };

    let engine = TradingEngine::new(config, client.clone(), execution);
    let tracked = engine.bootstrap().await?;
    if tracked == 0 {
        warn!("Nothing to trade; waiting for shutdown");
    }

    let (ticker_tx, ticker_rx) = mpsc::channel(TICKER_CHANNEL_CAPACITY);
    client
        .subscribe_prices(engine.symbols().await, ticker_tx)
        .await
        .context("Failed to start price stream")?;

    tokio::select! {
        result = engine.run(ticker_rx) => result,
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
            info!("Ctrl+C received, shutting down. In-flight orders are not cancelled.");
            Ok(())
        }
    }
}
