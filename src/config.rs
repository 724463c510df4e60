// src/config.rs

use crate::types::interval_code;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Momentum,
    Oscillator,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MomentumConfig {
    /// Minimum candle body move, in percent, to count as a pump.
    pub pump_threshold_percent: Decimal,
    /// Closed candle volume must exceed this multiple of the previous candle's.
    pub volume_multiple: Decimal,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OscillatorConfig {
    pub rsi_period: usize,
    pub oversold: f64,
    pub overbought: f64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InitialStop {
    /// Midpoint of the candle that triggered the entry.
    Midpoint,
    /// Flat `initial_percent` below the buy price.
    BelowEntry,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StopLossConfig {
    pub activation_percent: Decimal,
    pub trail_percent: Decimal,
    pub initial: InitialStop,
    pub initial_percent: Decimal,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub secret_key: String,
    pub rest_url: String,
    pub stream_url: String,

    pub quote_currency: String,
    pub excluded_currencies: Vec<String>,

    pub live_trading: bool,
    pub paper_quote_balance: Decimal,
    pub stake_size: Decimal,
    pub balance_low_water_mark: Decimal,
    pub lot_size: Decimal,
    pub max_open_positions: usize,

    pub candle_period_secs: u64,
    pub candle_limit: u16,
    pub candle_close_offset_secs: u64,
    pub skip_first_cycle: bool,

    pub buy_cooldown_secs: u64,
    pub min_hold_secs: u64,

    pub wallet_retry_attempts: u32,
    pub wallet_retry_delay_secs: u64,

    pub log_dir: String,

    pub strategy: StrategyKind,
    pub momentum: MomentumConfig,
    pub oscillator: OscillatorConfig,
    pub stop_loss: StopLossConfig,
}

impl AppConfig {
    /// Defaults, then an optional `Settings` file, then `APP_*` environment variables.
    pub fn new() -> Result<Self, ConfigError> {
        let builder = Self::defaults()?
            .add_source(File::with_name("Settings").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("excluded_currencies"),
            );

        Self::finish(builder)
    }

    /// Defaults overlaid with an inline TOML document.
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let builder =
            Self::defaults()?.add_source(File::from_str(toml, config::FileFormat::Toml));
        Self::finish(builder)
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("api_key", "")?
            .set_default("secret_key", "")?
            .set_default("rest_url", "https://api.binance.us")?
            .set_default("stream_url", "wss://stream.binance.us:9443")?
            .set_default("quote_currency", "USD")?
            .set_default(
                "excluded_currencies",
                vec!["USDC", "BUSD", "USDT", "DAI", "BTC", "ETH", "PAX", "XRP"],
            )?
            .set_default("live_trading", false)?
            .set_default("paper_quote_balance", "5000")?
            .set_default("stake_size", "50")?
            .set_default("balance_low_water_mark", "1000")?
            .set_default("lot_size", "0.01")?
            .set_default("max_open_positions", 10)?
            .set_default("candle_period_secs", 300)?
            .set_default("candle_limit", 100)?
            .set_default("candle_close_offset_secs", 15)?
            .set_default("skip_first_cycle", true)?
            .set_default("buy_cooldown_secs", 60)?
            .set_default("min_hold_secs", 180)?
            .set_default("wallet_retry_attempts", 10)?
            .set_default("wallet_retry_delay_secs", 30)?
            .set_default("log_dir", "logs")?
            .set_default("strategy", "momentum")?
            .set_default("momentum.pump_threshold_percent", "2")?
            .set_default("momentum.volume_multiple", "2")?
            .set_default("oscillator.rsi_period", 14)?
            .set_default("oscillator.oversold", 30.0)?
            .set_default("oscillator.overbought", 70.0)?
            .set_default("stop_loss.activation_percent", "3")?
            .set_default("stop_loss.trail_percent", "1")?
            .set_default("stop_loss.initial", "midpoint")?
            .set_default("stop_loss.initial_percent", "2")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if interval_code(self.candle_period_secs).is_none() {
            return Err(invalid(format!(
                "candle_period_secs={} is not a supported kline interval",
                self.candle_period_secs
            )));
        }
        // closed candle plus the one before it, plus the one still forming
        if self.candle_limit < 3 {
            return Err(invalid("candle_limit must be at least 3".to_string()));
        }
        if self.stake_size <= Decimal::ZERO {
            return Err(invalid("stake_size must be positive".to_string()));
        }
        if self.lot_size <= Decimal::ZERO {
            return Err(invalid("lot_size must be positive".to_string()));
        }
        if self.wallet_retry_attempts == 0 {
            return Err(invalid("wallet_retry_attempts must be at least 1".to_string()));
        }
        if self.stop_loss.trail_percent < Decimal::ZERO
            || self.stop_loss.trail_percent >= Decimal::ONE_HUNDRED
        {
            return Err(invalid("stop_loss.trail_percent must be in [0, 100)".to_string()));
        }
        if self.stop_loss.initial_percent < Decimal::ZERO
            || self.stop_loss.initial_percent >= Decimal::ONE_HUNDRED
        {
            return Err(invalid("stop_loss.initial_percent must be in [0, 100)".to_string()));
        }
        if self.oscillator.rsi_period == 0 {
            return Err(invalid("oscillator.rsi_period must be positive".to_string()));
        }
        // RSI is computed over the closed candles and needs rsi_period of warm-up
        if self.strategy == StrategyKind::Oscillator
            && usize::from(self.candle_limit) <= self.oscillator.rsi_period + 1
        {
            return Err(invalid(format!(
                "candle_limit={} is too short for oscillator.rsi_period={}",
                self.candle_limit, self.oscillator.rsi_period
            )));
        }
        if self.oscillator.oversold >= self.oscillator.overbought {
            return Err(invalid(
                "oscillator.oversold must be below oscillator.overbought".to_string(),
            ));
        }
        if self.live_trading && (self.api_key.is_empty() || self.secret_key.is_empty()) {
            return Err(invalid(
                "api_key and secret_key are required for live trading".to_string(),
            ));
        }
        Ok(())
    }

    pub fn candle_period(&self) -> Duration {
        Duration::from_secs(self.candle_period_secs)
    }

    pub fn candle_close_offset(&self) -> Duration {
        Duration::from_secs(self.candle_close_offset_secs)
    }

    pub fn buy_cooldown(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.buy_cooldown_secs as i64)
    }

    pub fn min_hold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.min_hold_secs as i64)
    }

    pub fn wallet_retry_delay(&self) -> Duration {
        Duration::from_secs(self.wallet_retry_delay_secs)
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Message(message)
}
