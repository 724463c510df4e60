// src/error.rs
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown asset {0}")]
    UnknownAsset(String),

    #[error("insufficient funds to buy {symbol}: only {available} {currency} available (low-water mark {required})")]
    InsufficientFunds {
        symbol: String,
        currency: String,
        available: Decimal,
        required: Decimal,
    },

    #[error("open position limit of {0} reached")]
    PositionLimit(usize),

    #[error("no usable price for {0}")]
    NoPrice(String),

    #[error("order size for {symbol} rounds to zero at price {price}")]
    ZeroQuantity { symbol: String, price: Decimal },

    #[error("no {currency} balance available to sell {symbol}")]
    NothingToSell { symbol: String, currency: String },

    #[error("{side} order for {symbol} rejected: {reason}")]
    OrderRejected {
        symbol: String,
        side: String,
        reason: String,
    },

    #[error("market data unavailable for {symbol}: {source}")]
    MarketData {
        symbol: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("execution failed for {symbol}: {source}")]
    Execution {
        symbol: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("wallet unavailable after {attempts} attempts: {source}")]
    WalletUnavailable {
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },
}

impl EngineError {
    /// Rejections decided locally before any order reaches the exchange.
    pub fn is_business_rejection(&self) -> bool {
        matches!(
            self,
            EngineError::InsufficientFunds { .. }
                | EngineError::PositionLimit(_)
                | EngineError::ZeroQuantity { .. }
                | EngineError::NoPrice(_)
        )
    }
}
