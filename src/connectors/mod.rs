// src/connectors/mod.rs
pub mod binance;
pub mod messages;
#[cfg(test)]
pub mod mock;
pub mod paper;
pub mod traits;
