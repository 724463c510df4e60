// src/core/mod.rs
pub mod asset;
pub mod engine;
pub mod stop_loss;
