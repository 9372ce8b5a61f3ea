//! Core domain types and logic.

pub mod ohlcv;
pub mod instrument;
pub mod rule;
pub mod indicator;
pub mod signal;
pub mod sizing;
pub mod ledger;
pub mod portfolio;
pub mod metrics;
pub mod backtest;
pub mod sweep;
pub mod config_validation;
pub mod error;
