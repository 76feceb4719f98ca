//! Core domain types and logic.

pub mod series;
pub mod regime;
pub mod strategy;
pub mod backtest;
pub mod metrics;
pub mod config_validation;
pub mod error;
