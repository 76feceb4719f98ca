//! regimetrader: volatility-regime backtester.
//!
//! Fits a Gaussian hidden Markov model to daily returns over a training
//! window, labels the highest-variance state, and replays a price series
//! under buy-and-hold or a regime-conditioned exposure rule.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
