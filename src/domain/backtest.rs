//! Day-by-day backtest engine.
//!
//! The engine walks every price date in `[start_date, end_date]` in order.
//! Each day's equity depends only on the previous day's equity and exposure:
//! if the portfolio was invested at the previous close it earns the day's
//! return, otherwise equity carries forward unchanged. The first day records
//! the baseline equity.

use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::{debug, info};

use super::error::RegimeTraderError;
use super::regime::{RegimeModel, StatePath};
use super::series::{window_bounds, PricePoint, ReturnPoint};
use super::strategy::Strategy;

pub const DEFAULT_INITIAL_EQUITY: f64 = 1.0;

/// How the active hidden state for each day is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateInference {
    /// Decode the whole backtest-window return series once.
    #[default]
    Smoothed,
    /// Decode the prefix ending at each day and keep its last state, so a
    /// day's state never depends on later returns.
    Incremental,
}

impl std::str::FromStr for StateInference {
    type Err = RegimeTraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "smoothed" => Ok(StateInference::Smoothed),
            "incremental" => Ok(StateInference::Incremental),
            other => Err(RegimeTraderError::Configuration {
                reason: format!(
                    "unknown inference mode '{other}', expected smoothed or incremental"
                ),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_equity: f64,
    pub inference: StateInference,
}

impl BacktestConfig {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            initial_equity: DEFAULT_INITIAL_EQUITY,
            inference: StateInference::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exposure {
    Flat,
    Invested,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EquityCurvePoint {
    pub date: NaiveDate,
    pub equity: f64,
    /// Active hidden state; always `None` for buy-and-hold.
    pub state: Option<usize>,
    /// Exposure held from this day's close into the next day.
    pub exposure: Exposure,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub strategy: Strategy,
    pub initial_equity: f64,
    pub equity_curve: Vec<EquityCurvePoint>,
}

impl BacktestResult {
    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(self.initial_equity)
    }
}

/// Replay `prices` over the configured window under `strategy`.
///
/// `returns` must be the return series derived from `prices`. A regime
/// strategy needs `model`; its high-volatility state must exist in the model.
pub fn run_backtest(
    prices: &[PricePoint],
    returns: &[ReturnPoint],
    strategy: &Strategy,
    model: Option<&RegimeModel>,
    config: &BacktestConfig,
) -> Result<BacktestResult, RegimeTraderError> {
    let (first, last) = validate_window(prices, config)?;
    validate_strategy(strategy, model)?;
    if !(config.initial_equity.is_finite() && config.initial_equity > 0.0) {
        return Err(RegimeTraderError::Configuration {
            reason: format!("initial equity must be positive, got {}", config.initial_equity),
        });
    }

    let days = &prices[first..=last];
    let window_start = days[0].date;
    let window_end = days[days.len() - 1].date;
    info!(
        days = days.len(),
        start = %window_start,
        end = %window_end,
        "running backtest"
    );

    let returns_by_date: HashMap<NaiveDate, f64> =
        returns.iter().map(|r| (r.date, r.value)).collect();

    let states_by_date = match (strategy.uses_regime(), model) {
        (true, Some(model)) => {
            let evaluation: Vec<&ReturnPoint> = returns
                .iter()
                .filter(|r| r.date >= window_start && r.date <= window_end)
                .collect();
            let values: Vec<f64> = evaluation.iter().map(|r| r.value).collect();
            let path = infer_states(model, &values, config.inference);
            debug!(decoded = path.len(), "state path ready");
            evaluation
                .iter()
                .zip(path)
                .map(|(r, s)| (r.date, s))
                .collect()
        }
        _ => HashMap::new(),
    };

    let mut equity_curve = Vec::with_capacity(days.len());
    let mut equity = config.initial_equity;
    let mut exposure = Exposure::Flat;

    for (offset, day) in days.iter().enumerate() {
        if offset > 0 && exposure == Exposure::Invested {
            let value = returns_by_date.get(&day.date).ok_or_else(|| {
                RegimeTraderError::DataAlignment {
                    date: day.date,
                    reason: "no return recorded for trading day".into(),
                }
            })?;
            equity *= 1.0 + value;
        }

        let state = states_by_date.get(&day.date).copied();
        exposure = if strategy.is_invested(state) {
            Exposure::Invested
        } else {
            Exposure::Flat
        };

        equity_curve.push(EquityCurvePoint {
            date: day.date,
            equity,
            state,
            exposure,
        });
    }

    Ok(BacktestResult {
        strategy: *strategy,
        initial_equity: config.initial_equity,
        equity_curve,
    })
}

fn infer_states(model: &RegimeModel, values: &[f64], inference: StateInference) -> StatePath {
    match inference {
        StateInference::Smoothed => model.decode(values),
        StateInference::Incremental => model.decode_online(values),
    }
}

fn validate_window(
    prices: &[PricePoint],
    config: &BacktestConfig,
) -> Result<(usize, usize), RegimeTraderError> {
    let (Some(first), Some(last)) = (prices.first(), prices.last()) else {
        return Err(RegimeTraderError::Configuration {
            reason: "price series is empty".into(),
        });
    };
    if config.start_date > config.end_date {
        return Err(RegimeTraderError::Configuration {
            reason: format!(
                "backtest start {} is after backtest end {}",
                config.start_date, config.end_date
            ),
        });
    }
    if config.start_date < first.date || config.end_date > last.date {
        return Err(RegimeTraderError::Configuration {
            reason: format!(
                "backtest window {} to {} falls outside available prices {} to {}",
                config.start_date, config.end_date, first.date, last.date
            ),
        });
    }
    window_bounds(prices, config.start_date, config.end_date).ok_or_else(|| {
        RegimeTraderError::Configuration {
            reason: format!(
                "no trading days between {} and {}",
                config.start_date, config.end_date
            ),
        }
    })
}

fn validate_strategy(
    strategy: &Strategy,
    model: Option<&RegimeModel>,
) -> Result<(), RegimeTraderError> {
    let Strategy::RegimeFilter {
        high_volatility_state,
        ..
    } = *strategy
    else {
        return Ok(());
    };
    let model = model.ok_or_else(|| RegimeTraderError::Configuration {
        reason: "regime strategy requires a fitted regime model".into(),
    })?;
    if high_volatility_state >= model.n_states() {
        return Err(RegimeTraderError::Configuration {
            reason: format!(
                "high-volatility state {} does not exist in a {}-state model",
                high_volatility_state,
                model.n_states()
            ),
        });
    }
    Ok(())
}
