//! Run configuration: merging command-line and config-file values, then
//! validating the result before any price data or model is touched.

use chrono::NaiveDate;
use std::path::PathBuf;
use std::str::FromStr;

use crate::domain::backtest::{BacktestConfig, StateInference, DEFAULT_INITIAL_EQUITY};
use crate::domain::error::RegimeTraderError;
use crate::domain::regime::FitOptions;
use crate::domain::series::TrainingWindow;
use crate::domain::strategy::StrategyKind;
use crate::ports::config_port::ConfigPort;

/// Last backtest day when none is given.
pub const DEFAULT_BACKTEST_END: NaiveDate = match NaiveDate::from_ymd_opt(2017, 12, 31) {
    Some(date) => date,
    None => panic!("default backtest end is not a calendar date"),
};

/// Unvalidated settings from one source. `None` means "not given here".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSettings {
    pub csv_file: Option<PathBuf>,
    pub strategy: Option<String>,
    pub backtest_start: Option<NaiveDate>,
    pub backtest_end: Option<NaiveDate>,
    pub initial_equity: Option<f64>,
    pub inference: Option<String>,
    pub training_start: Option<NaiveDate>,
    pub training_end: Option<NaiveDate>,
    pub regimes: Option<i64>,
    pub max_iters: Option<i64>,
    pub tolerance: Option<f64>,
    pub model_path: Option<PathBuf>,
    pub summary: Option<bool>,
}

impl RawSettings {
    /// Read every known key from a config file.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, RegimeTraderError> {
        Ok(Self {
            csv_file: text(config, "data", "csv_file").map(PathBuf::from),
            strategy: text(config, "backtest", "strategy"),
            backtest_start: config.get_date("backtest", "start_date")?,
            backtest_end: config.get_date("backtest", "end_date")?,
            initial_equity: number(config, "backtest", "initial_equity")?,
            inference: text(config, "backtest", "inference"),
            training_start: config.get_date("training", "start_date")?,
            training_end: config.get_date("training", "end_date")?,
            regimes: number(config, "training", "regimes")?,
            max_iters: number(config, "training", "max_iters")?,
            tolerance: number(config, "training", "tolerance")?,
            model_path: text(config, "model", "path").map(PathBuf::from),
            summary: text(config, "report", "summary")
                .map(|_| config.get_bool("report", "summary", false)),
        })
    }

    /// Fill every field left unset here from `fallback`.
    pub fn or(self, fallback: RawSettings) -> Self {
        Self {
            csv_file: self.csv_file.or(fallback.csv_file),
            strategy: self.strategy.or(fallback.strategy),
            backtest_start: self.backtest_start.or(fallback.backtest_start),
            backtest_end: self.backtest_end.or(fallback.backtest_end),
            initial_equity: self.initial_equity.or(fallback.initial_equity),
            inference: self.inference.or(fallback.inference),
            training_start: self.training_start.or(fallback.training_start),
            training_end: self.training_end.or(fallback.training_end),
            regimes: self.regimes.or(fallback.regimes),
            max_iters: self.max_iters.or(fallback.max_iters),
            tolerance: self.tolerance.or(fallback.tolerance),
            model_path: self.model_path.or(fallback.model_path),
            summary: self.summary.or(fallback.summary),
        }
    }
}

fn text(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn number<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, RegimeTraderError> {
    text(config, section, key)
        .map(|s| {
            s.parse::<T>().map_err(|_| RegimeTraderError::ConfigInvalid {
                section: section.to_string(),
                key: key.to_string(),
                reason: format!("'{s}' is not a number"),
            })
        })
        .transpose()
}

/// Fit a fresh model over this window before backtesting.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingPlan {
    pub window: TrainingWindow,
    pub fit: FitOptions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegimeSettings {
    pub model_path: PathBuf,
    /// `None` reuses the model already stored at `model_path`.
    pub training: Option<TrainingPlan>,
}

/// Fully validated settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub csv_file: PathBuf,
    pub strategy: StrategyKind,
    pub backtest: BacktestConfig,
    pub regime: Option<RegimeSettings>,
    pub summary: bool,
}

pub fn validate_run_settings(raw: &RawSettings) -> Result<RunSettings, RegimeTraderError> {
    let csv_file = raw.csv_file.clone().ok_or_else(|| missing("data", "csv_file"))?;
    let strategy: StrategyKind = raw
        .strategy
        .as_deref()
        .ok_or_else(|| missing("backtest", "strategy"))?
        .parse()?;

    let backtest = validate_backtest(raw)?;
    let regime = if strategy.needs_regime_model() {
        Some(validate_regime(raw, strategy)?)
    } else {
        None
    };

    Ok(RunSettings {
        csv_file,
        strategy,
        backtest,
        regime,
        summary: raw.summary.unwrap_or(false),
    })
}

fn validate_backtest(raw: &RawSettings) -> Result<BacktestConfig, RegimeTraderError> {
    let start = raw
        .backtest_start
        .ok_or_else(|| missing("backtest", "start_date"))?;
    let end = raw.backtest_end.unwrap_or(DEFAULT_BACKTEST_END);
    if start > end {
        return Err(invalid(
            "backtest",
            "start_date",
            format!("start date {start} is after end date {end}"),
        ));
    }

    let initial_equity = raw.initial_equity.unwrap_or(DEFAULT_INITIAL_EQUITY);
    if !(initial_equity.is_finite() && initial_equity > 0.0) {
        return Err(invalid(
            "backtest",
            "initial_equity",
            "initial_equity must be positive".to_string(),
        ));
    }

    let inference = match raw.inference.as_deref() {
        Some(mode) => mode.parse::<StateInference>()?,
        None => StateInference::default(),
    };

    Ok(BacktestConfig {
        start_date: start,
        end_date: end,
        initial_equity,
        inference,
    })
}

fn validate_regime(
    raw: &RawSettings,
    strategy: StrategyKind,
) -> Result<RegimeSettings, RegimeTraderError> {
    let model_path = raw.model_path.clone().ok_or_else(|| {
        RegimeTraderError::Configuration {
            reason: format!("strategy {strategy} requires a model path"),
        }
    })?;

    let window = match (raw.training_start, raw.training_end) {
        (Some(start), Some(end)) => Some(TrainingWindow::new(start, end)),
        (Some(_), None) => return Err(missing("training", "end_date")),
        (None, Some(_)) => return Err(missing("training", "start_date")),
        (None, None) => None,
    };

    let training = match window {
        Some(window) => Some(TrainingPlan {
            fit: validate_fit(raw, strategy)?,
            window: validate_training_window(window)?,
        }),
        None => None,
    };

    Ok(RegimeSettings {
        model_path,
        training,
    })
}

fn validate_training_window(window: TrainingWindow) -> Result<TrainingWindow, RegimeTraderError> {
    if window.start_date >= window.end_date {
        return Err(invalid(
            "training",
            "start_date",
            format!(
                "training start {} must be before training end {}",
                window.start_date, window.end_date
            ),
        ));
    }
    Ok(window)
}

fn validate_fit(
    raw: &RawSettings,
    strategy: StrategyKind,
) -> Result<FitOptions, RegimeTraderError> {
    let defaults = FitOptions::default();

    let regimes = raw.regimes.ok_or_else(|| RegimeTraderError::Configuration {
        reason: format!("strategy {strategy} requires a number of regimes"),
    })?;
    if regimes < 1 {
        return Err(invalid(
            "training",
            "regimes",
            format!("regimes must be at least 1, got {regimes}"),
        ));
    }

    let max_iters = raw.max_iters.unwrap_or(defaults.max_iters as i64);
    if max_iters < 1 {
        return Err(invalid(
            "training",
            "max_iters",
            format!("max_iters must be at least 1, got {max_iters}"),
        ));
    }

    let tolerance = raw.tolerance.unwrap_or(defaults.tolerance);
    if !(tolerance.is_finite() && tolerance > 0.0) {
        return Err(invalid(
            "training",
            "tolerance",
            "tolerance must be positive".to_string(),
        ));
    }

    Ok(FitOptions {
        n_states: regimes as usize,
        max_iters: max_iters as usize,
        tolerance,
    })
}

fn missing(section: &str, key: &str) -> RegimeTraderError {
    RegimeTraderError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

fn invalid(section: &str, key: &str, reason: String) -> RegimeTraderError {
    RegimeTraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason,
    }
}
