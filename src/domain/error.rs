//! Domain error types.

use chrono::NaiveDate;

/// Reasons a regime model cannot be fitted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitError {
    #[error("state count must be at least 1, got {n_states}")]
    InvalidStateCount { n_states: usize },

    #[error("insufficient data: have {observations} observations, need {minimum}")]
    InsufficientData { observations: usize, minimum: usize },

    #[error("observation {index} is not a finite number")]
    NonFiniteObservation { index: usize },

    #[error("model degenerated at iteration {iteration}: {reason}")]
    Degenerate { iteration: usize, reason: String },
}

/// Top-level error type for regimetrader.
#[derive(Debug, thiserror::Error)]
pub enum RegimeTraderError {
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("model fit failed: {0}")]
    Fit(#[from] FitError),

    #[error("corrupt model at {path}: {reason}")]
    CorruptModel { path: String, reason: String },

    #[error("date {date} not aligned with series: {reason}")]
    DataAlignment { date: NaiveDate, reason: String },

    #[error("price data error: {reason}")]
    PriceData { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RegimeTraderError {
    /// Process exit status reported for this error family.
    pub fn exit_status(&self) -> u8 {
        match self {
            RegimeTraderError::Io(_) | RegimeTraderError::PriceData { .. } => 1,
            RegimeTraderError::Configuration { .. }
            | RegimeTraderError::ConfigParse { .. }
            | RegimeTraderError::ConfigMissing { .. }
            | RegimeTraderError::ConfigInvalid { .. } => 2,
            RegimeTraderError::DataAlignment { .. } => 3,
            RegimeTraderError::Fit(_) => 4,
            RegimeTraderError::CorruptModel { .. } => 5,
        }
    }
}

impl From<&RegimeTraderError> for std::process::ExitCode {
    fn from(err: &RegimeTraderError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}
