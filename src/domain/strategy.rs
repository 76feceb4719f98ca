//! Exposure strategies.
//!
//! [`StrategyKind`] is the name a user picks; [`Strategy`] is the resolved
//! policy the backtest engine runs, carrying everything it needs to decide
//! exposure for a day.

use std::fmt;
use std::str::FromStr;

use crate::domain::error::RegimeTraderError;
use crate::domain::regime::RegimeModel;

/// Which side of the high-volatility regime a filter holds the instrument on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegimePolarity {
    /// Invested only while the active state is the high-volatility state.
    InvestInHighVolatility,
    /// Invested only while the active state is any other state.
    InvestOutsideHighVolatility,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    BuyAndHold,
    RegimeFilter,
    NewRegimeFilter,
}

impl StrategyKind {
    pub const NAMES: [&'static str; 3] = ["buy-and-hold", "regime-filter", "new-regime-filter"];

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::BuyAndHold => "buy-and-hold",
            StrategyKind::RegimeFilter => "regime-filter",
            StrategyKind::NewRegimeFilter => "new-regime-filter",
        }
    }

    pub fn needs_regime_model(&self) -> bool {
        !matches!(self, StrategyKind::BuyAndHold)
    }

    pub fn polarity(&self) -> Option<RegimePolarity> {
        match self {
            StrategyKind::BuyAndHold => None,
            StrategyKind::RegimeFilter => Some(RegimePolarity::InvestInHighVolatility),
            StrategyKind::NewRegimeFilter => Some(RegimePolarity::InvestOutsideHighVolatility),
        }
    }

    /// Bind a regime strategy to the high-volatility state of a fitted model.
    pub fn resolve(&self, model: Option<&RegimeModel>) -> Result<Strategy, RegimeTraderError> {
        match (self.polarity(), model) {
            (None, _) => Ok(Strategy::BuyAndHold),
            (Some(polarity), Some(model)) => Ok(Strategy::RegimeFilter {
                high_volatility_state: model.high_volatility_state(),
                polarity,
            }),
            (Some(_), None) => Err(RegimeTraderError::Configuration {
                reason: format!("strategy {} requires a fitted regime model", self.name()),
            }),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = RegimeTraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "buy-and-hold" => Ok(StrategyKind::BuyAndHold),
            "regime-filter" => Ok(StrategyKind::RegimeFilter),
            "new-regime-filter" => Ok(StrategyKind::NewRegimeFilter),
            other => Err(RegimeTraderError::Configuration {
                reason: format!(
                    "unknown strategy '{other}', expected one of: {}",
                    Self::NAMES.join(", ")
                ),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    BuyAndHold,
    RegimeFilter {
        high_volatility_state: usize,
        polarity: RegimePolarity,
    },
}

impl Strategy {
    pub fn uses_regime(&self) -> bool {
        matches!(self, Strategy::RegimeFilter { .. })
    }

    /// Whether to hold the instrument given the day's active state. A regime
    /// filter with no known state stays flat.
    pub fn is_invested(&self, state: Option<usize>) -> bool {
        match *self {
            Strategy::BuyAndHold => true,
            Strategy::RegimeFilter {
                high_volatility_state,
                polarity,
            } => match (state, polarity) {
                (None, _) => false,
                (Some(s), RegimePolarity::InvestInHighVolatility) => s == high_volatility_state,
                (Some(s), RegimePolarity::InvestOutsideHighVolatility) => {
                    s != high_volatility_state
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::regime::RegimeModelParams;
    use ndarray::array;

    fn sample_model() -> RegimeModel {
        RegimeModel::from_params(RegimeModelParams {
            n_states: 2,
            start_probabilities: array![0.5, 0.5],
            transition_matrix: array![[0.9, 0.1], [0.1, 0.9]],
            means: array![0.0, 0.0],
            variances: array![0.0004, 0.0001],
        })
        .unwrap()
    }

    #[test]
    fn parses_accepted_names() {
        for name in StrategyKind::NAMES {
            let kind: StrategyKind = name.parse().unwrap();
            assert_eq!(kind.name(), name);
            assert_eq!(kind.to_string(), name);
        }
    }

    #[test]
    fn unknown_name_is_configuration_error() {
        let err = "momentum".parse::<StrategyKind>().unwrap_err();
        assert!(matches!(err, RegimeTraderError::Configuration { .. }));
        assert!(err.to_string().contains("momentum"));
    }

    #[test]
    fn buy_and_hold_resolves_without_model() {
        let strategy = StrategyKind::BuyAndHold.resolve(None).unwrap();
        assert_eq!(strategy, Strategy::BuyAndHold);
        assert!(!strategy.uses_regime());
    }

    #[test]
    fn regime_filter_requires_model() {
        let err = StrategyKind::RegimeFilter.resolve(None).unwrap_err();
        assert!(matches!(err, RegimeTraderError::Configuration { .. }));
    }

    #[test]
    fn variants_carry_opposite_polarity() {
        let model = sample_model();
        let filter = StrategyKind::RegimeFilter.resolve(Some(&model)).unwrap();
        let inverse = StrategyKind::NewRegimeFilter.resolve(Some(&model)).unwrap();

        assert_eq!(
            filter,
            Strategy::RegimeFilter {
                high_volatility_state: 0,
                polarity: RegimePolarity::InvestInHighVolatility,
            }
        );
        assert_eq!(
            inverse,
            Strategy::RegimeFilter {
                high_volatility_state: 0,
                polarity: RegimePolarity::InvestOutsideHighVolatility,
            }
        );
    }

    #[test]
    fn exposure_rules() {
        let high = Strategy::RegimeFilter {
            high_volatility_state: 1,
            polarity: RegimePolarity::InvestInHighVolatility,
        };
        let outside = Strategy::RegimeFilter {
            high_volatility_state: 1,
            polarity: RegimePolarity::InvestOutsideHighVolatility,
        };

        assert!(Strategy::BuyAndHold.is_invested(None));
        assert!(high.is_invested(Some(1)));
        assert!(!high.is_invested(Some(0)));
        assert!(!outside.is_invested(Some(1)));
        assert!(outside.is_invested(Some(2)));
        assert!(!high.is_invested(None));
        assert!(!outside.is_invested(None));
    }
}
