//! Line-oriented text report: one line per simulated day.
//!
//! Buy-and-hold lines read `date equity`; regime strategies append the
//! active state as `date equity state`. Days with no known state print `-`.
//! Equity uses the shortest round-trip float form, so `1.0` keeps its
//! fractional digit.

use std::io::Write;

use crate::domain::backtest::{BacktestResult, EquityCurvePoint};
use crate::domain::error::RegimeTraderError;
use crate::ports::report_port::ReportPort;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Default, Clone, Copy)]
pub struct TextReportAdapter;

impl TextReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

fn format_line(point: &EquityCurvePoint, with_state: bool) -> String {
    let date = point.date.format(DATE_FORMAT);
    if !with_state {
        return format!("{} {:?}", date, point.equity);
    }
    match point.state {
        Some(state) => format!("{} {:?} {}", date, point.equity, state),
        None => format!("{} {:?} -", date, point.equity),
    }
}

impl ReportPort for TextReportAdapter {
    fn write(&self, result: &BacktestResult, out: &mut dyn Write) -> Result<(), RegimeTraderError> {
        let with_state = result.strategy.uses_regime();
        for point in &result.equity_curve {
            writeln!(out, "{}", format_line(point, with_state))?;
        }
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backtest::Exposure;
    use crate::domain::strategy::{RegimePolarity, Strategy};
    use chrono::NaiveDate;

    fn point(day: u32, equity: f64, state: Option<usize>) -> EquityCurvePoint {
        EquityCurvePoint {
            date: NaiveDate::from_ymd_opt(2016, 3, day).unwrap(),
            equity,
            state,
            exposure: Exposure::Invested,
        }
    }

    fn render(result: &BacktestResult) -> String {
        let mut buf = Vec::new();
        TextReportAdapter::new().write(result, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn buy_and_hold_prints_date_and_equity() {
        let result = BacktestResult {
            strategy: Strategy::BuyAndHold,
            initial_equity: 1.0,
            equity_curve: vec![point(1, 1.0, None), point(2, 1.01, None)],
        };
        assert_eq!(render(&result), "2016-03-01 1.0\n2016-03-02 1.01\n");
    }

    #[test]
    fn regime_strategy_appends_state() {
        let result = BacktestResult {
            strategy: Strategy::RegimeFilter {
                high_volatility_state: 1,
                polarity: RegimePolarity::InvestOutsideHighVolatility,
            },
            initial_equity: 1.0,
            equity_curve: vec![
                point(1, 1.0, Some(0)),
                point(2, 0.98, Some(1)),
                point(3, 0.98, None),
            ],
        };
        let text = render(&result);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec!["2016-03-01 1.0 0", "2016-03-02 0.98 1", "2016-03-03 0.98 -"]
        );
    }

    #[test]
    fn whole_equity_keeps_fractional_digit() {
        let result = BacktestResult {
            strategy: Strategy::BuyAndHold,
            initial_equity: 100.0,
            equity_curve: vec![point(1, 100.0, None), point(2, 2.0, None)],
        };
        assert_eq!(render(&result), "2016-03-01 100.0\n2016-03-02 2.0\n");
    }

    #[test]
    fn empty_curve_writes_nothing() {
        let result = BacktestResult {
            strategy: Strategy::BuyAndHold,
            initial_equity: 1.0,
            equity_curve: Vec::new(),
        };
        assert!(render(&result).is_empty());
    }
}
