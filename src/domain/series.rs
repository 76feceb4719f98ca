//! Price and return series, and training-window extraction.

use chrono::NaiveDate;

use super::error::RegimeTraderError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

/// Simple fractional return realised on `date`, relative to the previous price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReturnPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Date window used to slice the return series for model fitting.
///
/// Both dates must be present in the series. The slice starts at `start_date`
/// and stops before `end_date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingWindow {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl TrainingWindow {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
        }
    }

    pub fn extract(&self, returns: &[ReturnPoint]) -> Result<Vec<f64>, RegimeTraderError> {
        extract_returns(returns, self.start_date, self.end_date)
    }
}

/// Parallel price and return series for one instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    pub prices: Vec<PricePoint>,
    pub returns: Vec<ReturnPoint>,
}

impl PriceSeries {
    /// Build from prices already sorted by date. Dates must be strictly
    /// increasing and prices finite and positive.
    pub fn from_prices(prices: Vec<PricePoint>) -> Result<Self, RegimeTraderError> {
        if let Some(bad) = prices.iter().find(|p| !(p.price.is_finite() && p.price > 0.0)) {
            return Err(RegimeTraderError::PriceData {
                reason: format!("price on {} must be positive, got {}", bad.date, bad.price),
            });
        }
        if let Some(w) = prices.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(RegimeTraderError::PriceData {
                reason: format!(
                    "dates must be strictly increasing: {} follows {}",
                    w[1].date, w[0].date
                ),
            });
        }
        let returns = simple_returns(&prices);
        Ok(Self { prices, returns })
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.prices.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.prices.last().map(|p| p.date)
    }
}

/// Derive one return per price after the first: `p[i] / p[i-1] - 1`.
pub fn simple_returns(prices: &[PricePoint]) -> Vec<ReturnPoint> {
    prices
        .windows(2)
        .map(|w| ReturnPoint {
            date: w[1].date,
            value: w[1].price / w[0].price - 1.0,
        })
        .collect()
}

/// Return values from the entry dated `start_date` up to, but excluding, the
/// entry dated `end_date`.
///
/// Both dates must match an entry exactly and `end_date` must come after
/// `start_date`; otherwise the call fails with `DataAlignment` rather than
/// falling back to a prefix of the series.
pub fn extract_returns(
    returns: &[ReturnPoint],
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<Vec<f64>, RegimeTraderError> {
    let start = returns
        .iter()
        .position(|r| r.date == start_date)
        .ok_or_else(|| RegimeTraderError::DataAlignment {
            date: start_date,
            reason: "window start not found in return series".into(),
        })?;

    let end = returns[start + 1..]
        .iter()
        .position(|r| r.date == end_date)
        .map(|offset| start + 1 + offset)
        .ok_or_else(|| RegimeTraderError::DataAlignment {
            date: end_date,
            reason: format!("window end not found after {start_date} in return series"),
        })?;

    Ok(returns[start..end].iter().map(|r| r.value).collect())
}

/// Index of the first and last price dated inside `[start, end]`.
pub fn window_bounds(
    prices: &[PricePoint],
    start: NaiveDate,
    end: NaiveDate,
) -> Option<(usize, usize)> {
    let first = prices.iter().position(|p| p.date >= start)?;
    let last = prices.iter().rposition(|p| p.date <= end)?;
    (first <= last).then_some((first, last))
}
