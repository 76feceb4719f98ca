//! CSV price history adapter.
//!
//! Expects a header row. The first column holds the date; the price comes
//! from the first column named `price`, `close` or `adj close`
//! (case-insensitive), or from the last column when none of those exist.

use chrono::NaiveDate;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::domain::error::RegimeTraderError;
use crate::domain::series::{PricePoint, PriceSeries};
use crate::ports::price_port::PricePort;

const DATE_FORMATS: [&str; 3] = ["%d.%m.%Y", "%Y-%m-%d", "%d/%m/%Y"];
const PRICE_COLUMNS: [&str; 3] = ["price", "close", "adj close"];

#[derive(Debug, Default, Clone, Copy)]
pub struct CsvAdapter;

impl CsvAdapter {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, content: &str) -> Result<PriceSeries, RegimeTraderError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let headers = rdr
            .headers()
            .map_err(|e| RegimeTraderError::PriceData {
                reason: format!("CSV header error: {}", e),
            })?
            .clone();
        if headers.len() < 2 {
            return Err(RegimeTraderError::PriceData {
                reason: "expected a date column and a price column".into(),
            });
        }
        let price_col = headers
            .iter()
            .position(|h| PRICE_COLUMNS.contains(&h.to_lowercase().as_str()))
            .unwrap_or(headers.len() - 1);

        let mut prices = Vec::new();
        for (row, result) in rdr.records().enumerate() {
            let line = row + 2;
            let record = result.map_err(|e| RegimeTraderError::PriceData {
                reason: format!("CSV parse error: {}", e),
            })?;

            let date_str = record.get(0).ok_or_else(|| RegimeTraderError::PriceData {
                reason: format!("line {}: missing date column", line),
            })?;
            let date = parse_date(date_str).ok_or_else(|| RegimeTraderError::PriceData {
                reason: format!("line {}: invalid date '{}'", line, date_str),
            })?;

            let price: f64 = record
                .get(price_col)
                .ok_or_else(|| RegimeTraderError::PriceData {
                    reason: format!("line {}: missing price column", line),
                })?
                .parse()
                .map_err(|e| RegimeTraderError::PriceData {
                    reason: format!("line {}: invalid price value: {}", line, e),
                })?;

            prices.push(PricePoint { date, price });
        }

        prices.sort_by_key(|p| p.date);
        PriceSeries::from_prices(prices)
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

impl PricePort for CsvAdapter {
    fn load_series(&self, path: &Path) -> Result<PriceSeries, RegimeTraderError> {
        let content = fs::read_to_string(path).map_err(|e| RegimeTraderError::PriceData {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        let series = self.parse(&content)?;

        if let (Some(first), Some(last)) = (series.first_date(), series.last_date()) {
            info!(
                rows = series.prices.len(),
                first = %first,
                last = %last,
                "loaded prices from {}",
                path.display()
            );
        }
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_datastream_style_export() {
        let content = "Date,Price\n\
            04.01.2010,100.0\n\
            05.01.2010,101.0\n\
            06.01.2010,99.99\n";
        let series = CsvAdapter::new().parse(content).unwrap();

        assert_eq!(series.prices.len(), 3);
        assert_eq!(series.prices[0].date, date(2010, 1, 4));
        assert_eq!(series.returns.len(), 2);
        assert_eq!(series.returns[0].date, date(2010, 1, 5));
        assert_relative_eq!(series.returns[0].value, 0.01, epsilon = 1e-12);
        assert_relative_eq!(series.returns[1].value, -0.01, epsilon = 1e-12);
    }

    #[test]
    fn picks_close_column_by_name() {
        let content = "date,open,high,low,close,volume\n\
            2024-01-15,100.0,110.0,90.0,105.0,50000\n\
            2024-01-16,105.0,115.0,100.0,110.0,60000\n";
        let series = CsvAdapter::new().parse(content).unwrap();
        assert_eq!(series.prices[1].price, 110.0);
    }

    #[test]
    fn falls_back_to_last_column() {
        let content = "day,level\n15/01/2024,7.5\n16/01/2024,8.0\n";
        let series = CsvAdapter::new().parse(content).unwrap();
        assert_eq!(series.prices[0].price, 7.5);
        assert_eq!(series.prices[1].date, date(2024, 1, 16));
    }

    #[test]
    fn sorts_rows_by_date() {
        let content = "Date,Price\n05.01.2010,2.0\n04.01.2010,1.0\n";
        let series = CsvAdapter::new().parse(content).unwrap();
        assert_eq!(series.prices[0].price, 1.0);
        assert_relative_eq!(series.returns[0].value, 1.0);
    }

    #[test]
    fn malformed_price_fails_the_load() {
        let content = "Date,Price\n04.01.2010,100.0\n05.01.2010,n/a\n";
        let err = CsvAdapter::new().parse(content).unwrap_err();
        assert!(matches!(
            err,
            RegimeTraderError::PriceData { ref reason } if reason.contains("line 3")
        ));
    }

    #[test]
    fn malformed_date_fails_the_load() {
        let content = "Date,Price\n2010.01.04,100.0\n";
        assert!(CsvAdapter::new().parse(content).is_err());
    }

    #[test]
    fn duplicate_dates_fail_the_load() {
        let content = "Date,Price\n04.01.2010,100.0\n04.01.2010,101.0\n";
        assert!(CsvAdapter::new().parse(content).is_err());
    }

    #[test]
    fn single_column_is_rejected() {
        assert!(CsvAdapter::new().parse("Date\n04.01.2010\n").is_err());
    }

    #[test]
    fn load_series_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.csv");
        fs::write(&path, "Date,Price\n04.01.2010,100.0\n05.01.2010,102.0\n").unwrap();

        let series = CsvAdapter::new().load_series(&path).unwrap();
        assert_eq!(series.prices.len(), 2);
    }

    #[test]
    fn load_series_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let result = CsvAdapter::new().load_series(&dir.path().join("absent.csv"));
        assert!(matches!(result, Err(RegimeTraderError::PriceData { .. })));
    }
}
