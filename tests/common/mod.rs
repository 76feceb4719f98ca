#![allow(dead_code)]

use chrono::NaiveDate;
use regimetrader::domain::error::RegimeTraderError;
use regimetrader::domain::regime::{RegimeModel, RegimeModelParams};
use regimetrader::domain::series::{PricePoint, PriceSeries};
use regimetrader::ports::model_store_port::ModelStorePort;
use regimetrader::ports::price_port::PricePort;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub struct MockPricePort {
    pub series: HashMap<PathBuf, PriceSeries>,
}

impl MockPricePort {
    pub fn new() -> Self {
        Self {
            series: HashMap::new(),
        }
    }

    pub fn with_series(mut self, path: &str, series: PriceSeries) -> Self {
        self.series.insert(PathBuf::from(path), series);
        self
    }
}

impl PricePort for MockPricePort {
    fn load_series(&self, path: &Path) -> Result<PriceSeries, RegimeTraderError> {
        self.series
            .get(path)
            .cloned()
            .ok_or_else(|| RegimeTraderError::PriceData {
                reason: format!("no series for {}", path.display()),
            })
    }
}

/// In-memory store that keeps parameters keyed by path and counts calls.
pub struct MockModelStore {
    pub models: RefCell<HashMap<PathBuf, RegimeModelParams>>,
    pub saves: Cell<usize>,
    pub loads: Cell<usize>,
}

impl MockModelStore {
    pub fn new() -> Self {
        Self {
            models: RefCell::new(HashMap::new()),
            saves: Cell::new(0),
            loads: Cell::new(0),
        }
    }
}

impl ModelStorePort for MockModelStore {
    fn save(&self, model: &RegimeModel, path: &Path) -> Result<(), RegimeTraderError> {
        self.saves.set(self.saves.get() + 1);
        self.models
            .borrow_mut()
            .insert(path.to_path_buf(), model.params().clone());
        Ok(())
    }

    fn load(&self, path: &Path) -> Result<RegimeModel, RegimeTraderError> {
        self.loads.set(self.loads.get() + 1);
        let params = self.models.borrow().get(path).cloned().ok_or_else(|| {
            RegimeTraderError::CorruptModel {
                path: path.display().to_string(),
                reason: "nothing stored".into(),
            }
        })?;
        RegimeModel::from_params(params).map_err(|reason| RegimeTraderError::CorruptModel {
            path: path.display().to_string(),
            reason,
        })
    }

    fn exists(&self, path: &Path) -> bool {
        self.models.borrow().contains_key(path)
    }
}

pub fn date(d: u32, m: u32, y: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// First day of every generated series.
pub fn series_start() -> NaiveDate {
    date(1, 1, 2010)
}

pub fn day(offset: usize) -> NaiveDate {
    series_start() + chrono::Duration::days(offset as i64)
}

/// Prices on consecutive days starting at `series_start()`.
pub fn make_series(prices: &[f64]) -> PriceSeries {
    let points = prices
        .iter()
        .enumerate()
        .map(|(i, &price)| PricePoint {
            date: day(i),
            price,
        })
        .collect();
    PriceSeries::from_prices(points).unwrap()
}

/// Deterministic returns alternating between 60-day calm and volatile blocks.
pub fn regime_returns(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let wiggle = ((i * 7919) % 13) as f64 / 6.0 - 1.0;
            let scale = if (i / 60) % 2 == 0 { 0.003 } else { 0.03 };
            0.0002 + wiggle * scale
        })
        .collect()
}

/// Price path of `n` prices compounding `regime_returns(n - 1)` from 100.
pub fn regime_prices(n: usize) -> Vec<f64> {
    let mut prices = Vec::with_capacity(n);
    let mut price = 100.0;
    prices.push(price);
    for r in regime_returns(n - 1) {
        price *= 1.0 + r;
        prices.push(price);
    }
    prices
}

/// Write a `Date,Price` CSV with `DD.MM.YYYY` dates into `dir`.
pub fn write_price_csv(dir: &Path, name: &str, prices: &[f64]) -> PathBuf {
    let mut content = String::from("Date,Price\n");
    for (i, price) in prices.iter().enumerate() {
        content.push_str(&format!("{},{}\n", day(i).format("%d.%m.%Y"), price));
    }
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}
