//! Price history access port trait.

use std::path::Path;

use crate::domain::error::RegimeTraderError;
use crate::domain::series::PriceSeries;

pub trait PricePort {
    /// Load a date-sorted price series and its derived returns.
    /// Malformed rows fail the whole load.
    fn load_series(&self, path: &Path) -> Result<PriceSeries, RegimeTraderError>;
}
