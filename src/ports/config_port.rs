//! Configuration access port trait.

use chrono::NaiveDate;

use crate::domain::error::RegimeTraderError;

/// Date format used on the command line and in config files.
pub const DATE_FORMAT: &str = "%d.%m.%Y";

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;

    /// Read a `DD.MM.YYYY` date. A present but malformed value is an error.
    fn get_date(&self, section: &str, key: &str) -> Result<Option<NaiveDate>, RegimeTraderError> {
        self.get_string(section, key)
            .filter(|s| !s.trim().is_empty())
            .map(|s| {
                NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map_err(|_| {
                    RegimeTraderError::ConfigInvalid {
                        section: section.to_string(),
                        key: key.to_string(),
                        reason: format!("invalid date '{s}', expected DD.MM.YYYY"),
                    }
                })
            })
            .transpose()
    }
}
