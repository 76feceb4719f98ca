//! INI file configuration adapter.

use crate::domain::error::RegimeTraderError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;
use tracing::info;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RegimeTraderError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| RegimeTraderError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        info!("loaded config from {}", path.display());
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, RegimeTraderError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| RegimeTraderError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    const FULL_CONFIG: &str = r#"
[data]
csv_file = data/sp500.csv

[backtest]
strategy = new-regime-filter
start_date = 01.01.2005
end_date = 31.12.2014
initial_equity = 100.0
inference = incremental

[training]
start_date = 01.01.1993
end_date = 01.01.2005
regimes = 2
max_iters = 500
tolerance = 0.001

[model]
path = models/hmm.json

[report]
summary = yes
"#;

    #[test]
    fn from_string_parses_all_sections() {
        let adapter = FileConfigAdapter::from_string(FULL_CONFIG).unwrap();
        assert_eq!(
            adapter.get_string("data", "csv_file"),
            Some("data/sp500.csv".to_string())
        );
        assert_eq!(
            adapter.get_string("backtest", "strategy"),
            Some("new-regime-filter".to_string())
        );
        assert_eq!(
            adapter.get_string("backtest", "initial_equity"),
            Some("100.0".to_string())
        );
        assert_eq!(adapter.get_string("training", "regimes"), Some("2".to_string()));
        assert_eq!(
            adapter.get_string("model", "path"),
            Some("models/hmm.json".to_string())
        );
        assert!(adapter.get_bool("report", "summary", false));
    }

    #[test]
    fn get_date_reads_day_month_year() {
        let adapter = FileConfigAdapter::from_string(FULL_CONFIG).unwrap();
        assert_eq!(
            adapter.get_date("training", "start_date").unwrap(),
            NaiveDate::from_ymd_opt(1993, 1, 1)
        );
        assert_eq!(adapter.get_date("training", "missing").unwrap(), None);
    }

    #[test]
    fn get_date_rejects_iso_format() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\nstart_date = 2005-01-01\n").unwrap();
        let err = adapter.get_date("backtest", "start_date").unwrap_err();
        assert!(matches!(
            err,
            RegimeTraderError::ConfigInvalid { ref key, .. } if key == "start_date"
        ));
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[training]\nregimes = 2\n").unwrap();
        assert_eq!(adapter.get_string("training", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn keys_are_case_insensitive() {
        let adapter = FileConfigAdapter::from_string("[Training]\nRegimes = 3\n").unwrap();
        assert_eq!(adapter.get_string("training", "regimes"), Some("3".to_string()));
    }

    #[test]
    fn get_bool_values_and_default() {
        let adapter =
            FileConfigAdapter::from_string("[report]\na = true\nb = no\nc = maybe\n").unwrap();
        assert!(adapter.get_bool("report", "a", false));
        assert!(!adapter.get_bool("report", "b", true));
        assert!(adapter.get_bool("report", "c", true));
        assert!(!adapter.get_bool("report", "missing", false));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[model]\npath = /tmp/model.json\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("model", "path"),
            Some("/tmp/model.json".to_string())
        );
    }

    #[test]
    fn from_file_missing_file_is_parse_error() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        assert!(matches!(result, Err(RegimeTraderError::ConfigParse { .. })));
    }
}
