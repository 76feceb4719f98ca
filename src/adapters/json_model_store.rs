//! JSON file persistence for fitted regime models.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::domain::error::RegimeTraderError;
use crate::domain::regime::{RegimeModel, RegimeModelParams};
use crate::ports::model_store_port::ModelStorePort;

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoredModel {
    format_version: u32,
    params: RegimeModelParams,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonModelStore;

impl JsonModelStore {
    pub fn new() -> Self {
        Self
    }
}

impl ModelStorePort for JsonModelStore {
    fn save(&self, model: &RegimeModel, path: &Path) -> Result<(), RegimeTraderError> {
        let stored = StoredModel {
            format_version: FORMAT_VERSION,
            params: model.params().clone(),
        };
        let json = serde_json::to_string_pretty(&stored).map_err(std::io::Error::other)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json)?;

        info!(states = model.n_states(), "saved regime model to {}", path.display());
        Ok(())
    }

    fn load(&self, path: &Path) -> Result<RegimeModel, RegimeTraderError> {
        let content = fs::read_to_string(path)?;
        let corrupt = |reason: String| RegimeTraderError::CorruptModel {
            path: path.display().to_string(),
            reason,
        };

        let stored: StoredModel =
            serde_json::from_str(&content).map_err(|e| corrupt(e.to_string()))?;
        if stored.format_version != FORMAT_VERSION {
            return Err(corrupt(format!(
                "unsupported format version {}",
                stored.format_version
            )));
        }
        let model = RegimeModel::from_params(stored.params).map_err(corrupt)?;

        info!(
            states = model.n_states(),
            high_volatility_state = model.high_volatility_state(),
            "loaded regime model from {}",
            path.display()
        );
        Ok(model)
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}
