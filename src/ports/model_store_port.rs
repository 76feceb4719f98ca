//! Fitted-model persistence port trait.

use std::path::Path;

use crate::domain::error::RegimeTraderError;
use crate::domain::regime::RegimeModel;

pub trait ModelStorePort {
    fn save(&self, model: &RegimeModel, path: &Path) -> Result<(), RegimeTraderError>;

    /// Fails with `CorruptModel` when the stored bytes do not describe a
    /// valid set of parameters.
    fn load(&self, path: &Path) -> Result<RegimeModel, RegimeTraderError>;

    /// Whether a model has been stored at `path`.
    fn exists(&self, path: &Path) -> bool;
}
