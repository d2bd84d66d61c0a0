//! JSON file persistence of a settings store.

use super::Result;
use autolimit_types::PropertyValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// JSON file storage format.
///
/// Only keys that differ from their schema default are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct StorageFormat {
    pub version: u32,
    pub schema: String,
    #[serde(default)]
    pub values: BTreeMap<String, PropertyValue>,
}

impl StorageFormat {
    pub fn new(schema: &str, values: BTreeMap<String, PropertyValue>) -> Self {
        Self {
            version: 1,
            schema: schema.to_string(),
            values,
        }
    }
}

/// Read the settings file, `None` when it does not exist or is empty.
pub(super) fn read(path: &Path) -> Result<Option<StorageFormat>> {
    debug!("Loading settings from {:?}", path);

    if !path.exists() {
        info!("Settings file does not exist, starting with defaults");
        return Ok(None);
    }

    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        info!("Settings file is empty, starting with defaults");
        return Ok(None);
    }

    Ok(Some(serde_json::from_str(&contents)?))
}

/// Write the settings file atomically.
pub(super) fn write(path: &Path, storage: &StorageFormat) -> Result<()> {
    debug!("Writing {} settings to {:?}", storage.values.len(), path);

    let json = serde_json::to_string_pretty(storage)?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    // Write to temporary file first, then rename (atomic operation)
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, json)?;
    fs::rename(&temp_path, path)?;

    Ok(())
}
