//! JSON store for watch configurations.
//!
//! The store is a single pretty-printed JSON array. Each record carries the
//! integration's type identifier and its resolved parameters so the exact
//! variant can be rebuilt through the [`IntegrationRegistry`] on reload.
//!
//! ```json
//! [
//!   {
//!     "id": 1,
//!     "folder": "/srv/in",
//!     "integration": { "type": "File", "parameters": { "target": "/srv/out" } }
//!   }
//! ]
//! ```

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{StorageError, StorageResult};
use crate::integration::{IntegrationRegistry, Parameters};
use crate::types::{ConfigId, Configuration};

/// Serialized form of one configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRecord {
    pub id: ConfigId,
    pub folder: PathBuf,
    pub integration: IntegrationRecord,
}

/// Tagged integration payload: variant identifier plus its own parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationRecord {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub parameters: Parameters,
}

impl From<&Configuration> for ConfigRecord {
    fn from(configuration: &Configuration) -> Self {
        Self {
            id: configuration.id(),
            folder: configuration.folder().to_path_buf(),
            integration: IntegrationRecord {
                kind: configuration.kind().to_string(),
                parameters: configuration.integration().parameters(),
            },
        }
    }
}

/// Reads and writes the configuration list.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the store file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Overwrite the store with `configurations`, in order.
    #[must_use = "Save errors should be handled to ensure configurations are persisted"]
    pub fn save(&self, configurations: &[Configuration]) -> StorageResult<()> {
        let records: Vec<ConfigRecord> = configurations.iter().map(ConfigRecord::from).collect();
        self.save_records(&records)
    }

    /// Overwrite the store with already serialized records.
    pub fn save_records(&self, records: &[ConfigRecord]) -> StorageResult<()> {
        let json = Self::encode(records)?;
        self.write(&json)?;
        crate::debug_event!("store", "saved", "{} configurations", records.len());
        Ok(())
    }

    /// Render records as store contents without touching the disk.
    pub fn encode(records: &[ConfigRecord]) -> StorageResult<String> {
        Ok(serde_json::to_string_pretty(records)?)
    }

    /// Replace the store contents with `json`.
    ///
    /// Writes a sibling temp file first and renames it over the store; a crash
    /// mid-write leaves the previous contents intact.
    pub fn write(&self, json: &str) -> StorageResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StorageError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let tmp_path = self.tmp_path();
        fs::write(&tmp_path, json).map_err(|source| StorageError::Write {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|source| {
            let _ = fs::remove_file(&tmp_path);
            StorageError::Write {
                path: self.path.clone(),
                source,
            }
        })
    }

    /// Load the raw records. A missing store yields an empty list.
    pub fn load_records(&self) -> StorageResult<Vec<ConfigRecord>> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.corrupt(format!("cannot read: {e}"))),
        };

        serde_json::from_str(&json).map_err(|e| self.corrupt(e.to_string()))
    }

    /// Load and rebuild every configuration.
    ///
    /// Fails with [`StorageError::CorruptStore`] on malformed records,
    /// unknown integration types, relative folders or duplicate ids.
    #[must_use = "Load errors should be handled appropriately"]
    pub fn load(&self, registry: &IntegrationRegistry) -> StorageResult<Vec<Configuration>> {
        let records = self.load_records()?;
        let mut seen = HashSet::with_capacity(records.len());
        let mut configurations = Vec::with_capacity(records.len());

        for record in records {
            if !seen.insert(record.id) {
                return Err(self.corrupt(format!("duplicate id {}", record.id)));
            }
            if !record.folder.is_absolute() {
                return Err(self.corrupt(format!(
                    "configuration {} has relative folder {}",
                    record.id,
                    record.folder.display()
                )));
            }

            let integration = registry
                .create(&record.integration.kind, &record.integration.parameters)
                .map_err(|e| self.corrupt(format!("configuration {}: {e}", record.id)))?;

            configurations.push(Configuration::new(record.id, record.folder, integration));
        }

        crate::debug_event!("store", "loaded", "{} configurations", configurations.len());
        Ok(configurations)
    }

    fn corrupt(&self, reason: String) -> StorageError {
        StorageError::CorruptStore {
            path: self.path.clone(),
            reason,
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
