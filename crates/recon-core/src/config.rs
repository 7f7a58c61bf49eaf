//! Reconciliation settings

use crate::error::{Error, Result};
use crate::schema::SourceTag;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default business key of provider activity exports
pub const DEFAULT_BUSINESS_KEY: &str = "Activity Master Number";
/// Actor recorded when a batch does not name one
pub const DEFAULT_ACTOR: &str = "reviewer";

/// Settings for one reconciliation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Column used to match rows across snapshots
    pub business_key: String,
    /// Provider the new snapshot came from
    pub provider: String,
    /// Version label of the new snapshot
    pub version: String,
    /// Actor recorded in the audit log when none is given
    pub actor: String,
    /// Undo depth limit; unlimited when absent
    pub max_history: Option<usize>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            business_key: DEFAULT_BUSINESS_KEY.to_string(),
            provider: String::new(),
            version: String::new(),
            actor: DEFAULT_ACTOR.to_string(),
            max_history: None,
        }
    }
}

impl ReconcileConfig {
    /// Load a config file from JSON; missing fields take their defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save the config file to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Provider/version tag stamped on schema change entries
    pub fn source_tag(&self) -> SourceTag {
        SourceTag {
            provider: self.provider.clone(),
            version: self.version.clone(),
        }
    }
}
