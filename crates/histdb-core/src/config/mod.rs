pub mod dataset_config;
pub mod defaults;
pub mod ingest_config;
pub mod observability_config;
pub mod storage_config;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::errors::{HistError, HistResult};

pub use dataset_config::DatasetConfig;
pub use ingest_config::IngestConfig;
pub use observability_config::ObservabilityConfig;
pub use storage_config::StorageConfig;

/// Top-level configuration aggregating all subsystem configs.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HistConfig {
    pub storage: StorageConfig,
    pub ingest: IngestConfig,
    pub observability: ObservabilityConfig,
    pub datasets: Vec<DatasetConfig>,
}

impl HistConfig {
    /// Load config from a TOML string, falling back to defaults for missing fields.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Structural checks that serde cannot express.
    pub fn validate(&self) -> HistResult<()> {
        let mut names = BTreeSet::new();
        for dataset in &self.datasets {
            if !names.insert(dataset.name.as_str()) {
                return Err(HistError::ConfigError(format!(
                    "duplicate dataset '{}'",
                    dataset.name
                )));
            }
            dataset.validate()?;
        }
        if self.storage.read_pool_size == 0 {
            return Err(HistError::ConfigError(
                "storage.read_pool_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn dataset(&self, name: &str) -> Option<&DatasetConfig> {
        self.datasets.iter().find(|d| d.name == name)
    }
}
