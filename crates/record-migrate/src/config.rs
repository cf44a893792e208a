use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Configuration for document loading.
///
/// Usually read from a `migrate.toml`:
///
/// ```toml
/// validate_records = true
/// allow_downgrade = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MigrationConfig {
    /// Run the schema validator on every record after migration.
    pub validate_records: bool,
    /// Permit down-migrating documents for older builds.
    pub allow_downgrade: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            validate_records: true,
            allow_downgrade: false,
        }
    }
}

/// Error reading a [`MigrationConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid migration config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl MigrationConfig {
    /// Parse TOML text. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}
