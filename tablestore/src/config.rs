//! Store configuration module.
//!
//! This module provides configuration loading for tablestore from
//! environment variables.
//!
//! # Environment Variables
//!
//! - `TABLESTORE_DATA_DIRECTORY`: Directory holding the `catalog/` and
//!   `user_data/` table directories (default: `./data`)
//!
//! # Invariants
//!
//! - `data_directory` is never empty (it may not exist yet)

use std::path::{Path, PathBuf};

use crate::storage::TableFile;

/// Name of the data directory variable.
pub const DATA_DIRECTORY_VAR: &str = "TABLESTORE_DATA_DIRECTORY";

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory where table files are stored.
    /// A user table `t` lives at `{data_directory}/user_data/t.tbl`.
    pub data_directory: PathBuf,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_directory: PathBuf::from(Self::DEFAULT_DATA_DIRECTORY),
        }
    }
}

impl StoreConfig {
    /// Default data directory.
    pub const DEFAULT_DATA_DIRECTORY: &'static str = "./data";

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `TABLESTORE_DATA_DIRECTORY` is set but empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which returns the value of a
    /// variable if it is set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let data_directory = Self::load_data_directory(&lookup)?;
        Ok(Self { data_directory })
    }

    /// Path of a table's file.
    #[must_use]
    pub fn table_path(&self, table_name: &str, is_catalog: bool) -> PathBuf {
        TableFile::resolve_path(&self.data_directory, table_name, is_catalog)
    }

    #[must_use]
    pub fn data_directory(&self) -> &Path {
        &self.data_directory
    }

    /// Load the data directory.
    ///
    /// Returns the default if not set.
    fn load_data_directory(
        lookup: &impl Fn(&str) -> Option<String>,
    ) -> Result<PathBuf, ConfigError> {
        match lookup(DATA_DIRECTORY_VAR) {
            Some(value) if value.is_empty() => Err(ConfigError::InvalidValue {
                name: DATA_DIRECTORY_VAR.to_string(),
                message: "must not be empty".to_string(),
            }),
            Some(value) => Ok(PathBuf::from(value)),
            None => Ok(PathBuf::from(Self::DEFAULT_DATA_DIRECTORY)),
        }
    }
}
