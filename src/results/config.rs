//! Results store configuration: where the results CSV lives, resolved once
//! and persisted in a `.config.json` sidecar.

use crate::util::with_csv_extension;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const CONFIG_FILE_NAME: &str = ".config.json";
pub const DEFAULT_RESULTS_NAME: &str = "covid19_result.csv";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid configuration in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// User-facing configuration; unset fields fall back to defaults in
/// [`StoreConfig::resolve`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    pub path_to_results: Option<PathBuf>,
    pub name_to_results: Option<String>,
}

impl StoreConfig {
    pub fn new(path_to_results: Option<PathBuf>, name_to_results: Option<String>) -> Self {
        Self {
            path_to_results,
            name_to_results,
        }
    }

    /// Fill in the working directory and the default file name.
    pub fn resolve(self) -> Result<ResultsLocation, ConfigError> {
        let dir = match self.path_to_results {
            Some(dir) => dir,
            None => std::env::current_dir().map_err(|source| ConfigError::Io {
                path: PathBuf::from("."),
                source,
            })?,
        };
        let file_name = self
            .name_to_results
            .as_deref()
            .map(with_csv_extension)
            .unwrap_or_else(|| DEFAULT_RESULTS_NAME.to_string());

        Ok(ResultsLocation { dir, file_name })
    }
}

/// Fully resolved destination of the results file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsLocation {
    #[serde(rename = "path_to_results")]
    pub dir: PathBuf,
    #[serde(rename = "name_to_results")]
    pub file_name: String,
}

impl ResultsLocation {
    pub fn new(dir: impl Into<PathBuf>, file_name: &str) -> Self {
        Self {
            dir: dir.into(),
            file_name: with_csv_extension(file_name),
        }
    }

    pub fn file_path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    /// Write this location to `config_dir/.config.json`, replacing any
    /// existing sidecar.
    pub fn store_config(&self, config_dir: &Path) -> Result<PathBuf, ConfigError> {
        let path = config_dir.join(CONFIG_FILE_NAME);
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Json {
            path: path.clone(),
            source,
        })?;
        std::fs::write(&path, json).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), results = %self.file_path().display(), "stored config");
        Ok(path)
    }

    /// Read `config_dir/.config.json`; a missing sidecar surfaces `NotFound`.
    pub fn load_config(config_dir: &Path) -> Result<Self, ConfigError> {
        let path = config_dir.join(CONFIG_FILE_NAME);
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let location: ResultsLocation =
            serde_json::from_str(&text).map_err(|source| ConfigError::Json {
                path: path.clone(),
                source,
            })?;
        Ok(Self::new(location.dir, &location.file_name))
    }
}
