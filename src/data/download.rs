//! Dataset Download Module
//! Fetches the regional dataset archive from Kaggle and extracts the CSV.

use crate::util::with_csv_extension;
use serde::Deserialize;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use zip::ZipArchive;

use super::loader::DEFAULT_DATASET_NAME;

pub const KAGGLE_DATASET: &str = "sudalairajkumar/covid19-in-italy";
const KAGGLE_DOWNLOAD_URL: &str = "https://www.kaggle.com/api/v1/datasets/download";

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Kaggle credentials not found; set KAGGLE_USERNAME and KAGGLE_KEY or create ~/.kaggle/kaggle.json")]
    MissingCredentials,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid kaggle.json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Kaggle API username and key.
#[derive(Debug, Clone, Deserialize)]
pub struct KaggleCredentials {
    pub username: String,
    pub key: String,
}

impl KaggleCredentials {
    pub fn new(username: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            key: key.into(),
        }
    }

    /// Read `KAGGLE_USERNAME` and `KAGGLE_KEY`.
    pub fn from_env() -> Option<Self> {
        let username = std::env::var("KAGGLE_USERNAME").ok()?;
        let key = std::env::var("KAGGLE_KEY").ok()?;
        Some(Self::new(username, key))
    }

    /// Read a `kaggle.json` token file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DownloadError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Environment first, then `~/.kaggle/kaggle.json`.
    pub fn discover() -> Result<Self, DownloadError> {
        if let Some(credentials) = Self::from_env() {
            return Ok(credentials);
        }
        let token = dirs::home_dir()
            .map(|home| home.join(".kaggle").join("kaggle.json"))
            .filter(|path| path.is_file())
            .ok_or(DownloadError::MissingCredentials)?;
        Self::from_file(token)
    }
}

/// Download the dataset archive and extract the regional CSV into `dir`.
///
/// `dir` defaults to the working directory. When `name` is given the file is
/// saved under that name (with the `.csv` extension added if missing),
/// replacing any existing file. Returns the path written.
pub fn download_covid_dataset(
    credentials: &KaggleCredentials,
    dir: Option<&Path>,
    name: Option<&str>,
) -> Result<PathBuf, DownloadError> {
    let dir = match dir {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir()?,
    };
    let url = format!("{KAGGLE_DOWNLOAD_URL}/{KAGGLE_DATASET}");
    info!(%url, "downloading dataset");

    let client = reqwest::blocking::Client::builder().build()?;
    let archive = client
        .get(&url)
        .basic_auth(&credentials.username, Some(&credentials.key))
        .send()?
        .error_for_status()?
        .bytes()?;
    debug!(bytes = archive.len(), "archive received");

    let dest = dir.join(
        name.map(with_csv_extension)
            .unwrap_or_else(|| DEFAULT_DATASET_NAME.to_string()),
    );
    extract_region_csv(&archive, &dest)?;
    info!(path = %dest.display(), "dataset saved");

    Ok(dest)
}

/// Copy the regional CSV out of a ZIP archive held in memory.
pub fn extract_region_csv(archive: &[u8], dest: &Path) -> Result<(), DownloadError> {
    let mut zip = ZipArchive::new(Cursor::new(archive))?;
    let mut entry = zip.by_name(DEFAULT_DATASET_NAME)?;

    let mut contents = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut contents)?;

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(dest, &contents)?;
    Ok(())
}
