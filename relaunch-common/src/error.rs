use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum RelaunchError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("HTTP Request Error: {0}")]
    Http(#[from] Arc<reqwest::Error>),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("Semantic Versioning Error: {0}")]
    SemVer(#[from] Arc<semver::Error>),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Resource Not Found: {0}")]
    NotFound(String),

    #[error("DownloadError: Failed to download '{0}' from '{1}': {2}")]
    DownloadError(String, String, String),

    #[error("HttpError: {0}")]
    HttpError(String),

    #[error("Checksum Error: {0}")]
    ChecksumError(String),

    #[error("Validation Error: {0}")]
    ValidationError(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Update Error: {0}")]
    Update(String),

    #[error("Failed to execute command: {0}")]
    CommandExecError(String),

    #[error("Generic Error: {0}")]
    Generic(String),
}

impl From<std::io::Error> for RelaunchError {
    fn from(err: std::io::Error) -> Self {
        RelaunchError::Io(Arc::new(err))
    }
}

impl From<reqwest::Error> for RelaunchError {
    fn from(err: reqwest::Error) -> Self {
        RelaunchError::Http(Arc::new(err))
    }
}

impl From<serde_json::Error> for RelaunchError {
    fn from(err: serde_json::Error) -> Self {
        RelaunchError::Json(Arc::new(err))
    }
}

impl From<semver::Error> for RelaunchError {
    fn from(err: semver::Error) -> Self {
        RelaunchError::SemVer(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, RelaunchError>;
