use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

/// Coarse failure category recorded on a retry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Network, status, or addressing failure while fetching a page
    Fetch,
    /// The page arrived but its markup did not yield division rows
    Parse,
}

impl ScanError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ScanError::ParseError(_) => FailureKind::Parse,
            ScanError::HttpError(_)
            | ScanError::Status { .. }
            | ScanError::InvalidUrl(_)
            | ScanError::IoError(_)
            | ScanError::Other(_) => FailureKind::Fetch,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
