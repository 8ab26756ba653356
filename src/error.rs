use thiserror::Error;

/// Error kinds surfaced to the shell. Search-time errors abort the search;
/// per-page errors during a download are logged and swallowed by the session
/// loop, which only aborts on a session-level condition.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("bad input: {0}")]
    BadInput(String),

    #[error("network failure: {0}")]
    Network(String),

    #[error("parse failure: {0}")]
    Parse(String),

    #[error("image decode failure: {0}")]
    Decode(#[from] image::ImageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("download cancelled")]
    Cancelled,

    #[error("unsupported source: {0}")]
    Unsupported(String),

    #[error("no manifest for {0}: search first")]
    NotReady(String),
}

impl From<serde_json::Error> for DownloadError {
    fn from(e: serde_json::Error) -> Self {
        DownloadError::Parse(e.to_string())
    }
}

impl From<reqwest::Error> for DownloadError {
    fn from(e: reqwest::Error) -> Self {
        DownloadError::Network(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DownloadError>;
