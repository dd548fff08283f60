// Error types for repo-shelf.
// Covers upstream fetch failures, cache store failures, and routing misses.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShelfError {
    #[error("Upstream request timed out")]
    Timeout,

    #[error("GitHub API error: HTTP {status}")]
    Upstream { status: u16 },

    #[error("GitHub fetch failed: {0}")]
    Network(String),

    #[error("JSON parsing error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Missing GITHUB_TOKEN environment variable")]
    MissingToken,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for ShelfError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return ShelfError::Timeout;
        }
        ShelfError::Network(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ShelfError>;
