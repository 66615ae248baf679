//! Client error kinds.
//!
//! A stale event (one for a superseded scan id) is not represented here: the
//! session controller reports it as an outcome and drops it.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Bad domain shape or missing input. Blocks submission.
    #[error("{0}")]
    Validation(String),

    /// A request/response call to the backend failed.
    #[error("{operation} failed: {source}")]
    RequestFailed {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// The backend reported an error for the tracked scan.
    #[error("Scan failed: {0}")]
    ScanFailed(String),

    #[error("HTTP client setup failed: {0}")]
    Setup(#[from] reqwest::Error),
}

impl ClientError {
    pub fn request_failed(operation: &'static str, err: impl Into<anyhow::Error>) -> Self {
        ClientError::RequestFailed {
            operation,
            source: err.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation(_))
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
