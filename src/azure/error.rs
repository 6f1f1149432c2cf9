//! ARM error types

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the ARM client and the compute driver
#[derive(Error, Debug)]
pub enum ArmError {
    /// Local validation failed before any remote call was made
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The remote resource is not in a state that allows the operation
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Non-2xx response carrying the remote-supplied message
    #[error("API request failed: {method} {path} returned {status}: {message}")]
    Remote {
        method: String,
        path: String,
        status: u16,
        message: String,
    },

    /// Rate limited without a server-specified wait
    #[error("Rate limit reached for {path} and no retry delay was given")]
    RateLimited { path: String },

    #[error("Maximum retries ({max_retries}) reached for {path}. Please try again later")]
    RetriesExhausted { path: String, max_retries: u32 },

    #[error("Too many redirects ({max_redirects}) while requesting {path}")]
    TooManyRedirects { path: String, max_redirects: u32 },

    /// A paged listing repeated a link or ran past the page limit
    #[error("Paged listing of {path} did not terminate after {pages} pages")]
    PagingLoop { path: String, pages: u32 },

    #[error("Invalid redirect location: {0}")]
    InvalidRedirect(String),

    /// A linked sub-resource could not be fetched or understood
    #[error("Failed to resolve {reference}: {source}")]
    Resolution {
        reference: String,
        #[source]
        source: Box<ArmError>,
    },

    #[error("Malformed response from {path}: {message}")]
    MalformedResponse { path: String, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ArmError {
    pub fn malformed(path: &str, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// Wrap an error as the failure to resolve `reference`
    pub fn resolution(reference: &str, source: ArmError) -> Self {
        Self::Resolution {
            reference: reference.to_string(),
            source: Box::new(source),
        }
    }

    /// HTTP status of a remote rejection, if this is one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            Self::RateLimited { .. } | Self::RetriesExhausted { .. } => Some(429),
            Self::Resolution { source, .. } => source.status(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ArmError>;

/// Three-way classification reported by a raw transport
#[derive(Error, Debug)]
pub enum TransportError {
    /// The server points at a different target
    #[error("Redirected to {location}")]
    Redirect { location: String },

    #[error("Rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error(transparent)]
    Failed(#[from] ArmError),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self::Failed(ArmError::Http(err))
    }
}
