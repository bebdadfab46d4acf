//! Transport error types.

use thiserror::Error;

/// Result alias for transport operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors produced by the HTTP transport.
///
/// `Api` carries the response's text payload when one was available, so the
/// orchestrator can log the server's own description of the failure.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection-level failure (DNS, TLS, reset, timeout).
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("api error (status {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body text, or the status reason when the body was empty.
        message: String,
    },

    /// A streaming endpoint answered success but delivered no body.
    #[error("response body was empty where a stream was required")]
    EmptyBody,

    /// A response payload failed to parse.
    #[error("invalid json payload: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// HTTP status carried by this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
