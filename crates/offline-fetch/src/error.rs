//! Fetch error types.

use thiserror::Error;

/// Transport failures.
///
/// A response with an error status is still a response; only failures to
/// obtain one are reported here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Could not reach the server (offline, DNS, refused).
    #[error("connection error: {0}")]
    Connection(String),

    /// The transport gave up waiting.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The URL could not be resolved.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Any other transport failure.
    #[error("request failed: {0}")]
    Request(String),
}
