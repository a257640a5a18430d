//! Error taxonomy for host scheduler communication.

use thiserror::Error;

/// Failures talking to the host scheduler service.
///
/// Variants are deliberately distinguishable: the scheduling layer
/// falls back to local execution on `Connection`/`Timeout`, surfaces
/// `Rejected` verbatim, and treats `MissingTime` as a caller bug.
#[derive(Debug, Error)]
pub enum HostError {
    /// The host service could not be reached at all.
    #[error("Failed to connect to host service: {0}")]
    Connection(String),

    /// The request was sent but no response arrived in time.
    #[error("Request to host service timed out")]
    Timeout,

    /// The host service answered with a non-success HTTP status.
    #[error("Host service returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The response body was not the expected JSON shape.
    #[error("Unexpected response from host service: {0}")]
    Protocol(String),

    /// The host service understood the request and refused it.
    #[error("Host service rejected the request: {raw}")]
    Rejected { raw: String },

    /// `schedule_job` was called for a spec without a `Time` field.
    /// Caught before any HTTP traffic.
    #[error("Job must have a time specified for scheduling")]
    MissingTime,
}

impl From<reqwest::Error> for HostError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else if err.is_decode() {
            Self::Protocol(err.to_string())
        } else {
            Self::Connection(err.to_string())
        }
    }
}
