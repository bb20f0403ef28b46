use std::time::Duration;

use thiserror::Error;

/// Failures that abort a scan before (or instead of) producing a result.
///
/// Per-port network conditions (refused, filtered, timed out) are never
/// represented here; they are ordinary `open: false` probe outcomes.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Malformed host, unrecognized scan type, or an unusable request body.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The host matched the domain grammar but could not be resolved.
    #[error("could not resolve host {host}: {reason}")]
    Resolution { host: String, reason: String },

    /// Probing port 0 is a caller bug, not a network condition.
    #[error("invalid port number: {0}")]
    InvalidPort(u16),

    #[error("scan cancelled")]
    Cancelled,

    #[error("scan exceeded its deadline of {0:?}")]
    DeadlineExceeded(Duration),
}

impl ScanError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        ScanError::InvalidInput(msg.into())
    }

    pub fn resolution(host: impl Into<String>, reason: impl ToString) -> Self {
        ScanError::Resolution {
            host: host.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = ScanError> = std::result::Result<T, E>;
