//! Shared error taxonomy for the tutoring client.

use thiserror::Error;

/// Stable classification of a failure, suitable for presentation and
/// for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Connection failure or timeout before a response arrived.
    Network,
    /// The service answered with a 5xx status.
    Server,
    /// The service asked us to slow down (429).
    RateLimited,
    /// The credential was rejected and could not be refreshed.
    AuthExpired,
    /// The request itself was malformed or rejected (4xx other than 401/429),
    /// or the response could not be decoded.
    Validation,
    /// Caller misuse: an operation was issued while another was in flight.
    ConcurrentOperation,
}

impl ErrorKind {
    /// Whether a failure of this kind is worth re-issuing.
    ///
    /// Retrying a malformed request cannot succeed, and auth failures are
    /// recovered through credential refresh rather than blind retry.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::Server | Self::RateLimited)
    }
}

/// A settled failure retained on the session for presentation.
///
/// Cleared on the next successful transition. The message is
/// human-readable; the kind is stable and safe to match on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SessionFault {
    pub kind: ErrorKind,
    pub message: String,
}

impl SessionFault {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
