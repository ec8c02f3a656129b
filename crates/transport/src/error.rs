//! Shared error types for the transport crate.

use thiserror::Error;

use tutor_core::{ErrorKind, SessionFault};

/// A transport operation that settled as a failure.
///
/// Retryable failures are only surfaced this way after the attempt cap was
/// exhausted; `attempts` records how many times the call was issued.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    pub kind: ErrorKind,
    pub attempts: u32,
    pub message: String,
}

impl TransportError {
    #[must_use]
    pub fn new(kind: ErrorKind, attempts: u32, message: impl Into<String>) -> Self {
        Self {
            kind,
            attempts,
            message: message.into(),
        }
    }

    /// Convert into the fault shape the session retains for presentation.
    #[must_use]
    pub fn to_fault(&self) -> SessionFault {
        SessionFault::new(self.kind, self.message.clone())
    }
}

/// Failures of the credential collaborator itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AuthError {
    #[error("no credential refresh mechanism is configured")]
    RefreshUnavailable,

    #[error("credential refresh was rejected: {0}")]
    RefreshRejected(String),
}
