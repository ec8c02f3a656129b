//! Shared error types for the services crate.

use thiserror::Error;

use transport::{AuthError, TransportError};
use tutor_core::ErrorKind;
use tutor_core::model::TransitionError;

/// Errors surfaced by `SessionManager` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The service broke its own contract, e.g. a non-final response
    /// without a next question.
    #[error("protocol violation: {0}")]
    Protocol(String),
}

impl SessionError {
    /// Stable kind for presentation and tests.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transition(err) => err.kind(),
            Self::Transport(err) => err.kind,
            Self::Auth(_) => ErrorKind::AuthExpired,
            Self::Protocol(_) => ErrorKind::Validation,
        }
    }
}
