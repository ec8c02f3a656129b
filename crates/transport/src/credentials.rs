//! Credential storage and the unauthorized-response recovery path.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::AuthError;

/// Bearer credential for the adaptive service.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never log token material.
        f.write_str("Credential(..)")
    }
}

/// Process-wide credential storage, injected so the guard and transport
/// depend on an abstraction rather than a global.
///
/// Implementations may be shared across concurrent sessions; callers must
/// re-read before each network attempt instead of caching.
pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Option<Credential>;
    fn set(&self, credential: Credential);
    fn clear(&self);
}

/// In-memory credential store for tests and single-process use.
#[derive(Clone, Default)]
pub struct InMemoryCredentialStore {
    inner: Arc<Mutex<Option<Credential>>>,
}

impl InMemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        let store = Self::new();
        store.set(Credential::new(token));
        store
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn get(&self) -> Option<Credential> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, credential: Credential) {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = Some(credential);
    }

    fn clear(&self) {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Silent re-authentication collaborator.
#[async_trait]
pub trait CredentialRefresher: Send + Sync {
    /// Obtain a fresh credential, or explain why that is impossible.
    async fn refresh(&self) -> Result<Credential, AuthError>;
}

/// Refresher for deployments without silent re-auth; always reports
/// `AuthError::RefreshUnavailable`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRefresh;

#[async_trait]
impl CredentialRefresher for NoRefresh {
    async fn refresh(&self) -> Result<Credential, AuthError> {
        Err(AuthError::RefreshUnavailable)
    }
}

/// Whether an operation can survive losing its credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criticality {
    /// `start`/`submit`: the session cannot proceed without authorization.
    SessionCritical,
    /// Supplementary fetches the session can continue without.
    ReadOnly,
}

/// How the caller should proceed after an unauthorized response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardAction {
    /// A fresh credential is in the store; re-issue the original call once.
    Retry,
    /// Continue without the requested data and surface a non-fatal warning.
    Degrade,
    /// The session must fail with an auth error.
    Halt,
}

/// Detects authorization failures, clears the stale credential and decides
/// whether the session can continue.
#[derive(Clone)]
pub struct CredentialGuard {
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn CredentialRefresher>,
}

impl CredentialGuard {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, refresher: Arc<dyn CredentialRefresher>) -> Self {
        Self { store, refresher }
    }

    /// Handle a 401: discard the stored credential, attempt a silent
    /// refresh, and report how the original call should proceed.
    pub async fn handle_unauthorized(&self, criticality: Criticality) -> GuardAction {
        self.store.clear();

        match self.refresher.refresh().await {
            Ok(credential) => {
                self.store.set(credential);
                GuardAction::Retry
            }
            Err(err) => {
                tracing::warn!(%err, ?criticality, "credential refresh failed");
                match criticality {
                    Criticality::ReadOnly => GuardAction::Degrade,
                    Criticality::SessionCritical => GuardAction::Halt,
                }
            }
        }
    }

    /// Explicit refresh requested by the caller.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` when no refresh mechanism exists or the
    /// collaborator rejects the request.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        let credential = self.refresher.refresh().await?;
        self.store.set(credential);
        Ok(())
    }
}
