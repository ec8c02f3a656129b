//! Retry, backoff and credential recovery around the raw backend.
//!
//! Every network call in the client routes through `SessionTransport`;
//! call sites never hand-roll retry loops.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tutor_core::model::SessionId;
use tutor_core::{BackoffPolicy, ErrorKind};

use crate::backend::{
    AdaptiveBackend, CallError, RecommendationList, StartResponse, SubmitResponse,
};
use crate::credentials::{
    Credential, CredentialGuard, CredentialRefresher, CredentialStore, Criticality, GuardAction,
};
use crate::error::{AuthError, TransportError};

type AttemptFuture<T> = Pin<Box<dyn Future<Output = Result<T, CallError>> + Send + 'static>>;

/// Wraps backend calls so they look idempotent to the session layer:
/// retryable failures are re-issued under the backoff policy, a 401 goes
/// through the credential guard before any retry, and only settled
/// outcomes flow upward.
#[derive(Clone)]
pub struct SessionTransport {
    backend: Arc<dyn AdaptiveBackend>,
    store: Arc<dyn CredentialStore>,
    guard: CredentialGuard,
    policy: BackoffPolicy,
}

impl SessionTransport {
    #[must_use]
    pub fn new(
        backend: Arc<dyn AdaptiveBackend>,
        store: Arc<dyn CredentialStore>,
        refresher: Arc<dyn CredentialRefresher>,
    ) -> Self {
        let guard = CredentialGuard::new(store.clone(), refresher);
        Self {
            backend,
            store,
            guard,
            policy: BackoffPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_backoff(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Start a session, optionally steering the service toward a topic.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` once retries and credential recovery are
    /// exhausted.
    pub async fn start(&self, topic_hint: Option<&str>) -> Result<StartResponse, TransportError> {
        let backend = Arc::clone(&self.backend);
        let hint = topic_hint.map(str::to_owned);
        self.run("start", Criticality::SessionCritical, move |credential| {
            let backend = Arc::clone(&backend);
            let hint = hint.clone();
            Box::pin(async move { backend.start(credential.as_ref(), hint.as_deref()).await })
        })
        .await
    }

    /// Submit the answer for the question identified by `question_seq`.
    ///
    /// The caller must discard the response if its live question has
    /// changed in the meantime; the sequence number exists for that check.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` once retries and credential recovery are
    /// exhausted.
    pub async fn submit(
        &self,
        session_id: &SessionId,
        question_seq: u64,
        answer: &str,
    ) -> Result<SubmitResponse, TransportError> {
        let backend = Arc::clone(&self.backend);
        let session_id = session_id.clone();
        let answer = answer.to_owned();
        self.run("submit", Criticality::SessionCritical, move |credential| {
            let backend = Arc::clone(&backend);
            let session_id = session_id.clone();
            let answer = answer.clone();
            Box::pin(async move {
                backend
                    .submit(credential.as_ref(), &session_id, question_seq, &answer)
                    .await
            })
        })
        .await
    }

    /// Fetch supplementary recommendations.
    ///
    /// Authorization failure here is non-fatal: the call degrades to
    /// `Ok(None)` and the session continues without the data.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` for non-auth failures after exhaustion.
    pub async fn recommendations(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<RecommendationList>, TransportError> {
        let backend = Arc::clone(&self.backend);
        let session_id = session_id.clone();
        let outcome = self
            .run("recommendations", Criticality::ReadOnly, move |credential| {
                let backend = Arc::clone(&backend);
                let session_id = session_id.clone();
                Box::pin(async move {
                    backend
                        .recommendations(credential.as_ref(), &session_id)
                        .await
                })
            })
            .await;

        match outcome {
            Ok(list) => Ok(Some(list)),
            Err(err) if err.kind == ErrorKind::AuthExpired => {
                tracing::warn!("recommendations unavailable, continuing without them");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Explicitly refresh the stored credential.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` when no refresh mechanism exists or the
    /// collaborator rejects the request.
    pub async fn refresh_credential(&self) -> Result<(), AuthError> {
        self.guard.refresh().await
    }

    async fn run<T>(
        &self,
        op: &'static str,
        criticality: Criticality,
        call: impl Fn(Option<Credential>) -> AttemptFuture<T>,
    ) -> Result<T, TransportError> {
        let mut attempt: u32 = 0;
        let mut refreshed = false;

        loop {
            attempt += 1;
            // The store is shared and may be mutated by the guard at any
            // time; re-read per attempt instead of caching.
            let credential = self.store.get();

            match call(credential).await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(op, attempt, "call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(CallError::Unauthorized) => {
                    if refreshed {
                        tracing::error!(op, "refreshed credential was rejected");
                        return Err(TransportError::new(
                            ErrorKind::AuthExpired,
                            attempt,
                            "credential was rejected again after refresh",
                        ));
                    }
                    refreshed = true;
                    match self.guard.handle_unauthorized(criticality).await {
                        GuardAction::Retry => {
                            tracing::debug!(op, "credential refreshed, re-issuing call");
                            // The single re-issue with the fresh credential
                            // does not count against the attempt cap.
                            attempt -= 1;
                        }
                        GuardAction::Degrade | GuardAction::Halt => {
                            return Err(TransportError::new(
                                ErrorKind::AuthExpired,
                                attempt,
                                "credential expired and could not be refreshed",
                            ));
                        }
                    }
                }
                Err(err) => {
                    let kind = err.kind();
                    let decision = self.policy.next_delay(attempt, kind);
                    if !decision.retry {
                        tracing::error!(op, attempt, error = %err, "giving up");
                        return Err(TransportError::new(kind, attempt, err.to_string()));
                    }
                    tracing::debug!(op, attempt, delay = ?decision.delay, "retrying after failure");
                    tokio::time::sleep(decision.delay).await;
                }
            }
        }
    }
}
