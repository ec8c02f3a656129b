//! Drives the session state machine through the transport.

use std::sync::Arc;

use transport::{RecommendationList, SessionTransport, SubmitResponse};
use tutor_core::model::{
    AnswerResult, RoundFeedback, RoundOutcome, Session, SubmitDisposition, TransitionError,
};
use tutor_core::{Clock, SessionFault};

use crate::error::SessionError;
use crate::session_view::{SessionObserver, SessionSnapshot};

/// Outcome of a `submit` call that did not error.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundResult {
    /// The server confirmed the answer and the session advanced.
    Applied(RoundFeedback),
    /// The response arrived after the session had moved on and was
    /// dropped without a transition. Not an error; callers treat it as a
    /// no-op.
    Discarded,
}

/// Owns one `Session` and the only code path that mutates it.
///
/// All transport calls go through here, so at most one operation is ever
/// in flight; the guard states reject anything issued in between.
pub struct SessionManager {
    session: Session,
    transport: SessionTransport,
    clock: Clock,
    observers: Vec<Arc<dyn SessionObserver>>,
}

impl SessionManager {
    #[must_use]
    pub fn new(transport: SessionTransport) -> Self {
        Self {
            session: Session::new(),
            transport,
            clock: Clock::default(),
            observers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Register an observer notified after every settled transition.
    pub fn subscribe(&mut self, observer: Arc<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    /// Read-only view of the current session for presentation.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::of(&self.session)
    }

    /// Start a new session, optionally hinting a topic to the service.
    ///
    /// Restarting from `Finished`/`Failed` resets the tally and obtains a
    /// fresh session id.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` when an operation is already in flight or
    /// the transport settles as a failure; the session is then `Failed`
    /// with the fault recorded.
    pub async fn start(&mut self, topic_hint: Option<&str>) -> Result<(), SessionError> {
        self.session.begin_start(self.clock.now())?;
        self.notify();

        match self.transport.start(topic_hint).await {
            Ok(response) => {
                self.session.apply_start_success(
                    response.session_id,
                    response.question,
                    response.mastery,
                );
                self.notify();
                Ok(())
            }
            Err(err) => {
                self.session
                    .apply_start_failure(err.to_fault(), self.clock.now());
                self.notify();
                Err(err.into())
            }
        }
    }

    /// Submit an answer for the live question.
    ///
    /// The tally moves only on server-confirmed submissions, so a call
    /// that was retried internally still counts once. A response that no
    /// longer matches the live question is discarded quietly.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` for illegal states, transport exhaustion and
    /// protocol violations. Non-retryable rejections leave the session in
    /// `AwaitingAnswer` on the same question; exhaustion and auth failures
    /// leave it `Failed`.
    pub async fn submit(&mut self, answer: &str) -> Result<RoundResult, SessionError> {
        let ticket = self.session.begin_submit()?;
        self.notify();

        let settled = self
            .transport
            .submit(&ticket.session_id, ticket.seq, answer)
            .await;
        let now = self.clock.now();

        match settled {
            Ok(response) => match answer_result_from(response) {
                Ok(result) => {
                    match self.session.apply_submit_success(&ticket, result, now) {
                        SubmitDisposition::Applied(feedback) => {
                            self.notify();
                            Ok(RoundResult::Applied(feedback))
                        }
                        SubmitDisposition::Stale => {
                            tracing::debug!(seq = ticket.seq, "dropped stale submit response");
                            Ok(RoundResult::Discarded)
                        }
                    }
                }
                Err(err) => {
                    let fault = SessionFault::new(err.kind(), err.to_string());
                    self.session.apply_submit_failure(&ticket, fault, now);
                    self.notify();
                    Err(err)
                }
            },
            Err(err) => {
                self.session
                    .apply_submit_failure(&ticket, err.to_fault(), now);
                self.notify();
                Err(err.into())
            }
        }
    }

    /// End the session. Nothing is persisted client-side; the snapshot
    /// keeps the final tally until the next start.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` while an operation is in flight.
    pub fn finish(&mut self) -> Result<(), SessionError> {
        self.session.finish(self.clock.now())?;
        self.notify();
        Ok(())
    }

    /// Fetch supplementary recommendations for the running session.
    ///
    /// Authorization failure degrades: the session continues without the
    /// data and carries a non-fatal warning in its snapshot.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` when no session is running or the transport
    /// settles a non-auth failure.
    pub async fn fetch_recommendations(
        &mut self,
    ) -> Result<Option<RecommendationList>, SessionError> {
        let Some(session_id) = self.session.session_id().cloned() else {
            return Err(TransitionError::InvalidState {
                operation: "recommendations",
                state: self.session.state(),
            }
            .into());
        };

        match self.transport.recommendations(&session_id).await? {
            Some(list) => Ok(Some(list)),
            None => {
                self.session
                    .set_warning("recommendations are unavailable without sign-in");
                self.notify();
                Ok(None)
            }
        }
    }

    fn notify(&self) {
        if self.observers.is_empty() {
            return;
        }
        let snapshot = SessionSnapshot::of(&self.session);
        for observer in &self.observers {
            observer.on_transition(&snapshot);
        }
    }
}

fn answer_result_from(response: SubmitResponse) -> Result<AnswerResult, SessionError> {
    let outcome = match (response.done, response.next_question) {
        (true, _) => RoundOutcome::Done,
        (false, Some(next_question)) => RoundOutcome::Continue { next_question },
        (false, None) => {
            return Err(SessionError::Protocol(
                "non-final submit response carried no next question".into(),
            ));
        }
    };

    Ok(AnswerResult {
        correct: response.correct,
        reward: response.reward,
        mastery: response.mastery,
        outcome,
    })
}
