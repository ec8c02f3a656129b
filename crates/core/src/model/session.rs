use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::error::{ErrorKind, SessionFault};
use crate::model::{Question, SessionId, Tally};

/// Lifecycle state of a session.
///
/// `Starting` and `Submitting` are guard states: exactly one asynchronous
/// operation may be outstanding while the session sits in one of them.
/// `Feedback` is the momentary phase between a confirmed submission and the
/// next prompt; the machine passes through it within a single settled
/// transition and never rests there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    AwaitingAnswer,
    Submitting,
    Feedback,
    Finished,
    Failed,
}

impl SessionState {
    /// Terminal states, re-enterable only via a fresh start.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }

    /// Guard states with an operation in flight.
    #[must_use]
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Starting | Self::Submitting)
    }
}

/// Illegal transition attempts, surfaced synchronously to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransitionError {
    #[error("another operation is already in flight")]
    ConcurrentOperation,

    #[error("{operation} is not valid while the session is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
}

impl TransitionError {
    /// Both variants are caller misuse; neither is ever retried.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ConcurrentOperation
    }
}

/// Proof that a submission was legally begun: the session and question
/// the in-flight answer belongs to. A response is applied only if these
/// still match when it arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitTicket {
    pub session_id: SessionId,
    pub seq: u64,
}

/// What the service decided the round leads to.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundOutcome {
    Continue { next_question: Question },
    Done,
}

/// A server-confirmed answer to one question.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerResult {
    pub correct: bool,
    pub reward: f64,
    pub mastery: f64,
    pub outcome: RoundOutcome,
}

/// The feedback portion of a confirmed submission, for presentation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundFeedback {
    pub correct: bool,
    pub reward: f64,
    pub finished: bool,
}

/// Whether a successful submit response produced a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitDisposition {
    Applied(RoundFeedback),
    /// The session had already moved on; the response was dropped without
    /// touching any state. Not an error.
    Stale,
}

/// Whether a failed submit produced a transition, and which one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureDisposition {
    /// Non-retryable rejection: back to `AwaitingAnswer` on the same
    /// question, tally untouched.
    RoundAborted,
    /// Retryable exhaustion or unrecoverable auth failure: the session is
    /// now `Failed`.
    SessionFailed,
    /// Response belonged to an abandoned round; dropped.
    Stale,
}

/// One continuous interaction with the adaptive backend.
///
/// Pure data plus transition functions; all I/O lives in the transport
/// and the driving service. The remote service is the source of truth for
/// `mastery`, and the tally only moves on server-confirmed submissions.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    state: SessionState,
    session_id: Option<SessionId>,
    current_question: Option<Question>,
    mastery: f64,
    tally: Tally,
    question_seq: u64,
    last_error: Option<SessionFault>,
    last_warning: Option<String>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            session_id: None,
            current_question: None,
            mastery: 0.0,
            tally: Tally::new(),
            question_seq: 0,
            last_error: None,
            last_warning: None,
            started_at: None,
            finished_at: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.current_question.as_ref()
    }

    #[must_use]
    pub fn mastery(&self) -> f64 {
        self.mastery
    }

    #[must_use]
    pub fn tally(&self) -> Tally {
        self.tally
    }

    #[must_use]
    pub fn question_seq(&self) -> u64 {
        self.question_seq
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&SessionFault> {
        self.last_error.as_ref()
    }

    #[must_use]
    pub fn last_warning(&self) -> Option<&str> {
        self.last_warning.as_deref()
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Enter `Starting`. Legal from `Idle`, the terminal states, and a
    /// resting round (which abandons the current question).
    ///
    /// Resets the tally and clears the previous question and error; any
    /// response still in flight for the old session is dropped later by the
    /// session-id/sequence check.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError::ConcurrentOperation` while another
    /// operation is in flight.
    pub fn begin_start(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.state.is_busy() {
            return Err(TransitionError::ConcurrentOperation);
        }

        self.state = SessionState::Starting;
        self.current_question = None;
        self.tally = Tally::new();
        self.question_seq = 0;
        self.last_error = None;
        self.last_warning = None;
        self.started_at = Some(now);
        self.finished_at = None;
        Ok(())
    }

    /// Apply a successful start response: `Starting -> AwaitingAnswer`.
    ///
    /// Returns `false` (and changes nothing) if the session is no longer
    /// `Starting`, i.e. the response arrived after abandonment.
    pub fn apply_start_success(
        &mut self,
        session_id: SessionId,
        question: Question,
        mastery: f64,
    ) -> bool {
        if self.state != SessionState::Starting {
            return false;
        }

        self.session_id = Some(session_id);
        self.current_question = Some(question);
        self.mastery = mastery.clamp(0.0, 1.0);
        self.question_seq = 0;
        self.state = SessionState::AwaitingAnswer;
        self.last_error = None;
        true
    }

    /// Apply a failed start: `Starting -> Failed` with the fault recorded.
    ///
    /// Returns `false` if the session had already moved on.
    pub fn apply_start_failure(&mut self, fault: SessionFault, now: DateTime<Utc>) -> bool {
        if self.state != SessionState::Starting {
            return false;
        }
        self.fail(fault, now);
        true
    }

    /// Enter `Submitting` for the live question.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError::ConcurrentOperation` while `Starting` or
    /// `Submitting`, and `TransitionError::InvalidState` anywhere else a
    /// submission makes no sense.
    pub fn begin_submit(&mut self) -> Result<SubmitTicket, TransitionError> {
        match self.state {
            SessionState::AwaitingAnswer => {}
            SessionState::Starting | SessionState::Submitting => {
                return Err(TransitionError::ConcurrentOperation);
            }
            state => {
                return Err(TransitionError::InvalidState {
                    operation: "submit",
                    state,
                });
            }
        }

        let Some(session_id) = self.session_id.clone() else {
            return Err(TransitionError::InvalidState {
                operation: "submit",
                state: self.state,
            });
        };

        self.state = SessionState::Submitting;
        Ok(SubmitTicket {
            session_id,
            seq: self.question_seq,
        })
    }

    fn ticket_is_live(&self, ticket: &SubmitTicket) -> bool {
        self.state == SessionState::Submitting
            && self.session_id.as_ref() == Some(&ticket.session_id)
            && ticket.seq == self.question_seq
    }

    /// Apply a confirmed submit response for the round the ticket names.
    ///
    /// Passes through `Feedback` into either the next round or `Finished`.
    /// A response whose session id or sequence no longer matches the live
    /// question is dropped as `Stale` with no state change.
    pub fn apply_submit_success(
        &mut self,
        ticket: &SubmitTicket,
        result: AnswerResult,
        now: DateTime<Utc>,
    ) -> SubmitDisposition {
        if !self.ticket_is_live(ticket) {
            return SubmitDisposition::Stale;
        }

        self.tally.record(result.correct, result.reward);
        self.mastery = result.mastery.clamp(0.0, 1.0);
        self.last_error = None;

        let feedback = match result.outcome {
            RoundOutcome::Continue { next_question } => {
                self.current_question = Some(next_question);
                self.question_seq += 1;
                self.state = SessionState::AwaitingAnswer;
                RoundFeedback {
                    correct: result.correct,
                    reward: result.reward,
                    finished: false,
                }
            }
            RoundOutcome::Done => {
                self.current_question = None;
                self.state = SessionState::Finished;
                self.finished_at = Some(now);
                RoundFeedback {
                    correct: result.correct,
                    reward: result.reward,
                    finished: true,
                }
            }
        };

        SubmitDisposition::Applied(feedback)
    }

    /// Apply a settled submit failure for the round the ticket names.
    ///
    /// Retryable exhaustion and unrecoverable auth failures end the session;
    /// non-retryable rejections return to `AwaitingAnswer` on the same
    /// question with the tally untouched, so the caller may answer again.
    pub fn apply_submit_failure(
        &mut self,
        ticket: &SubmitTicket,
        fault: SessionFault,
        now: DateTime<Utc>,
    ) -> FailureDisposition {
        if !self.ticket_is_live(ticket) {
            return FailureDisposition::Stale;
        }

        match fault.kind {
            ErrorKind::Validation | ErrorKind::ConcurrentOperation => {
                self.state = SessionState::AwaitingAnswer;
                self.last_error = Some(fault);
                FailureDisposition::RoundAborted
            }
            _ => {
                self.fail(fault, now);
                FailureDisposition::SessionFailed
            }
        }
    }

    /// Caller-requested end of the session.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError::ConcurrentOperation` while an operation is
    /// in flight; callers must wait for it to settle.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.state.is_busy() {
            return Err(TransitionError::ConcurrentOperation);
        }

        self.current_question = None;
        if self.state != SessionState::Finished {
            self.state = SessionState::Finished;
            self.finished_at = Some(now);
        }
        Ok(())
    }

    /// Record a non-fatal degraded-mode notice for presentation.
    pub fn set_warning(&mut self, message: impl Into<String>) {
        self.last_warning = Some(message.into());
    }

    fn fail(&mut self, fault: SessionFault, now: DateTime<Utc>) {
        self.state = SessionState::Failed;
        self.last_error = Some(fault);
        self.finished_at = Some(now);
    }
}
