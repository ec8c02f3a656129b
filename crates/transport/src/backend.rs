//! The raw backend seam: one network attempt per call, no retry logic.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use tutor_core::ErrorKind;
use tutor_core::model::{Question, SessionId};

use crate::credentials::Credential;

/// Failure of a single backend attempt, classified for retry decisions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CallError {
    #[error("network error: {0}")]
    Network(String),

    #[error("server error: status {0}")]
    Server(u16),

    #[error("rate limited")]
    RateLimited,

    #[error("unauthorized")]
    Unauthorized,

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("malformed response: {0}")]
    Decode(String),
}

impl CallError {
    /// Map to the stable taxonomy; `Unauthorized` is handled by the
    /// credential guard before it ever reaches a retry decision.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::Network,
            Self::Server(_) => ErrorKind::Server,
            Self::RateLimited => ErrorKind::RateLimited,
            Self::Unauthorized => ErrorKind::AuthExpired,
            Self::Rejected(_) | Self::Decode(_) => ErrorKind::Validation,
        }
    }
}

/// Successful `start` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StartResponse {
    pub session_id: SessionId,
    pub question: Question,
    pub mastery: f64,
}

/// Successful `submit` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubmitResponse {
    pub correct: bool,
    pub reward: f64,
    pub mastery: f64,
    pub done: bool,
    #[serde(default)]
    pub next_question: Option<Question>,
}

/// One supplementary recommendation from the service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Recommendation {
    pub title: String,
    pub topic: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Read-only recommendation payload; losing it is never fatal.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct RecommendationList {
    #[serde(default)]
    pub items: Vec<Recommendation>,
    #[serde(default)]
    pub study_tip: Option<String>,
}

/// Raw calls against the remote adaptive-content service.
///
/// Implementations perform exactly one attempt per call; all retry,
/// backoff and credential recovery lives in `SessionTransport`.
#[async_trait]
pub trait AdaptiveBackend: Send + Sync {
    async fn start(
        &self,
        credential: Option<&Credential>,
        topic_hint: Option<&str>,
    ) -> Result<StartResponse, CallError>;

    async fn submit(
        &self,
        credential: Option<&Credential>,
        session_id: &SessionId,
        question_seq: u64,
        answer: &str,
    ) -> Result<SubmitResponse, CallError>;

    async fn recommendations(
        &self,
        credential: Option<&Credential>,
        session_id: &SessionId,
    ) -> Result<RecommendationList, CallError>;
}

/// Record of one attempt the scripted backend served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub op: &'static str,
    /// Token attached to the attempt, if any.
    pub credential: Option<String>,
}

/// Scripted in-memory backend for tests and offline development.
///
/// Responses are consumed in push order per operation; an exhausted script
/// answers with a network error so a misconfigured test fails loudly.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    starts: Arc<Mutex<VecDeque<Result<StartResponse, CallError>>>>,
    submits: Arc<Mutex<VecDeque<Result<SubmitResponse, CallError>>>>,
    recommendations: Arc<Mutex<VecDeque<Result<RecommendationList, CallError>>>>,
    calls: Arc<Mutex<Vec<CallRecord>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_start(&self, response: Result<StartResponse, CallError>) {
        lock(&self.starts).push_back(response);
    }

    pub fn push_submit(&self, response: Result<SubmitResponse, CallError>) {
        lock(&self.submits).push_back(response);
    }

    pub fn push_recommendations(&self, response: Result<RecommendationList, CallError>) {
        lock(&self.recommendations).push_back(response);
    }

    /// Every attempt served so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<CallRecord> {
        lock(&self.calls).clone()
    }

    /// Number of attempts served for one operation name.
    #[must_use]
    pub fn call_count(&self, op: &str) -> usize {
        lock(&self.calls).iter().filter(|r| r.op == op).count()
    }

    fn record(&self, op: &'static str, credential: Option<&Credential>) {
        lock(&self.calls).push(CallRecord {
            op,
            credential: credential.map(|c| c.token().to_owned()),
        });
    }

    fn next<T>(queue: &Mutex<VecDeque<Result<T, CallError>>>) -> Result<T, CallError> {
        lock(queue)
            .pop_front()
            .unwrap_or_else(|| Err(CallError::Network("script exhausted".into())))
    }
}

#[async_trait]
impl AdaptiveBackend for ScriptedBackend {
    async fn start(
        &self,
        credential: Option<&Credential>,
        _topic_hint: Option<&str>,
    ) -> Result<StartResponse, CallError> {
        self.record("start", credential);
        Self::next(&self.starts)
    }

    async fn submit(
        &self,
        credential: Option<&Credential>,
        _session_id: &SessionId,
        _question_seq: u64,
        _answer: &str,
    ) -> Result<SubmitResponse, CallError> {
        self.record("submit", credential);
        Self::next(&self.submits)
    }

    async fn recommendations(
        &self,
        credential: Option<&Credential>,
        _session_id: &SessionId,
    ) -> Result<RecommendationList, CallError> {
        self.record("recommendations", credential);
        Self::next(&self.recommendations)
    }
}
