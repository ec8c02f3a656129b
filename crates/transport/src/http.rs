//! reqwest adapter for the remote adaptive-content service.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use tutor_core::model::SessionId;

use crate::backend::{AdaptiveBackend, CallError, RecommendationList, StartResponse, SubmitResponse};
use crate::credentials::Credential;

const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Clone, Debug)]
pub struct HttpBackendConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl HttpBackendConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read the backend location from `TUTOR_API_BASE_URL`, with an
    /// optional `TUTOR_API_TIMEOUT_SECS` override.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("TUTOR_API_BASE_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }

        let timeout = env::var("TUTOR_API_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .map_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS), Duration::from_secs);

        Some(Self {
            base_url,
            timeout,
        })
    }
}

/// HTTP implementation of `AdaptiveBackend`.
pub struct HttpBackend {
    client: Client,
    config: HttpBackendConfig,
}

impl HttpBackend {
    /// # Errors
    ///
    /// Returns the underlying client-construction error, e.g. when no TLS
    /// backend is available.
    pub fn new(config: HttpBackendConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    async fn execute<T: DeserializeOwned>(
        request: RequestBuilder,
        credential: Option<&Credential>,
    ) -> Result<T, CallError> {
        let request = match credential {
            Some(credential) => request.bearer_auth(credential.token()),
            None => request,
        };

        let response = request.send().await.map_err(classify_request_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status));
        }

        response
            .json::<T>()
            .await
            .map_err(|err| CallError::Decode(err.to_string()))
    }
}

fn classify_request_error(err: reqwest::Error) -> CallError {
    // Timeouts, DNS and connection resets all land here; each is worth a
    // retry under the backoff policy.
    CallError::Network(err.to_string())
}

fn classify_status(status: StatusCode) -> CallError {
    match status {
        StatusCode::UNAUTHORIZED => CallError::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS => CallError::RateLimited,
        s if s.is_server_error() => CallError::Server(s.as_u16()),
        s => CallError::Rejected(format!("status {}", s.as_u16())),
    }
}

#[derive(Debug, Serialize)]
struct StartRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    topic_hint: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    session_id: &'a str,
    question_seq: u64,
    answer: &'a str,
}

#[async_trait]
impl AdaptiveBackend for HttpBackend {
    async fn start(
        &self,
        credential: Option<&Credential>,
        topic_hint: Option<&str>,
    ) -> Result<StartResponse, CallError> {
        let request = self
            .client
            .post(self.url("/session/start"))
            .json(&StartRequest { topic_hint });
        Self::execute(request, credential).await
    }

    async fn submit(
        &self,
        credential: Option<&Credential>,
        session_id: &SessionId,
        question_seq: u64,
        answer: &str,
    ) -> Result<SubmitResponse, CallError> {
        let request = self
            .client
            .post(self.url("/session/submit"))
            .json(&SubmitRequest {
                session_id: session_id.as_str(),
                question_seq,
                answer,
            });
        Self::execute(request, credential).await
    }

    async fn recommendations(
        &self,
        credential: Option<&Credential>,
        session_id: &SessionId,
    ) -> Result<RecommendationList, CallError> {
        let request = self
            .client
            .get(self.url("/session/recommendations"))
            .query(&[("session_id", session_id.as_str())]);
        Self::execute(request, credential).await
    }
}
