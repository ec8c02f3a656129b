#![forbid(unsafe_code)]

pub mod backend;
pub mod client;
pub mod credentials;
pub mod error;
pub mod http;

pub use backend::{
    AdaptiveBackend, CallError, CallRecord, Recommendation, RecommendationList, ScriptedBackend,
    StartResponse, SubmitResponse,
};
pub use client::SessionTransport;
pub use credentials::{
    Credential, CredentialGuard, CredentialRefresher, CredentialStore, Criticality, GuardAction,
    InMemoryCredentialStore, NoRefresh,
};
pub use error::{AuthError, TransportError};
pub use http::{HttpBackend, HttpBackendConfig};
