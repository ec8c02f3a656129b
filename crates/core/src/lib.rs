#![forbid(unsafe_code)]

pub mod backoff;
pub mod error;
pub mod model;
pub mod time;

pub use backoff::{BackoffPolicy, RetryDecision};
pub use error::{ErrorKind, SessionFault};
pub use time::Clock;
