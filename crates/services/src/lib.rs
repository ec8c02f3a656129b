#![forbid(unsafe_code)]

pub mod error;
pub mod session_manager;
pub mod session_view;

pub use tutor_core::Clock;

pub use error::SessionError;
pub use session_manager::{RoundResult, SessionManager};
pub use session_view::{QuestionView, SessionObserver, SessionSnapshot, TallyView};
