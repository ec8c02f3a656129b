mod ids;
mod question;
mod session;
mod tally;

pub use ids::{QuestionId, SessionId};
pub use question::Question;
pub use session::{
    AnswerResult, FailureDisposition, RoundFeedback, RoundOutcome, Session, SessionState,
    SubmitDisposition, SubmitTicket, TransitionError,
};
pub use tally::Tally;
