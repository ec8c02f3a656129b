//! Presentation boundary: read-only snapshots and the subscription seam.

use chrono::{DateTime, Utc};

use tutor_core::SessionFault;
use tutor_core::model::{Question, QuestionId, Session, SessionId, SessionState, Tally};

/// Presentation-agnostic copy of the live question.
///
/// This is intentionally **not** a UI view-model: no pre-formatted
/// strings, no localization assumptions. The UI decides how to render
/// choices and skill tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionView {
    pub id: QuestionId,
    pub prompt: String,
    pub choices: Vec<String>,
    pub free_text: bool,
    pub skill: Option<String>,
}

impl QuestionView {
    #[must_use]
    pub fn from_question(question: &Question) -> Self {
        Self {
            id: question.id.clone(),
            prompt: question.prompt.clone(),
            choices: question.choices.clone(),
            free_text: question.free_text,
            skill: question.skill.clone(),
        }
    }
}

/// Flat copy of the running counters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TallyView {
    pub questions_answered: u32,
    pub correct_count: u32,
    pub reward_accumulated: f64,
}

impl TallyView {
    #[must_use]
    pub fn from_tally(tally: Tally) -> Self {
        Self {
            questions_answered: tally.questions_answered(),
            correct_count: tally.correct_count(),
            reward_accumulated: tally.reward_accumulated(),
        }
    }
}

/// Read-only snapshot of a session for the presentation layer.
///
/// On `Failed` the UI is expected to offer an explicit restart action
/// driven by `last_error`, never an automatic retry loop.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub session_id: Option<SessionId>,
    pub current_question: Option<QuestionView>,
    pub mastery: f64,
    pub tally: TallyView,
    pub last_error: Option<SessionFault>,
    pub last_warning: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SessionSnapshot {
    #[must_use]
    pub fn of(session: &Session) -> Self {
        Self {
            state: session.state(),
            session_id: session.session_id().cloned(),
            current_question: session.current_question().map(QuestionView::from_question),
            mastery: session.mastery(),
            tally: TallyView::from_tally(session.tally()),
            last_error: session.last_error().cloned(),
            last_warning: session.last_warning().map(str::to_owned),
            started_at: session.started_at(),
            finished_at: session.finished_at(),
        }
    }
}

/// Subscription seam binding the session to any UI layer.
///
/// Observers are notified after every settled transition, on the caller's
/// task; implementations should hand off quickly.
pub trait SessionObserver: Send + Sync {
    fn on_transition(&self, snapshot: &SessionSnapshot);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutor_core::model::SessionId as Sid;
    use tutor_core::time::fixed_now;

    #[test]
    fn snapshot_mirrors_session_fields() {
        let mut session = Session::new();
        session.begin_start(fixed_now()).unwrap();
        session.apply_start_success(
            Sid::new("s1"),
            Question {
                id: QuestionId::new("q1"),
                prompt: "2+2?".into(),
                choices: vec!["3".into(), "4".into()],
                free_text: false,
                skill: Some("arithmetic".into()),
            },
            0.5,
        );

        let snapshot = SessionSnapshot::of(&session);
        assert_eq!(snapshot.state, SessionState::AwaitingAnswer);
        assert_eq!(snapshot.session_id.unwrap().as_str(), "s1");
        let question = snapshot.current_question.unwrap();
        assert_eq!(question.id.as_str(), "q1");
        assert_eq!(question.choices.len(), 2);
        assert_eq!(snapshot.tally.questions_answered, 0);
        assert!(snapshot.last_error.is_none());
        assert_eq!(snapshot.started_at, Some(fixed_now()));
        assert!(snapshot.finished_at.is_none());
    }
}
