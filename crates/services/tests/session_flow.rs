use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use services::{Clock, RoundResult, SessionManager, SessionObserver, SessionSnapshot};
use transport::{
    AuthError, CallError, Credential, CredentialRefresher, InMemoryCredentialStore, NoRefresh,
    Recommendation, RecommendationList, ScriptedBackend, SessionTransport, StartResponse,
    SubmitResponse,
};
use tutor_core::model::{Question, QuestionId, SessionId, SessionState};
use tutor_core::time::fixed_now;
use tutor_core::{BackoffPolicy, ErrorKind};

struct FixedRefresher(&'static str);

#[async_trait]
impl CredentialRefresher for FixedRefresher {
    async fn refresh(&self) -> Result<Credential, AuthError> {
        Ok(Credential::new(self.0))
    }
}

/// Records the state of every snapshot it is handed.
#[derive(Default)]
struct StateRecorder(Mutex<Vec<SessionState>>);

impl SessionObserver for StateRecorder {
    fn on_transition(&self, snapshot: &SessionSnapshot) {
        self.0.lock().unwrap().push(snapshot.state);
    }
}

fn question(id: &str) -> Question {
    Question {
        id: QuestionId::new(id),
        prompt: format!("prompt {id}"),
        choices: vec!["A".into(), "B".into()],
        free_text: false,
        skill: Some("algebra".into()),
    }
}

fn start_response(session: &str, q: &str, mastery: f64) -> StartResponse {
    StartResponse {
        session_id: SessionId::new(session),
        question: question(q),
        mastery,
    }
}

fn continue_response(next: &str) -> SubmitResponse {
    SubmitResponse {
        correct: true,
        reward: 1.0,
        mastery: 0.55,
        done: false,
        next_question: Some(question(next)),
    }
}

fn done_response() -> SubmitResponse {
    SubmitResponse {
        correct: true,
        reward: 1.0,
        mastery: 0.55,
        done: true,
        next_question: None,
    }
}

fn manager_over(backend: &ScriptedBackend) -> SessionManager {
    manager_with_auth(backend, "tok", Arc::new(NoRefresh))
}

fn manager_with_auth(
    backend: &ScriptedBackend,
    token: &str,
    refresher: Arc<dyn CredentialRefresher>,
) -> SessionManager {
    let store = InMemoryCredentialStore::with_token(token);
    let transport = SessionTransport::new(Arc::new(backend.clone()), Arc::new(store), refresher)
        .with_backoff(BackoffPolicy::without_delay(3));
    SessionManager::new(transport).with_clock(Clock::fixed(fixed_now()))
}

#[tokio::test]
async fn full_round_advances_question_and_tally() {
    let backend = ScriptedBackend::new();
    backend.push_start(Ok(start_response("s1", "q1", 0.5)));
    backend.push_submit(Ok(continue_response("q2")));
    let mut manager = manager_over(&backend);

    manager.start(None).await.unwrap();
    let snapshot = manager.snapshot();
    assert_eq!(snapshot.state, SessionState::AwaitingAnswer);
    assert_eq!(snapshot.session_id.as_ref().unwrap().as_str(), "s1");
    assert_eq!(snapshot.tally.questions_answered, 0);
    assert_eq!(snapshot.tally.correct_count, 0);
    assert!((snapshot.mastery - 0.5).abs() < f64::EPSILON);

    let result = manager.submit("A").await.unwrap();
    let RoundResult::Applied(feedback) = result else {
        panic!("expected applied round, got {result:?}");
    };
    assert!(feedback.correct);
    assert!(!feedback.finished);

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.state, SessionState::AwaitingAnswer);
    assert_eq!(
        snapshot.current_question.as_ref().unwrap().id.as_str(),
        "q2"
    );
    assert_eq!(snapshot.tally.questions_answered, 1);
    assert_eq!(snapshot.tally.correct_count, 1);
    assert!((snapshot.tally.reward_accumulated - 1.0).abs() < f64::EPSILON);
    assert!((snapshot.mastery - 0.55).abs() < f64::EPSILON);
}

#[tokio::test]
async fn final_round_finishes_and_clears_question() {
    let backend = ScriptedBackend::new();
    backend.push_start(Ok(start_response("s1", "q1", 0.5)));
    backend.push_submit(Ok(done_response()));
    let mut manager = manager_over(&backend);

    manager.start(None).await.unwrap();
    let result = manager.submit("A").await.unwrap();
    let RoundResult::Applied(feedback) = result else {
        panic!("expected applied round");
    };
    assert!(feedback.finished);

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.state, SessionState::Finished);
    assert!(snapshot.current_question.is_none());
    assert_eq!(snapshot.tally.questions_answered, 1);
}

#[tokio::test]
async fn retried_submission_counts_once() {
    let backend = ScriptedBackend::new();
    backend.push_start(Ok(start_response("s1", "q1", 0.5)));
    backend.push_submit(Err(CallError::Network("reset".into())));
    backend.push_submit(Err(CallError::Server(502)));
    backend.push_submit(Ok(continue_response("q2")));
    let mut manager = manager_over(&backend);

    manager.start(None).await.unwrap();
    manager.submit("A").await.unwrap();

    // Three network attempts, exactly one confirmed submission.
    assert_eq!(backend.call_count("submit"), 3);
    assert_eq!(manager.snapshot().tally.questions_answered, 1);
}

#[tokio::test]
async fn start_against_dead_service_fails_after_three_attempts() {
    let backend = ScriptedBackend::new();
    for _ in 0..3 {
        backend.push_start(Err(CallError::Network("timed out".into())));
    }
    let mut manager = manager_over(&backend);
    let recorder = Arc::new(StateRecorder::default());
    manager.subscribe(recorder.clone());

    let err = manager.start(None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(backend.call_count("start"), 3);

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.state, SessionState::Failed);
    assert_eq!(snapshot.last_error.as_ref().unwrap().kind, ErrorKind::Network);

    assert_eq!(
        *recorder.0.lock().unwrap(),
        vec![SessionState::Starting, SessionState::Failed]
    );
}

#[tokio::test]
async fn submit_survives_credential_expiry() {
    let backend = ScriptedBackend::new();
    backend.push_start(Ok(start_response("s1", "q1", 0.5)));
    backend.push_submit(Err(CallError::Unauthorized));
    backend.push_submit(Ok(done_response()));
    let mut manager = manager_with_auth(&backend, "stale", Arc::new(FixedRefresher("fresh")));

    manager.start(None).await.unwrap();
    let result = manager.submit("A").await.unwrap();
    assert!(matches!(result, RoundResult::Applied(_)));

    // No error surfaced anywhere.
    let snapshot = manager.snapshot();
    assert_eq!(snapshot.state, SessionState::Finished);
    assert!(snapshot.last_error.is_none());
}

#[tokio::test]
async fn unrecoverable_auth_failure_fails_the_session() {
    let backend = ScriptedBackend::new();
    backend.push_start(Ok(start_response("s1", "q1", 0.5)));
    backend.push_submit(Err(CallError::Unauthorized));
    let mut manager = manager_with_auth(&backend, "stale", Arc::new(NoRefresh));

    manager.start(None).await.unwrap();
    let err = manager.submit("A").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthExpired);

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.state, SessionState::Failed);
    assert_eq!(
        snapshot.last_error.as_ref().unwrap().kind,
        ErrorKind::AuthExpired
    );
}

#[tokio::test]
async fn rejected_answer_keeps_question_and_tally() {
    let backend = ScriptedBackend::new();
    backend.push_start(Ok(start_response("s1", "q1", 0.5)));
    backend.push_submit(Err(CallError::Rejected("malformed answer payload".into())));
    let mut manager = manager_over(&backend);

    manager.start(None).await.unwrap();
    let err = manager.submit("A").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(backend.call_count("submit"), 1);

    // Same question, nothing counted; the caller may answer again.
    let snapshot = manager.snapshot();
    assert_eq!(snapshot.state, SessionState::AwaitingAnswer);
    assert_eq!(
        snapshot.current_question.as_ref().unwrap().id.as_str(),
        "q1"
    );
    assert_eq!(snapshot.tally.questions_answered, 0);
    assert_eq!(
        snapshot.last_error.as_ref().unwrap().kind,
        ErrorKind::Validation
    );
}

#[tokio::test]
async fn restart_resets_tally_and_session_id() {
    let backend = ScriptedBackend::new();
    backend.push_start(Ok(start_response("s1", "q1", 0.5)));
    backend.push_submit(Ok(done_response()));
    backend.push_start(Ok(start_response("s2", "q1", 0.4)));
    let mut manager = manager_over(&backend);

    manager.start(None).await.unwrap();
    manager.submit("A").await.unwrap();
    assert_eq!(manager.snapshot().tally.questions_answered, 1);

    manager.start(Some("geometry")).await.unwrap();
    let snapshot = manager.snapshot();
    assert_eq!(snapshot.session_id.as_ref().unwrap().as_str(), "s2");
    assert_eq!(snapshot.tally.questions_answered, 0);
    assert_eq!(snapshot.state, SessionState::AwaitingAnswer);
}

#[tokio::test]
async fn degraded_recommendations_leave_session_running_with_warning() {
    let backend = ScriptedBackend::new();
    backend.push_start(Ok(start_response("s1", "q1", 0.5)));
    backend.push_recommendations(Err(CallError::Unauthorized));
    let mut manager = manager_with_auth(&backend, "stale", Arc::new(NoRefresh));

    manager.start(None).await.unwrap();
    let recommendations = manager.fetch_recommendations().await.unwrap();
    assert!(recommendations.is_none());

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.state, SessionState::AwaitingAnswer);
    assert!(snapshot.last_error.is_none());
    assert!(snapshot.last_warning.is_some());
}

#[tokio::test]
async fn recommendations_flow_through_when_authorized() {
    let backend = ScriptedBackend::new();
    backend.push_start(Ok(start_response("s1", "q1", 0.5)));
    backend.push_recommendations(Ok(RecommendationList {
        items: vec![Recommendation {
            title: "Fractions refresher".into(),
            topic: "fractions".into(),
            confidence: 0.8,
            reason: Some("recent mistakes".into()),
        }],
        study_tip: Some("shorter sessions".into()),
    }));
    let mut manager = manager_over(&backend);

    manager.start(None).await.unwrap();
    let recommendations = manager.fetch_recommendations().await.unwrap().unwrap();
    assert_eq!(recommendations.items.len(), 1);
    assert!(manager.snapshot().last_warning.is_none());
}

#[tokio::test]
async fn observer_sees_each_settled_transition() {
    let backend = ScriptedBackend::new();
    backend.push_start(Ok(start_response("s1", "q1", 0.5)));
    backend.push_submit(Ok(continue_response("q2")));
    backend.push_submit(Ok(done_response()));
    let mut manager = manager_over(&backend);
    let recorder = Arc::new(StateRecorder::default());
    manager.subscribe(recorder.clone());

    manager.start(None).await.unwrap();
    manager.submit("A").await.unwrap();
    manager.submit("B").await.unwrap();

    assert_eq!(
        *recorder.0.lock().unwrap(),
        vec![
            SessionState::Starting,
            SessionState::AwaitingAnswer,
            SessionState::Submitting,
            SessionState::AwaitingAnswer,
            SessionState::Submitting,
            SessionState::Finished,
        ]
    );
}

#[tokio::test]
async fn finish_is_idempotent_and_clears_question() {
    let backend = ScriptedBackend::new();
    backend.push_start(Ok(start_response("s1", "q1", 0.5)));
    let mut manager = manager_over(&backend);

    manager.start(None).await.unwrap();
    manager.finish().unwrap();
    manager.finish().unwrap();

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.state, SessionState::Finished);
    assert!(snapshot.current_question.is_none());
}
