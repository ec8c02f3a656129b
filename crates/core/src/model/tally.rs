/// Running counters for a session, append-only.
///
/// Mutated only after a server-confirmed submission so that retried
/// calls can never double-count; reset only when a new session starts.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Tally {
    questions_answered: u32,
    correct_count: u32,
    reward_accumulated: f64,
}

impl Tally {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one confirmed submission.
    pub(crate) fn record(&mut self, correct: bool, reward: f64) {
        self.questions_answered = self.questions_answered.saturating_add(1);
        if correct {
            self.correct_count = self.correct_count.saturating_add(1);
        }
        self.reward_accumulated += reward;
    }

    #[must_use]
    pub fn questions_answered(&self) -> u32 {
        self.questions_answered
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    #[must_use]
    pub fn reward_accumulated(&self) -> f64 {
        self.reward_accumulated
    }
}
