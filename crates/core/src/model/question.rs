use serde::{Deserialize, Serialize};

use crate::model::QuestionId;

/// A single question selected by the adaptive service.
///
/// This mirrors the wire shape so the transport can deserialize it
/// directly; the client treats every field as server-authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub prompt: String,
    /// Answer choices; empty for free-text questions.
    #[serde(default)]
    pub choices: Vec<String>,
    #[serde(default)]
    pub free_text: bool,
    /// Skill tag the service associated with this question, if any.
    #[serde(default)]
    pub skill: Option<String>,
}

impl Question {
    #[must_use]
    pub fn is_multiple_choice(&self) -> bool {
        !self.free_text && !self.choices.is_empty()
    }
}
