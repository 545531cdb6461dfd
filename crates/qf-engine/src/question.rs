//! Question and answer records shared by every engine component.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

/// Number of options in the observed question schema.
pub const OPTIONS_PER_QUESTION: usize = 4;

/// A single-answer multiple choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Unique question identifier
    pub id: Uuid,
    /// Topic the question belongs to
    pub topic: String,
    /// Difficulty level, starting at 1
    pub level: u32,
    /// Question text
    pub text: String,
    /// Options in canonical order
    pub options: Vec<String>,
    /// Index of the correct option in `options`
    pub correct_index: usize,
    /// Shown after the learner answers
    pub explanation: String,
    /// Optional hint shown on demand
    pub hint: Option<String>,
    /// Tagged concepts, may be empty
    #[serde(default)]
    pub concepts: Vec<String>,
}

impl Question {
    /// Check the structural invariants of a question.
    ///
    /// A question needs at least two options, a level of 1 or more and a
    /// correct index that points inside `options`.
    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |reason: &str| EngineError::InvalidQuestion {
            id: self.id,
            reason: reason.to_string(),
        };

        if self.level == 0 {
            return Err(invalid("level must be at least 1"));
        }
        if self.options.len() < 2 {
            return Err(invalid("at least two options are required"));
        }
        if self.correct_index >= self.options.len() {
            return Err(invalid("correct index is out of range"));
        }

        Ok(())
    }
}

/// One submitted answer. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerEvent {
    pub question_id: Uuid,
    pub topic: String,
    /// Difficulty level of the question at the time of answering
    pub level: u32,
    /// Index the learner picked in presentation order
    pub selected_presented_index: usize,
    /// The same pick mapped back to canonical order
    pub selected_canonical_index: usize,
    /// Seconds spent on the question, never negative
    pub time_spent_secs: f64,
    pub is_correct: bool,
    pub answered_at: DateTime<Utc>,
}

/// Immediate feedback returned for every answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerFeedback {
    pub is_correct: bool,
    pub canonical_correct_index: usize,
    /// Where the correct option was shown to the learner
    pub presented_correct_index: usize,
    pub explanation: String,
}

/// Analytics record emitted once per answer, delivered best-effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub question_id: Uuid,
    pub selected_canonical_index: usize,
    pub is_correct: bool,
}

impl From<&AnswerEvent> for UsageRecord {
    fn from(event: &AnswerEvent) -> Self {
        Self {
            question_id: event.question_id,
            selected_canonical_index: event.selected_canonical_index,
            is_correct: event.is_correct,
        }
    }
}

/// Clamp a reported response time to a finite, non-negative number of seconds.
pub(crate) fn sanitize_time_spent(secs: f64) -> f64 {
    if secs.is_finite() { secs.max(0.0) } else { 0.0 }
}
