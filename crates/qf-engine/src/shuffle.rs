//! Answer shuffling.
//!
//! Every presentation of a question gets a fresh uniform permutation of its
//! options so the position of the correct answer cannot be memorized. The
//! permutation is kept next to the question so answers map back to the
//! canonical order in O(1).

use chrono::{DateTime, Utc};
use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;
use crate::question::{AnswerEvent, AnswerFeedback, Question, sanitize_time_spent};

/// A question together with the order its options are shown in.
///
/// `shuffle_map[presented_index] == canonical_index`. Deserializing checks
/// that the map is a permutation of the question's options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredPresentation")]
pub struct PresentedQuestion {
    pub question: Question,
    shuffle_map: Vec<usize>,
    #[serde(skip_serializing)]
    presented_correct_index: usize,
}

#[derive(Deserialize)]
struct StoredPresentation {
    question: Question,
    shuffle_map: Vec<usize>,
}

impl TryFrom<StoredPresentation> for PresentedQuestion {
    type Error = EngineError;

    fn try_from(stored: StoredPresentation) -> Result<Self, Self::Error> {
        let StoredPresentation {
            question,
            shuffle_map,
        } = stored;
        Self::with_map(question, shuffle_map)
    }
}

/// What the learner gets to see: no correct index, options already shuffled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionView {
    pub id: Uuid,
    pub topic: String,
    pub level: u32,
    pub text: String,
    pub options: Vec<String>,
    pub hint: Option<String>,
}

/// Present a question with a permutation drawn from the thread-local RNG.
pub fn present(question: &Question) -> PresentedQuestion {
    present_with(question, &mut rand::thread_rng())
}

/// Present a question with a permutation drawn from `rng`.
///
/// Uses `SliceRandom::shuffle`, a Fisher-Yates shuffle, so every
/// permutation is equally likely.
pub fn present_with<R: Rng + ?Sized>(question: &Question, rng: &mut R) -> PresentedQuestion {
    let mut shuffle_map: Vec<usize> = (0..question.options.len()).collect();
    shuffle_map.shuffle(rng);

    let presented_correct_index = shuffle_map
        .iter()
        .position(|&canonical| canonical == question.correct_index)
        .unwrap_or_default();

    PresentedQuestion {
        question: question.clone(),
        shuffle_map,
        presented_correct_index,
    }
}

fn is_permutation(map: &[usize]) -> bool {
    let mut sorted = map.to_vec();
    sorted.sort_unstable();
    sorted.iter().copied().eq(0..map.len())
}

/// Whether `presented_index` points at the correct option.
///
/// Out-of-range indexes are never correct.
pub fn resolve(presented_index: usize, shuffle_map: &[usize], correct_index: usize) -> bool {
    shuffle_map.get(presented_index) == Some(&correct_index)
}

impl PresentedQuestion {
    /// Rebuild a presentation from a known permutation.
    pub fn with_map(question: Question, shuffle_map: Vec<usize>) -> Result<Self, EngineError> {
        if shuffle_map.len() != question.options.len() || !is_permutation(&shuffle_map) {
            return Err(EngineError::InvalidQuestion {
                id: question.id,
                reason: format!(
                    "shuffle map {shuffle_map:?} is not a permutation of {} options",
                    question.options.len()
                ),
            });
        }
        let presented_correct_index = shuffle_map
            .iter()
            .position(|&canonical| canonical == question.correct_index)
            .ok_or_else(|| EngineError::InvalidQuestion {
                id: question.id,
                reason: "correct option missing from shuffle map".to_string(),
            })?;

        Ok(Self {
            question,
            shuffle_map,
            presented_correct_index,
        })
    }

    pub fn shuffle_map(&self) -> &[usize] {
        &self.shuffle_map
    }

    pub const fn presented_correct_index(&self) -> usize {
        self.presented_correct_index
    }

    /// Map a presented index back to the canonical option index.
    pub fn canonical_index(&self, presented_index: usize) -> Option<usize> {
        self.shuffle_map.get(presented_index).copied()
    }

    pub fn view(&self) -> QuestionView {
        QuestionView {
            id: self.question.id,
            topic: self.question.topic.clone(),
            level: self.question.level,
            text: self.question.text.clone(),
            options: self
                .shuffle_map
                .iter()
                .filter_map(|&canonical| self.question.options.get(canonical).cloned())
                .collect(),
            hint: self.question.hint.clone(),
        }
    }

    /// Turn a selection into an immutable answer event and its feedback.
    pub fn answer(
        &self,
        selected_presented_index: usize,
        time_spent_secs: f64,
        now: DateTime<Utc>,
    ) -> Result<(AnswerEvent, AnswerFeedback), EngineError> {
        let selected_canonical_index =
            self.canonical_index(selected_presented_index)
                .ok_or(EngineError::InvalidSelection {
                    selected: selected_presented_index,
                    options: self.shuffle_map.len(),
                })?;

        let is_correct = resolve(
            selected_presented_index,
            &self.shuffle_map,
            self.question.correct_index,
        );

        let event = AnswerEvent {
            question_id: self.question.id,
            topic: self.question.topic.clone(),
            level: self.question.level,
            selected_presented_index,
            selected_canonical_index,
            time_spent_secs: sanitize_time_spent(time_spent_secs),
            is_correct,
            answered_at: now,
        };

        let feedback = AnswerFeedback {
            is_correct,
            canonical_correct_index: self.question.correct_index,
            presented_correct_index: self.presented_correct_index,
            explanation: self.question.explanation.clone(),
        };

        Ok((event, feedback))
    }
}
