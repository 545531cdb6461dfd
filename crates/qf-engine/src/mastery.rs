//! Practice-mode level mastery.
//!
//! A learner works through one topic level by level. After `per_level`
//! answers at a level the round is scored: reaching `threshold` accuracy
//! masters the level and moves on, anything less restarts the round at the
//! same level with a fresh draw. A failed round is a normal outcome, not an
//! error.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;
use crate::pool::QuestionPool;
use crate::question::{AnswerEvent, AnswerFeedback, Question, UsageRecord};
use crate::shuffle::{PresentedQuestion, present_with};

/// Level mastery parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasteryConfig {
    /// Answers needed before a level is scored
    pub per_level: u32,
    /// Accuracy (0.0-1.0) needed to master a level
    pub threshold: f64,
}

impl Default for MasteryConfig {
    fn default() -> Self {
        Self {
            per_level: 5,
            threshold: 0.9,
        }
    }
}

impl MasteryConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.per_level == 0 {
            return Err(EngineError::InvalidConfig(
                "mastery per_level must be at least 1".to_string(),
            ));
        }
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(EngineError::InvalidConfig(format!(
                "mastery threshold must be in (0, 1], got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

/// Progress on one level of one topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasteryProgress {
    pub level: u32,
    /// Correct answers in the current round
    pub correct: u32,
    /// Answers in the current round
    pub total: u32,
    /// Sticky until the topic is reset
    pub mastered: bool,
}

impl MasteryProgress {
    pub const fn new(level: u32) -> Self {
        Self {
            level,
            correct: 0,
            total: 0,
            mastered: false,
        }
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.correct, self.total)
    }

    fn reset_round(&mut self) {
        self.correct = 0;
        self.total = 0;
    }
}

/// Result of scoring the current round after an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LevelOutcome {
    /// Not enough answers yet to decide
    Continue { answered: u32, required: u32 },
    /// Level mastered, moving on
    Passed { level: u32, next_level: u32 },
    /// Round below threshold, retrying the same level
    Failed { level: u32 },
    /// Last level mastered; practice continues at that level
    TopicMastered { level: u32 },
}

impl LevelOutcome {
    /// `{level, passed}` for a decided round, `None` while undecided.
    pub const fn summary(&self) -> Option<PracticeSummary> {
        match *self {
            Self::Continue { .. } => None,
            Self::Passed { level, .. } | Self::TopicMastered { level } => Some(PracticeSummary {
                level,
                passed: true,
            }),
            Self::Failed { level } => Some(PracticeSummary {
                level,
                passed: false,
            }),
        }
    }
}

/// End-of-round report for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeSummary {
    pub level: u32,
    pub passed: bool,
}

/// Everything produced by one submitted practice answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasteryAnswer {
    pub event: AnswerEvent,
    pub feedback: AnswerFeedback,
    pub usage: UsageRecord,
    pub outcome: LevelOutcome,
}

/// Practice session over a single topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterySession {
    topic: String,
    config: MasteryConfig,
    pool: QuestionPool,
    max_level: u32,
    current_level: u32,
    levels: BTreeMap<u32, MasteryProgress>,
    answered_correctly: HashSet<Uuid>,
    revealed: HashSet<Uuid>,
    current: Option<PresentedQuestion>,
    last_question: Option<Uuid>,
    history: Vec<AnswerEvent>,
}

impl MasterySession {
    /// Start practicing `topic`, resuming from previously saved progress.
    ///
    /// The session starts at the lowest level that has questions and is not
    /// yet mastered. When every such level is mastered it starts at the top
    /// level.
    pub fn new(
        topic: impl Into<String>,
        pool: &QuestionPool,
        config: MasteryConfig,
        saved: impl IntoIterator<Item = MasteryProgress>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let topic = topic.into();
        let max_level = pool
            .max_level(&topic)
            .ok_or_else(|| EngineError::NoQuestionsAvailable {
                topic: topic.clone(),
                level: 1,
            })?;

        let mut levels = BTreeMap::new();
        for progress in saved {
            if (1..=max_level).contains(&progress.level) {
                let mut progress = progress;
                progress.reset_round();
                levels.insert(progress.level, progress);
            }
        }

        let current_level = pool
            .levels(&topic)
            .into_iter()
            .find(|level| !levels.get(level).is_some_and(|p| p.mastered))
            .unwrap_or(max_level);

        let pool = pool.restrict(&[topic.as_str()]);

        Ok(Self {
            topic,
            config,
            pool,
            max_level,
            current_level,
            levels,
            answered_correctly: HashSet::new(),
            revealed: HashSet::new(),
            current: None,
            last_question: None,
            history: Vec::new(),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub const fn current_level(&self) -> u32 {
        self.current_level
    }

    pub const fn max_level(&self) -> u32 {
        self.max_level
    }

    pub const fn current_question(&self) -> Option<&PresentedQuestion> {
        self.current.as_ref()
    }

    pub fn history(&self) -> &[AnswerEvent] {
        &self.history
    }

    pub fn is_topic_mastered(&self) -> bool {
        (1..=self.max_level).all(|level| {
            !self.level_has_questions(level)
                || self.levels.get(&level).is_some_and(|p| p.mastered)
        })
    }

    /// Progress of the current level round.
    pub fn current_progress(&self) -> MasteryProgress {
        self.levels
            .get(&self.current_level)
            .copied()
            .unwrap_or_else(|| MasteryProgress::new(self.current_level))
    }

    /// Snapshot of every level touched so far, ordered by level.
    pub fn progress(&self) -> Vec<MasteryProgress> {
        self.levels.values().copied().collect()
    }

    /// Accuracy over every answer in this session, as a percentage.
    pub fn session_accuracy(&self) -> f64 {
        let correct = self.history.iter().filter(|e| e.is_correct).count();
        ratio(correct as u32, self.history.len() as u32) * 100.0
    }

    /// Draw the next question at the current level using the thread RNG.
    pub fn next_question(&mut self) -> Result<&PresentedQuestion, EngineError> {
        self.next_question_with(&mut rand::thread_rng())
    }

    /// Draw the next question at the current level.
    ///
    /// Questions already answered correctly or whose solution was revealed
    /// are skipped. When that leaves nothing, the whole level is eligible
    /// again so practice never runs dry.
    pub fn next_question_with<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
    ) -> Result<&PresentedQuestion, EngineError> {
        let level_pool = self.pool.level_questions(&self.topic, self.current_level);
        if level_pool.is_empty() {
            return Err(EngineError::NoQuestionsAvailable {
                topic: self.topic.clone(),
                level: self.current_level,
            });
        }

        let fresh: Vec<&Question> = level_pool
            .iter()
            .filter(|q| !self.answered_correctly.contains(&q.id) && !self.revealed.contains(&q.id))
            .collect();
        let mut candidates = if fresh.is_empty() {
            tracing::debug!(
                topic = %self.topic,
                level = self.current_level,
                "level exhausted, falling back to full pool"
            );
            level_pool.iter().collect()
        } else {
            fresh
        };

        if candidates.len() > 1 {
            if let Some(last) = self.last_question {
                candidates.retain(|q| q.id != last);
            }
        }

        let question = candidates
            .choose(rng)
            .copied()
            .ok_or_else(|| EngineError::NoQuestionsAvailable {
                topic: self.topic.clone(),
                level: self.current_level,
            })?;

        self.last_question = Some(question.id);
        Ok(self.current.insert(present_with(question, rng)))
    }

    /// Answer the question currently on screen.
    pub fn submit(
        &mut self,
        selected_presented_index: usize,
        time_spent_secs: f64,
        now: DateTime<Utc>,
    ) -> Result<MasteryAnswer, EngineError> {
        let presented = self.current.as_ref().ok_or(EngineError::NoActiveQuestion)?;
        let (event, feedback) = presented.answer(selected_presented_index, time_spent_secs, now)?;
        self.current = None;

        if event.is_correct {
            self.answered_correctly.insert(event.question_id);
        }

        let level = self.current_level;
        let progress = self
            .levels
            .entry(level)
            .or_insert_with(|| MasteryProgress::new(level));
        progress.total += 1;
        if event.is_correct {
            progress.correct += 1;
        }

        let outcome = self.evaluate_round();
        self.history.push(event.clone());

        Ok(MasteryAnswer {
            usage: UsageRecord::from(&event),
            event,
            feedback,
            outcome,
        })
    }

    /// Mark a question's solution as revealed so it is not drawn again.
    pub fn reveal(&mut self, question_id: Uuid) -> Result<&Question, EngineError> {
        let question = self
            .pool
            .find(question_id)
            .ok_or(EngineError::UnknownQuestion(question_id))?;
        self.revealed.insert(question_id);
        Ok(question)
    }

    /// Forget all progress on this topic and start over at level 1.
    pub fn reset_topic(&mut self) {
        tracing::info!(topic = %self.topic, "resetting topic progress");
        self.levels.clear();
        self.answered_correctly.clear();
        self.revealed.clear();
        self.current = None;
        self.last_question = None;
        self.current_level = self.first_level();
    }

    fn evaluate_round(&mut self) -> LevelOutcome {
        let level = self.current_level;
        let required = self.config.per_level;
        let threshold = self.config.threshold;
        let Some(progress) = self.levels.get_mut(&level) else {
            return LevelOutcome::Continue {
                answered: 0,
                required,
            };
        };

        if progress.total < required {
            return LevelOutcome::Continue {
                answered: progress.total,
                required,
            };
        }

        let accuracy = progress.accuracy();
        progress.reset_round();

        if accuracy < threshold {
            tracing::info!(topic = %self.topic, level, accuracy, "level failed, retrying");
            self.last_question = None;
            return LevelOutcome::Failed { level };
        }

        progress.mastered = true;
        match self.next_level_after(level) {
            Some(next_level) => {
                tracing::info!(topic = %self.topic, level, next_level, accuracy, "level passed");
                self.current_level = next_level;
                self.levels
                    .entry(next_level)
                    .and_modify(MasteryProgress::reset_round)
                    .or_insert_with(|| MasteryProgress::new(next_level));
                LevelOutcome::Passed { level, next_level }
            }
            None => {
                tracing::info!(topic = %self.topic, level, accuracy, "topic mastered");
                LevelOutcome::TopicMastered { level }
            }
        }
    }

    /// Next level above `level` that has questions, capped at the top level.
    fn next_level_after(&self, level: u32) -> Option<u32> {
        (level + 1..=self.max_level).find(|&l| self.level_has_questions(l))
    }

    fn first_level(&self) -> u32 {
        (1..=self.max_level)
            .find(|&l| self.level_has_questions(l))
            .unwrap_or(1)
    }

    fn level_has_questions(&self, level: u32) -> bool {
        !self.pool.level_questions(&self.topic, level).is_empty()
    }
}

fn ratio(numerator: u32, denominator: u32) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        f64::from(numerator) / f64::from(denominator)
    }
}
