//! Adaptive skill assessment.
//!
//! A fixed-length assessment that moves the difficulty level up after a run
//! of correct answers and down after a couple of misses, so it converges on
//! the learner's level within the question budget. The assessment always
//! ends after exactly `max_questions` answers.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::{PerformanceAnalysis, StudyRecommendation, TopicPerformance};
use crate::error::EngineError;
use crate::pool::QuestionPool;
use crate::question::{AnswerEvent, AnswerFeedback, Question, UsageRecord};
use crate::scoring::{SkillInputs, SkillTier, TierTable, calculate_skill_score};
use crate::shuffle::{PresentedQuestion, present_with};

/// Tuning for the level controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveConfig {
    /// Correct answers at a level needed to move up
    pub questions_to_advance: u32,
    /// Wrong answers at a level that move the learner down
    pub questions_to_stay: u32,
    /// Answers needed at a level before moving up
    pub min_questions_per_level: u32,
    /// Length of the assessment
    pub max_questions: u32,
    pub start_level: u32,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            questions_to_advance: 3,
            questions_to_stay: 2,
            min_questions_per_level: 3,
            max_questions: 20,
            start_level: 3,
        }
    }
}

impl AdaptiveConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        let fields = [
            ("questions_to_advance", self.questions_to_advance),
            ("questions_to_stay", self.questions_to_stay),
            ("min_questions_per_level", self.min_questions_per_level),
            ("max_questions", self.max_questions),
            ("start_level", self.start_level),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(EngineError::InvalidConfig(format!(
                    "adaptive {name} must be at least 1"
                )));
            }
        }
        Ok(())
    }
}

/// Mutable state of one assessment. Frozen once `is_complete` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveState {
    pub is_active: bool,
    pub current_level: u32,
    pub highest_level_reached: u32,
    pub questions_at_current_level: u32,
    pub correct_at_current_level: u32,
    pub total_questions: u32,
    pub total_correct: u32,
    pub total_time_secs: f64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub subject: String,
    pub topics: Vec<String>,
    pub is_complete: bool,
    pub final_score: Option<u32>,
    pub skill_tier: Option<String>,
}

/// How the level moved after an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum LevelChange {
    Stayed { level: u32 },
    Advanced { from: u32, to: u32 },
    /// Earned a level up but no higher level has questions
    Capped { level: u32 },
    Dropped { from: u32, to: u32 },
    /// Earned a level down but no lower level has questions
    Floored { level: u32 },
}

/// Everything produced by one submitted assessment answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveAnswer {
    pub event: AnswerEvent,
    pub feedback: AnswerFeedback,
    pub usage: UsageRecord,
    pub level_change: LevelChange,
    pub questions_remaining: u32,
    pub is_complete: bool,
}

/// Final report of a completed assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentSummary {
    pub subject: String,
    pub topics: Vec<String>,
    pub final_score: u32,
    pub skill_tier: SkillTier,
    pub highest_level_reached: u32,
    pub max_level: u32,
    pub total_questions: u32,
    pub total_correct: u32,
    pub avg_time_secs: f64,
    pub duration_seconds: i64,
    pub topic_performance: Vec<TopicPerformance>,
    pub recommendations: Vec<StudyRecommendation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveSession {
    state: AdaptiveState,
    config: AdaptiveConfig,
    tiers: TierTable,
    pool: QuestionPool,
    max_level: u32,
    /// Levels with questions, ascending
    levels: Vec<u32>,
    asked: HashSet<Uuid>,
    current: Option<PresentedQuestion>,
    history: Vec<AnswerEvent>,
}

impl AdaptiveSession {
    /// Start an assessment over `topics` of the pool's subject.
    pub fn start(
        pool: &QuestionPool,
        topics: Vec<String>,
        config: AdaptiveConfig,
        tiers: TierTable,
        now: DateTime<Utc>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let max_level =
            pool.max_level_for(&topics)
                .ok_or_else(|| EngineError::NoQuestionsAvailable {
                    topic: topics.join(", "),
                    level: config.start_level,
                })?;
        let levels = pool.levels_for(&topics);
        let start_level = levels
            .iter()
            .rev()
            .find(|&&level| level <= config.start_level)
            .or_else(|| levels.first())
            .copied()
            .unwrap_or(max_level);

        tracing::debug!(
            subject = pool.subject(),
            topics = ?topics,
            start_level,
            max_level,
            "starting adaptive assessment"
        );

        Ok(Self {
            state: AdaptiveState {
                is_active: true,
                current_level: start_level,
                highest_level_reached: start_level,
                questions_at_current_level: 0,
                correct_at_current_level: 0,
                total_questions: 0,
                total_correct: 0,
                total_time_secs: 0.0,
                started_at: now,
                ended_at: None,
                subject: pool.subject().to_string(),
                topics: topics.clone(),
                is_complete: false,
                final_score: None,
                skill_tier: None,
            },
            config,
            tiers,
            pool: pool.restrict(&topics),
            max_level,
            levels,
            asked: HashSet::new(),
            current: None,
            history: Vec::new(),
        })
    }

    pub const fn state(&self) -> &AdaptiveState {
        &self.state
    }

    pub const fn config(&self) -> &AdaptiveConfig {
        &self.config
    }

    pub const fn max_level(&self) -> u32 {
        self.max_level
    }

    pub const fn is_complete(&self) -> bool {
        self.state.is_complete
    }

    pub const fn current_question(&self) -> Option<&PresentedQuestion> {
        self.current.as_ref()
    }

    pub fn history(&self) -> &[AnswerEvent] {
        &self.history
    }

    pub const fn questions_remaining(&self) -> u32 {
        self.config
            .max_questions
            .saturating_sub(self.state.total_questions)
    }

    pub fn next_question(&mut self) -> Result<&PresentedQuestion, EngineError> {
        self.next_question_with(&mut rand::thread_rng())
    }

    /// Draw a question at the current level, preferring ones not yet asked.
    pub fn next_question_with<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
    ) -> Result<&PresentedQuestion, EngineError> {
        if self.state.is_complete {
            return Err(EngineError::SessionComplete);
        }

        let level = self.state.current_level;
        let at_level = self.pool.questions_at_level(&self.state.topics, level);
        let unasked: Vec<&Question> = at_level
            .iter()
            .copied()
            .filter(|q| !self.asked.contains(&q.id))
            .collect();
        let candidates = if unasked.is_empty() { at_level } else { unasked };

        let question = candidates.choose(rng).copied().ok_or_else(|| {
            EngineError::NoQuestionsAvailable {
                topic: self.state.topics.join(", "),
                level,
            }
        })?;

        Ok(self.current.insert(present_with(question, rng)))
    }

    /// Answer the question currently on screen and move the level.
    pub fn submit(
        &mut self,
        selected_presented_index: usize,
        time_spent_secs: f64,
        now: DateTime<Utc>,
    ) -> Result<AdaptiveAnswer, EngineError> {
        if self.state.is_complete {
            return Err(EngineError::SessionComplete);
        }
        let presented = self.current.as_ref().ok_or(EngineError::NoActiveQuestion)?;
        let (event, feedback) = presented.answer(selected_presented_index, time_spent_secs, now)?;
        self.current = None;
        self.asked.insert(event.question_id);

        let state = &mut self.state;
        state.questions_at_current_level += 1;
        state.total_questions += 1;
        state.total_time_secs += event.time_spent_secs;
        if event.is_correct {
            state.correct_at_current_level += 1;
            state.total_correct += 1;
        }
        state.highest_level_reached = state.highest_level_reached.max(state.current_level);

        let level_change = self.apply_level_rules();
        self.state.highest_level_reached = self
            .state
            .highest_level_reached
            .max(self.state.current_level);

        self.history.push(event.clone());

        if self.state.total_questions >= self.config.max_questions {
            self.complete(now);
        }

        Ok(AdaptiveAnswer {
            usage: UsageRecord::from(&event),
            event,
            feedback,
            level_change,
            questions_remaining: self.questions_remaining(),
            is_complete: self.state.is_complete,
        })
    }

    fn apply_level_rules(&mut self) -> LevelChange {
        let state = &mut self.state;
        let level = state.current_level;
        let wrong = state.questions_at_current_level - state.correct_at_current_level;

        let change = if state.correct_at_current_level >= self.config.questions_to_advance
            && state.questions_at_current_level >= self.config.min_questions_per_level
        {
            match self.levels.iter().find(|&&l| l > level) {
                Some(&to) => {
                    state.current_level = to;
                    LevelChange::Advanced { from: level, to }
                }
                None => LevelChange::Capped { level },
            }
        } else if wrong >= self.config.questions_to_stay {
            match self.levels.iter().rev().find(|&&l| l < level) {
                Some(&to) => {
                    state.current_level = to;
                    LevelChange::Dropped { from: level, to }
                }
                None => LevelChange::Floored { level },
            }
        } else {
            return LevelChange::Stayed { level };
        };

        state.questions_at_current_level = 0;
        state.correct_at_current_level = 0;
        tracing::debug!(?change, "adaptive level change");
        change
    }

    fn complete(&mut self, now: DateTime<Utc>) {
        let inputs = self.skill_inputs();
        let score = calculate_skill_score(&inputs);
        let tier = self.tiers.classify(score);

        let state = &mut self.state;
        state.is_complete = true;
        state.is_active = false;
        state.ended_at = Some(now);
        state.final_score = Some(score);
        state.skill_tier = Some(tier.id.clone());

        tracing::info!(
            subject = %state.subject,
            score,
            tier = %tier.id,
            highest_level = state.highest_level_reached,
            correct = state.total_correct,
            total = state.total_questions,
            "adaptive assessment complete"
        );
    }

    fn skill_inputs(&self) -> SkillInputs {
        let state = &self.state;
        let avg_time_per_question = if state.total_questions == 0 {
            0.0
        } else {
            state.total_time_secs / f64::from(state.total_questions)
        };
        SkillInputs {
            highest_level: state.highest_level_reached,
            max_level: self.max_level,
            total_correct: state.total_correct,
            total_questions: state.total_questions,
            avg_time_per_question,
        }
    }

    /// Final report, available once the assessment is complete.
    pub fn summary(&self) -> Option<AssessmentSummary> {
        let state = &self.state;
        let (true, Some(final_score), Some(ended_at)) =
            (state.is_complete, state.final_score, state.ended_at)
        else {
            return None;
        };

        let analysis = PerformanceAnalysis::from_events(&self.history);
        let recommendations = analysis.recommendations();
        let inputs = self.skill_inputs();

        Some(AssessmentSummary {
            subject: state.subject.clone(),
            topics: state.topics.clone(),
            final_score,
            skill_tier: self.tiers.classify(final_score).clone(),
            highest_level_reached: state.highest_level_reached,
            max_level: self.max_level,
            total_questions: state.total_questions,
            total_correct: state.total_correct,
            avg_time_secs: inputs.avg_time_per_question,
            duration_seconds: (ended_at - state.started_at).num_seconds().max(0),
            topic_performance: analysis.topics,
            recommendations,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::question::fixtures::question;

    fn pool(max_level: u32) -> QuestionPool {
        let questions = (1..=max_level).flat_map(|level| {
            (0..6).flat_map(move |i| {
                [
                    question("algebra", level, i % 4),
                    question("geometry", level, (i + 1) % 4),
                ]
            })
        });
        QuestionPool::from_questions("math", questions).unwrap()
    }

    fn start(config: AdaptiveConfig) -> AdaptiveSession {
        AdaptiveSession::start(
            &pool(5),
            vec!["algebra".to_string(), "geometry".to_string()],
            config,
            TierTable::default(),
            Utc::now(),
        )
        .unwrap()
    }

    fn answer(s: &mut AdaptiveSession, rng: &mut StdRng, correct: bool) -> AdaptiveAnswer {
        let presented = s.next_question_with(rng).unwrap();
        let right = presented.presented_correct_index();
        let pick = if correct { right } else { (right + 1) % 4 };
        s.submit(pick, 5.0, Utc::now()).unwrap()
    }

    #[test]
    fn test_three_correct_advances_exactly_one_level() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut s = start(AdaptiveConfig::default());
        assert_eq!(s.state().current_level, 3);

        assert_eq!(answer(&mut s, &mut rng, true).level_change, LevelChange::Stayed { level: 3 });
        assert_eq!(answer(&mut s, &mut rng, true).level_change, LevelChange::Stayed { level: 3 });
        assert_eq!(
            answer(&mut s, &mut rng, true).level_change,
            LevelChange::Advanced { from: 3, to: 4 }
        );
        assert_eq!(s.state().current_level, 4);
        assert_eq!(s.state().questions_at_current_level, 0);
        assert_eq!(s.state().highest_level_reached, 4);
    }

    #[test]
    fn test_min_questions_per_level_gates_advance() {
        let config = AdaptiveConfig {
            min_questions_per_level: 4,
            ..AdaptiveConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(2);
        let mut s = start(config);
        for _ in 0..3 {
            answer(&mut s, &mut rng, true);
        }
        assert_eq!(s.state().current_level, 3);
        assert_eq!(
            answer(&mut s, &mut rng, true).level_change,
            LevelChange::Advanced { from: 3, to: 4 }
        );
    }

    #[test]
    fn test_two_wrong_drops_a_level() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut s = start(AdaptiveConfig::default());
        answer(&mut s, &mut rng, false);
        answer(&mut s, &mut rng, true);
        assert_eq!(
            answer(&mut s, &mut rng, false).level_change,
            LevelChange::Dropped { from: 3, to: 2 }
        );
        assert_eq!(s.state().highest_level_reached, 3);
    }

    #[test]
    fn test_level_floors_at_one() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut s = start(AdaptiveConfig::default());
        let mut changes = vec![];
        for _ in 0..6 {
            changes.push(answer(&mut s, &mut rng, false).level_change);
        }
        assert_eq!(changes[1], LevelChange::Dropped { from: 3, to: 2 });
        assert_eq!(changes[3], LevelChange::Dropped { from: 2, to: 1 });
        assert_eq!(changes[5], LevelChange::Floored { level: 1 });
        assert_eq!(s.state().current_level, 1);
    }

    #[test]
    fn test_level_caps_at_max() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut s = start(AdaptiveConfig::default());
        let mut changes = vec![];
        for _ in 0..9 {
            changes.push(answer(&mut s, &mut rng, true).level_change);
        }
        assert_eq!(changes[5], LevelChange::Advanced { from: 4, to: 5 });
        assert_eq!(changes[8], LevelChange::Capped { level: 5 });
        assert_eq!(s.state().current_level, 5);
    }

    #[test]
    fn test_completes_after_max_questions() {
        let mut rng = StdRng::seed_from_u64(6);
        let mut s = start(AdaptiveConfig::default());
        for i in 0..20 {
            let a = answer(&mut s, &mut rng, i % 3 != 0);
            assert_eq!(a.is_complete, i == 19);
            assert_eq!(a.questions_remaining, 19 - i);
        }
        assert!(s.is_complete());
        assert!(!s.state().is_active);
        assert_eq!(s.state().total_questions, 20);
        assert_eq!(s.next_question_with(&mut rng).unwrap_err(), EngineError::SessionComplete);
        assert_eq!(
            s.submit(0, 1.0, Utc::now()).unwrap_err(),
            EngineError::SessionComplete
        );
    }

    #[test]
    fn test_summary_only_when_complete() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut s = start(AdaptiveConfig {
            max_questions: 4,
            ..AdaptiveConfig::default()
        });
        answer(&mut s, &mut rng, true);
        assert!(s.summary().is_none());
        for _ in 0..3 {
            answer(&mut s, &mut rng, false);
        }
        let summary = s.summary().unwrap();
        assert_eq!(summary.total_questions, 4);
        assert_eq!(summary.total_correct, 1);
        assert_eq!(summary.final_score, s.state().final_score.unwrap());
        assert_eq!(Some(summary.skill_tier.id.clone()), s.state().skill_tier);
        assert!(!summary.topic_performance.is_empty());
        assert!(!summary.recommendations.is_empty());
    }

    #[test]
    fn test_duration_from_timestamps() {
        let started = Utc::now();
        let mut s = AdaptiveSession::start(
            &pool(3),
            vec!["algebra".to_string()],
            AdaptiveConfig {
                max_questions: 1,
                ..AdaptiveConfig::default()
            },
            TierTable::default(),
            started,
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(8);
        s.next_question_with(&mut rng).unwrap();
        s.submit(0, 3.0, started + Duration::seconds(95)).unwrap();
        assert_eq!(s.summary().unwrap().duration_seconds, 95);
    }

    #[test]
    fn test_start_level_clamped_to_pool() {
        let s = AdaptiveSession::start(
            &pool(2),
            vec!["algebra".to_string()],
            AdaptiveConfig::default(),
            TierTable::default(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(s.state().current_level, 2);
        assert_eq!(s.max_level(), 2);
    }

    #[test]
    fn test_unknown_topics_fail_to_start() {
        let err = AdaptiveSession::start(
            &pool(3),
            vec!["poetry".to_string()],
            AdaptiveConfig::default(),
            TierTable::default(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::NoQuestionsAvailable { .. }));
    }

    #[test]
    fn test_does_not_repeat_while_unasked_remain() {
        let mut rng = StdRng::seed_from_u64(9);
        // thresholds out of reach so the level never moves
        let mut s = start(AdaptiveConfig {
            questions_to_advance: 100,
            questions_to_stay: 100,
            ..AdaptiveConfig::default()
        });
        let mut seen = HashSet::new();
        for _ in 0..12 {
            let a = answer(&mut s, &mut rng, true);
            assert!(seen.insert(a.event.question_id));
        }
        // level 3 has 12 questions, the 13th must repeat
        let a = answer(&mut s, &mut rng, true);
        assert!(seen.contains(&a.event.question_id));
    }

    fn gapped(levels: &[u32], start_level: u32) -> AdaptiveSession {
        let questions = levels
            .iter()
            .flat_map(|&level| (0..6).map(move |i| question("algebra", level, i % 4)));
        AdaptiveSession::start(
            &QuestionPool::from_questions("math", questions).unwrap(),
            vec!["algebra".to_string()],
            AdaptiveConfig {
                start_level,
                ..AdaptiveConfig::default()
            },
            TierTable::default(),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_advance_skips_empty_level() {
        let mut rng = StdRng::seed_from_u64(10);
        let mut s = gapped(&[1, 2, 3, 5], 3);
        let mut changes = vec![];
        for _ in 0..6 {
            changes.push(answer(&mut s, &mut rng, true).level_change);
        }
        assert_eq!(changes[2], LevelChange::Advanced { from: 3, to: 5 });
        assert_eq!(changes[5], LevelChange::Capped { level: 5 });
        assert_eq!(s.state().highest_level_reached, 5);
    }

    #[test]
    fn test_drop_skips_empty_level() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut s = gapped(&[1, 3, 4], 3);
        answer(&mut s, &mut rng, false);
        assert_eq!(
            answer(&mut s, &mut rng, false).level_change,
            LevelChange::Dropped { from: 3, to: 1 }
        );
        assert_eq!(s.state().current_level, 1);
    }

    #[test]
    fn test_gapped_pool_still_completes() {
        let mut rng = StdRng::seed_from_u64(12);
        let mut s = gapped(&[2, 5], 3);
        assert_eq!(s.state().current_level, 2);
        for i in 0..20 {
            answer(&mut s, &mut rng, i % 4 != 3);
        }
        assert!(s.is_complete());
        assert!(s.summary().is_some());
    }

    #[test]
    fn test_lowest_level_floors_without_level_one() {
        let mut rng = StdRng::seed_from_u64(13);
        let mut s = gapped(&[2, 3], 1);
        assert_eq!(s.state().current_level, 2);
        answer(&mut s, &mut rng, false);
        assert_eq!(
            answer(&mut s, &mut rng, false).level_change,
            LevelChange::Floored { level: 2 }
        );
    }

    #[test]
    fn test_submit_without_question() {
        let mut s = start(AdaptiveConfig::default());
        assert_eq!(
            s.submit(0, 1.0, Utc::now()).unwrap_err(),
            EngineError::NoActiveQuestion
        );
    }

    #[test]
    fn test_invalid_config() {
        let err = AdaptiveSession::start(
            &pool(3),
            vec!["algebra".to_string()],
            AdaptiveConfig {
                max_questions: 0,
                ..AdaptiveConfig::default()
            },
            TierTable::default(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }
}
