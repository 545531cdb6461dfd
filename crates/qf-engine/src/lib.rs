//! Adaptive assessment and progress scheduling engine for QuizForge
//!
//! This crate holds the scoring and scheduling core: answer shuffling,
//! level mastery for practice mode, the adaptive assessment controller,
//! skill scoring with tier classification, per-topic analysis with study
//! recommendations, and spaced repetition for weak topics.
//!
//! Everything here is synchronous and free of I/O. Callers own persistence
//! and drive sessions one answer at a time.

pub mod adaptive;
pub mod analysis;
pub mod config;
pub mod error;
pub mod mastery;
pub mod pool;
pub mod question;
pub mod schedule;
pub mod scoring;
pub mod shuffle;
pub mod store;

pub use adaptive::{AdaptiveConfig, AdaptiveSession, AssessmentSummary};
pub use analysis::{PerformanceAnalysis, StudyRecommendation, TopicPerformance};
pub use config::EngineConfig;
pub use error::EngineError;
pub use mastery::{LevelOutcome, MasteryConfig, MasteryProgress, MasterySession};
pub use pool::QuestionPool;
pub use question::{AnswerEvent, AnswerFeedback, Question, UsageRecord};
pub use schedule::{PracticeSchedule, SchedulerConfig, Urgency};
pub use scoring::{SkillTier, TierTable, calculate_skill_score};
pub use shuffle::{PresentedQuestion, QuestionView};
pub use store::{MemorySessionStore, SessionStore};
