use chrono::{DateTime, Utc};
use qf_engine::adaptive::AssessmentSummary;
use qf_engine::analysis::{StudyRecommendation, TopicPerformance};
use qf_engine::{MasteryProgress, PracticeSchedule, Question, TierTable, UsageRecord};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

/// Question row, options in canonical order
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuestionRow {
    pub id: Uuid,
    pub subject: String,
    pub topic: String,
    pub level: i32,
    pub text: String,
    pub options: Vec<String>,
    pub correct_index: i32,
    pub explanation: String,
    pub hint: Option<String>,
    pub concepts: Vec<String>,
}

impl From<QuestionRow> for Question {
    /// Out-of-range numbers map to values the engine rejects on validation.
    fn from(row: QuestionRow) -> Self {
        Self {
            id: row.id,
            topic: row.topic,
            level: u32::try_from(row.level).unwrap_or(0),
            text: row.text,
            options: row.options,
            correct_index: usize::try_from(row.correct_index).unwrap_or(usize::MAX),
            explanation: row.explanation,
            hint: row.hint,
            concepts: row.concepts,
        }
    }
}

impl QuestionRow {
    pub fn from_question(subject: impl Into<String>, question: &Question) -> Self {
        Self {
            id: question.id,
            subject: subject.into(),
            topic: question.topic.clone(),
            level: to_i32(question.level),
            text: question.text.clone(),
            options: question.options.clone(),
            correct_index: i32::try_from(question.correct_index).unwrap_or(i32::MAX),
            explanation: question.explanation.clone(),
            hint: question.hint.clone(),
            concepts: question.concepts.clone(),
        }
    }
}

/// Batch insert payload for `question_usage`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UsageLogInsert {
    pub question_id: Uuid,
    pub selected_index: i32,
    pub is_correct: bool,
}

impl From<UsageRecord> for UsageLogInsert {
    fn from(record: UsageRecord) -> Self {
        Self {
            question_id: record.question_id,
            selected_index: i32::try_from(record.selected_canonical_index).unwrap_or(i32::MAX),
            is_correct: record.is_correct,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MasteryProgressRow {
    pub level: i32,
    pub correct: i32,
    pub total: i32,
    pub mastered: bool,
}

impl From<MasteryProgressRow> for MasteryProgress {
    fn from(row: MasteryProgressRow) -> Self {
        Self {
            level: u32::try_from(row.level).unwrap_or(0),
            correct: u32::try_from(row.correct).unwrap_or(0),
            total: u32::try_from(row.total).unwrap_or(0),
            mastered: row.mastered,
        }
    }
}

impl From<MasteryProgress> for MasteryProgressRow {
    fn from(progress: MasteryProgress) -> Self {
        Self {
            level: to_i32(progress.level),
            correct: to_i32(progress.correct),
            total: to_i32(progress.total),
            mastered: progress.mastered,
        }
    }
}

/// Spaced repetition row, keyed by (user_id, subject, topic)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PracticeScheduleRow {
    pub user_id: Uuid,
    pub subject: String,
    pub topic: String,
    pub next_practice_at: DateTime<Utc>,
    pub interval_days: i32,
    pub ease_factor: f64,
    pub review_count: i32,
    pub last_practiced_at: Option<DateTime<Utc>>,
    pub last_performance: Option<f64>,
}

impl From<PracticeScheduleRow> for PracticeSchedule {
    fn from(row: PracticeScheduleRow) -> Self {
        Self {
            user_id: row.user_id,
            subject: row.subject,
            topic: row.topic,
            next_practice_at: row.next_practice_at,
            interval_days: u32::try_from(row.interval_days).unwrap_or(1).max(1),
            ease_factor: row.ease_factor,
            review_count: u32::try_from(row.review_count).unwrap_or(0),
            last_practiced_at: row.last_practiced_at,
            last_performance: row.last_performance,
        }
    }
}

impl From<&PracticeSchedule> for PracticeScheduleRow {
    fn from(schedule: &PracticeSchedule) -> Self {
        Self {
            user_id: schedule.user_id,
            subject: schedule.subject.clone(),
            topic: schedule.topic.clone(),
            next_practice_at: schedule.next_practice_at,
            interval_days: to_i32(schedule.interval_days),
            ease_factor: schedule.ease_factor,
            review_count: to_i32(schedule.review_count),
            last_practiced_at: schedule.last_practiced_at,
            last_performance: schedule.last_performance,
        }
    }
}

/// Stored result of a completed adaptive assessment
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AssessmentResultRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subject: String,
    pub topics: Vec<String>,
    pub final_score: i32,
    pub skill_tier: String,
    pub highest_level: i32,
    pub max_level: i32,
    pub total_questions: i32,
    pub total_correct: i32,
    pub avg_time_secs: f64,
    pub duration_seconds: i64,
    pub topic_performance: Json<Vec<TopicPerformance>>,
    pub recommendations: Json<Vec<StudyRecommendation>>,
    pub completed_at: DateTime<Utc>,
}

impl AssessmentResultRow {
    pub fn from_summary(
        id: Uuid,
        user_id: Uuid,
        summary: &AssessmentSummary,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            subject: summary.subject.clone(),
            topics: summary.topics.clone(),
            final_score: to_i32(summary.final_score),
            skill_tier: summary.skill_tier.id.clone(),
            highest_level: to_i32(summary.highest_level_reached),
            max_level: to_i32(summary.max_level),
            total_questions: to_i32(summary.total_questions),
            total_correct: to_i32(summary.total_correct),
            avg_time_secs: summary.avg_time_secs,
            duration_seconds: summary.duration_seconds,
            topic_performance: Json(summary.topic_performance.clone()),
            recommendations: Json(summary.recommendations.clone()),
            completed_at,
        }
    }
}

impl AssessmentResultRow {
    /// Rebuild the summary; the tier is looked up again from the stored score.
    pub fn into_summary(self, tiers: &TierTable) -> AssessmentSummary {
        let final_score = u32::try_from(self.final_score).unwrap_or(0);
        AssessmentSummary {
            subject: self.subject,
            topics: self.topics,
            final_score,
            skill_tier: tiers.classify(final_score).clone(),
            highest_level_reached: u32::try_from(self.highest_level).unwrap_or(0),
            max_level: u32::try_from(self.max_level).unwrap_or(0),
            total_questions: u32::try_from(self.total_questions).unwrap_or(0),
            total_correct: u32::try_from(self.total_correct).unwrap_or(0),
            avg_time_secs: self.avg_time_secs,
            duration_seconds: self.duration_seconds,
            topic_performance: self.topic_performance.0,
            recommendations: self.recommendations.0,
        }
    }
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
