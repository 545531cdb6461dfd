//! In-flight sessions held by the API between requests.

use chrono::{DateTime, Duration, Utc};
use qf_db::{
    models::AssessmentResultRow,
    repositories::{assessment, question},
};
use qf_engine::{AdaptiveSession, MasterySession, Question, QuestionPool, SessionStore};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::{error::ApiError, state::ApiState};

/// Idle sessions older than this are evicted by the cleanup job.
pub const SESSION_TTL_HOURS: i64 = 12;

#[derive(Debug, Clone)]
pub struct PracticeSession {
    pub user_id: Uuid,
    pub subject: String,
    pub session: MasterySession,
    pub last_active_at: DateTime<Utc>,
}

impl PracticeSession {
    pub fn new(
        user_id: Uuid,
        subject: String,
        session: MasterySession,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            subject,
            session,
            last_active_at: now,
        }
    }

    pub fn is_for(&self, user_id: Uuid, subject: &str, topic: &str) -> bool {
        self.user_id == user_id && self.subject == subject && self.session.topic() == topic
    }
}

#[derive(Debug, Clone)]
pub struct AssessmentSession {
    pub user_id: Uuid,
    pub session: AdaptiveSession,
    pub last_active_at: DateTime<Utc>,
    /// Result row stored. A completed session stays in memory until this is set.
    pub persisted: bool,
}

impl AssessmentSession {
    pub fn new(user_id: Uuid, session: AdaptiveSession, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            session,
            last_active_at: now,
            persisted: false,
        }
    }

    /// Row to store for a completed assessment, `None` while in progress.
    pub fn result_row(&self, assessment_id: Uuid) -> Option<AssessmentResultRow> {
        let summary = self.session.summary()?;
        let completed_at = self.session.state().ended_at?;
        Some(AssessmentResultRow::from_summary(
            assessment_id,
            self.user_id,
            &summary,
            completed_at,
        ))
    }

    /// Whether the cleanup job may drop this session once it is idle.
    pub const fn is_evictable(&self) -> bool {
        !self.session.is_complete() || self.persisted
    }
}

/// Store an assessment result and mark the in-memory session as persisted.
///
/// The insert is idempotent, so retrying after a failure is safe. Failures
/// are logged and reported as `false`; the session keeps the result until a
/// later attempt succeeds.
pub async fn persist_assessment_result(
    state: &ApiState,
    assessment_id: Uuid,
    row: &AssessmentResultRow,
) -> bool {
    match assessment::insert(&state.pool, row).await {
        Ok(()) => {
            state
                .assessments
                .update(assessment_id, |session| session.persisted = true);
            tracing::debug!(%assessment_id, "assessment result stored");
            true
        }
        Err(e) => {
            tracing::warn!(%assessment_id, "failed to store assessment result: {e}");
            false
        }
    }
}

/// Answer payload shared by practice and assessment sessions
#[derive(Debug, Deserialize, Validate)]
pub struct AnswerRequest {
    /// Option index as presented to the learner
    pub selected_index: usize,
    #[validate(range(min = 0.0, max = 86_400.0))]
    pub time_spent_secs: f64,
}

/// Load the questions of `subject` restricted to `topics` into a pool.
pub async fn load_question_pool(
    pool: &PgPool,
    subject: &str,
    topics: &[String],
) -> Result<QuestionPool, ApiError> {
    let rows = question::list_for_topics(pool, subject, topics).await?;
    tracing::debug!(subject, ?topics, questions = rows.len(), "question pool loaded");
    Ok(QuestionPool::from_questions(
        subject,
        rows.into_iter().map(Question::from),
    )?)
}

pub fn is_expired(last_active_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - last_active_at > Duration::hours(SESSION_TTL_HOURS)
}
