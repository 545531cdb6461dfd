use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use chrono::{DateTime, Utc};
use qf_db::{
    models::{MasteryProgressRow, PracticeScheduleRow},
    repositories::{mastery, schedule},
};
use qf_engine::{
    AnswerFeedback, EngineError, LevelOutcome, MasteryProgress, MasterySession, PracticeSchedule,
    SessionStore, mastery::PracticeSummary, schedule::record_practice, shuffle::QuestionView,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    ApiState,
    error::ApiError,
    metrics,
    sessions::{AnswerRequest, PracticeSession, load_question_pool},
    validation::{validate_name, validate_payload},
};

/// Create the practice routes
pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/practice/sessions", post(start_session))
        .route("/practice/sessions/{session_id}/question", get(next_question))
        .route("/practice/sessions/{session_id}/answer", post(submit_answer))
        .route(
            "/practice/sessions/{session_id}/reveal/{question_id}",
            post(reveal_solution),
        )
        .route("/practice/sessions/{session_id}/reset", post(reset_session))
        .route("/practice/sessions/{session_id}/finish", post(finish_session))
        .route(
            "/practice/{user_id}/topics/{subject}/{topic}",
            delete(reset_topic),
        )
}

#[derive(Debug, Deserialize, Validate)]
pub struct StartPracticeRequest {
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 100))]
    pub subject: String,
    #[validate(length(min = 1, max = 100))]
    pub topic: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PracticeQuestionResponse {
    pub session_id: Uuid,
    pub level: u32,
    pub max_level: u32,
    pub progress: MasteryProgress,
    pub topic_mastered: bool,
    pub question: QuestionView,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PracticeAnswerResponse {
    pub feedback: AnswerFeedback,
    pub outcome: LevelOutcome,
    pub summary: Option<PracticeSummary>,
    pub level: u32,
    pub topic_mastered: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RevealResponse {
    pub question_id: Uuid,
    pub correct_index: usize,
    /// Set when the revealed question is the one currently on screen
    pub presented_correct_index: Option<usize>,
    pub correct_option: String,
    pub explanation: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FinishResponse {
    pub session_id: Uuid,
    pub answered: usize,
    /// Percentage over the whole session
    pub accuracy: f64,
    pub schedule: PracticeSchedule,
}

/// Run one step on a stored practice session while holding it exclusively.
fn with_practice<R>(
    state: &ApiState,
    session_id: Uuid,
    f: impl FnOnce(&mut PracticeSession) -> Result<R, ApiError>,
) -> Result<R, ApiError> {
    state
        .practice
        .update(session_id, f)
        .unwrap_or_else(|| Err(ApiError::NotFound(format!("practice session {session_id}"))))
}

fn question_response(
    session_id: Uuid,
    session: &MasterySession,
) -> Result<PracticeQuestionResponse, ApiError> {
    let presented = session
        .current_question()
        .ok_or(EngineError::NoActiveQuestion)?;
    Ok(PracticeQuestionResponse {
        session_id,
        level: session.current_level(),
        max_level: session.max_level(),
        progress: session.current_progress(),
        topic_mastered: session.is_topic_mastered(),
        question: presented.view(),
    })
}

/// Level progress of one session, detached so it can be written without
/// holding the session.
struct ProgressSnapshot {
    user_id: Uuid,
    subject: String,
    topic: String,
    rows: Vec<MasteryProgressRow>,
}

impl ProgressSnapshot {
    fn of(practice: &PracticeSession) -> Self {
        Self {
            user_id: practice.user_id,
            subject: practice.subject.clone(),
            topic: practice.session.topic().to_string(),
            rows: practice
                .session
                .progress()
                .into_iter()
                .map(MasteryProgressRow::from)
                .collect(),
        }
    }

    async fn save<'e, E>(&self, executor: E) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        mastery::upsert_progress(executor, self.user_id, &self.subject, &self.topic, &self.rows)
            .await
    }
}

async fn start_session(
    State(state): State<ApiState>,
    Json(payload): Json<StartPracticeRequest>,
) -> Result<(StatusCode, Json<PracticeQuestionResponse>), ApiError> {
    validate_payload(&payload)?;

    let questions = load_question_pool(
        &state.pool,
        &payload.subject,
        std::slice::from_ref(&payload.topic),
    )
    .await?;
    let saved =
        mastery::get_progress(&state.pool, payload.user_id, &payload.subject, &payload.topic)
            .await?;

    let mut session = MasterySession::new(
        payload.topic,
        &questions,
        state.engine.mastery,
        saved.into_iter().map(MasteryProgress::from),
    )?;
    session.next_question()?;

    let session_id = Uuid::new_v4();
    let response = question_response(session_id, &session)?;
    tracing::info!(
        %session_id,
        user_id = %payload.user_id,
        topic = session.topic(),
        level = session.current_level(),
        "practice session started"
    );

    state.practice.save(
        session_id,
        PracticeSession::new(payload.user_id, payload.subject, session, Utc::now()),
    );
    Ok((StatusCode::CREATED, Json(response)))
}

/// Current question, or a fresh draw when the last one was answered.
async fn next_question(
    State(state): State<ApiState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<PracticeQuestionResponse>, ApiError> {
    let response = with_practice(&state, session_id, |practice| {
        if practice.session.current_question().is_none() {
            practice.session.next_question()?;
        }
        practice.last_active_at = Utc::now();
        question_response(session_id, &practice.session)
    })?;
    Ok(Json(response))
}

async fn submit_answer(
    State(state): State<ApiState>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<PracticeAnswerResponse>, ApiError> {
    validate_payload(&payload)?;

    let now = Utc::now();
    let (usage, response, decided) = with_practice(&state, session_id, |practice| {
        let answer = practice
            .session
            .submit(payload.selected_index, payload.time_spent_secs, now)?;
        practice.last_active_at = now;

        let summary = answer.outcome.summary();
        let decided = summary.map(|_| ProgressSnapshot::of(practice));
        let response = PracticeAnswerResponse {
            feedback: answer.feedback,
            outcome: answer.outcome,
            summary,
            level: practice.session.current_level(),
            topic_mastered: practice.session.is_topic_mastered(),
        };
        Ok((answer.usage, response, decided))
    })?;

    state.usage.record(usage);
    metrics::record_answer("practice", response.feedback.is_correct);
    metrics::record_level_outcome(&response.outcome);

    // finish rewrites the full snapshot
    if let Some(snapshot) = decided {
        if let Err(e) = snapshot.save(&state.pool).await {
            tracing::warn!(%session_id, "failed to store level progress: {e}");
        }
    }

    Ok(Json(response))
}

async fn reveal_solution(
    State(state): State<ApiState>,
    Path((session_id, question_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<RevealResponse>, ApiError> {
    let response = with_practice(&state, session_id, |practice| {
        let question = practice.session.reveal(question_id)?;
        let mut response = RevealResponse {
            question_id,
            correct_index: question.correct_index,
            presented_correct_index: None,
            correct_option: question
                .options
                .get(question.correct_index)
                .cloned()
                .unwrap_or_default(),
            explanation: question.explanation.clone(),
        };
        response.presented_correct_index = practice
            .session
            .current_question()
            .filter(|presented| presented.question.id == question_id)
            .map(|presented| presented.presented_correct_index());

        practice.last_active_at = Utc::now();
        Ok(response)
    })?;
    Ok(Json(response))
}

/// Restart the session's topic from level 1, stored progress included.
async fn reset_session(
    State(state): State<ApiState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<PracticeQuestionResponse>, ApiError> {
    let (user_id, subject, topic) = with_practice(&state, session_id, |practice| {
        Ok((
            practice.user_id,
            practice.subject.clone(),
            practice.session.topic().to_string(),
        ))
    })?;
    let now = Utc::now();

    clear_topic_progress(&state, user_id, &subject, &topic, now).await?;

    let response = with_practice(&state, session_id, |practice| {
        practice.session.reset_topic();
        practice.session.next_question()?;
        practice.last_active_at = now;
        question_response(session_id, &practice.session)
    })?;
    Ok(Json(response))
}

/// Close the session and feed its accuracy into the review schedule.
///
/// The session leaves the store for the duration of the write, so answers
/// racing a finish see a missing session. It is put back when the write
/// fails.
async fn finish_session(
    State(state): State<ApiState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<FinishResponse>, ApiError> {
    let practice = state
        .practice
        .remove(session_id)
        .ok_or_else(|| ApiError::NotFound(format!("practice session {session_id}")))?;
    let answered = practice.session.history().len();
    if answered == 0 {
        state.practice.save(session_id, practice);
        return Err(ApiError::Conflict(
            "no answers were submitted in this session".to_string(),
        ));
    }

    let accuracy = practice.session.session_accuracy();
    let updated = match store_finished(&state, &practice, accuracy, Utc::now()).await {
        Ok(updated) => updated,
        Err(e) => {
            state.practice.save(session_id, practice);
            return Err(e);
        }
    };

    tracing::info!(
        %session_id,
        topic = practice.session.topic(),
        answered,
        accuracy,
        interval_days = updated.interval_days,
        "practice session finished"
    );

    Ok(Json(FinishResponse {
        session_id,
        answered,
        accuracy,
        schedule: updated,
    }))
}

async fn store_finished(
    state: &ApiState,
    practice: &PracticeSession,
    accuracy: f64,
    now: DateTime<Utc>,
) -> Result<PracticeSchedule, ApiError> {
    let snapshot = ProgressSnapshot::of(practice);

    let mut tx = state.pool.begin().await?;
    let existing = schedule::get(&mut *tx, snapshot.user_id, &snapshot.subject, &snapshot.topic)
        .await?
        .map(PracticeSchedule::from);
    let updated = record_practice(
        existing,
        snapshot.user_id,
        &snapshot.subject,
        &snapshot.topic,
        accuracy,
        &state.engine.scheduler,
        now,
    );
    schedule::upsert(&mut *tx, &PracticeScheduleRow::from(&updated)).await?;
    snapshot.save(&mut *tx).await?;
    tx.commit().await?;

    Ok(updated)
}

async fn reset_topic(
    State(state): State<ApiState>,
    Path((user_id, subject, topic)): Path<(Uuid, String, String)>,
) -> Result<StatusCode, ApiError> {
    validate_name("subject", &subject)?;
    validate_name("topic", &topic)?;

    clear_topic_progress(&state, user_id, &subject, &topic, Utc::now()).await?;
    let evicted = state
        .practice
        .evict(|practice| practice.is_for(user_id, &subject, &topic));
    if evicted > 0 {
        tracing::debug!(evicted, "dropped live sessions of reset topic");
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Delete stored level progress and put the schedule back to its defaults.
async fn clear_topic_progress(
    state: &ApiState,
    user_id: Uuid,
    subject: &str,
    topic: &str,
    now: DateTime<Utc>,
) -> Result<(), ApiError> {
    let mut tx = state.pool.begin().await?;
    let levels = mastery::delete_topic(&mut *tx, user_id, subject, topic).await?;
    if let Some(row) = schedule::get(&mut *tx, user_id, subject, topic).await? {
        let mut reset = PracticeSchedule::from(row);
        reset.reset(&state.engine.scheduler, now);
        schedule::upsert(&mut *tx, &PracticeScheduleRow::from(&reset)).await?;
    }
    tx.commit().await?;

    tracing::info!(%user_id, subject, topic, levels, "topic progress reset");
    Ok(())
}
