use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;
use qf_db::repositories::assessment;
use qf_engine::{
    AdaptiveSession, AnswerFeedback, AssessmentSummary, EngineError, SessionStore,
    adaptive::LevelChange, shuffle::QuestionView,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    ApiState,
    error::ApiError,
    metrics,
    sessions::{AnswerRequest, AssessmentSession, load_question_pool, persist_assessment_result},
    validation::{validate_name, validate_payload},
};

/// Create the adaptive assessment routes
pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/assessments", post(start_assessment))
        .route("/assessments/{assessment_id}/question", get(next_question))
        .route("/assessments/{assessment_id}/answer", post(submit_answer))
        .route("/assessments/{assessment_id}/result", get(get_result))
        .route("/users/{user_id}/assessments", get(list_results))
}

const DEFAULT_HISTORY_LIMIT: i64 = 20;
const MAX_HISTORY_LIMIT: i64 = 100;

#[derive(Debug, Deserialize, Validate)]
pub struct StartAssessmentRequest {
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 100))]
    pub subject: String,
    #[validate(length(min = 1, max = 20))]
    pub topics: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssessmentQuestionResponse {
    pub assessment_id: Uuid,
    pub level: u32,
    pub questions_answered: u32,
    pub questions_remaining: u32,
    pub question: QuestionView,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssessmentAnswerResponse {
    pub feedback: AnswerFeedback,
    pub level_change: LevelChange,
    pub level: u32,
    pub questions_remaining: u32,
    pub is_complete: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssessmentResultResponse {
    pub assessment_id: Uuid,
    pub user_id: Uuid,
    pub summary: AssessmentSummary,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

/// Run one step on a stored assessment while holding it exclusively.
fn with_assessment<R>(
    state: &ApiState,
    assessment_id: Uuid,
    f: impl FnOnce(&mut AssessmentSession) -> Result<R, ApiError>,
) -> Result<R, ApiError> {
    state
        .assessments
        .update(assessment_id, f)
        .unwrap_or_else(|| Err(ApiError::NotFound(format!("assessment {assessment_id}"))))
}

fn question_response(
    assessment_id: Uuid,
    session: &AdaptiveSession,
) -> Result<AssessmentQuestionResponse, ApiError> {
    let presented = session
        .current_question()
        .ok_or(EngineError::NoActiveQuestion)?;
    Ok(AssessmentQuestionResponse {
        assessment_id,
        level: session.state().current_level,
        questions_answered: session.state().total_questions,
        questions_remaining: session.questions_remaining(),
        question: presented.view(),
    })
}

async fn start_assessment(
    State(state): State<ApiState>,
    Json(payload): Json<StartAssessmentRequest>,
) -> Result<(StatusCode, Json<AssessmentQuestionResponse>), ApiError> {
    validate_payload(&payload)?;
    for topic in &payload.topics {
        validate_name("topic", topic)?;
    }

    let questions = load_question_pool(&state.pool, &payload.subject, &payload.topics).await?;
    let now = Utc::now();
    let mut session = AdaptiveSession::start(
        &questions,
        payload.topics,
        state.engine.adaptive,
        state.engine.tiers.clone(),
        now,
    )?;
    session.next_question()?;

    let assessment_id = Uuid::new_v4();
    let response = question_response(assessment_id, &session)?;
    tracing::info!(
        %assessment_id,
        user_id = %payload.user_id,
        subject = %payload.subject,
        start_level = session.state().current_level,
        "assessment started"
    );

    state.assessments.save(
        assessment_id,
        AssessmentSession::new(payload.user_id, session, now),
    );
    Ok((StatusCode::CREATED, Json(response)))
}

async fn next_question(
    State(state): State<ApiState>,
    Path(assessment_id): Path<Uuid>,
) -> Result<Json<AssessmentQuestionResponse>, ApiError> {
    let response = with_assessment(&state, assessment_id, |assessment| {
        if assessment.session.current_question().is_none() {
            assessment.session.next_question()?;
        }
        assessment.last_active_at = Utc::now();
        question_response(assessment_id, &assessment.session)
    })?;
    Ok(Json(response))
}

async fn submit_answer(
    State(state): State<ApiState>,
    Path(assessment_id): Path<Uuid>,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<AssessmentAnswerResponse>, ApiError> {
    validate_payload(&payload)?;

    let now = Utc::now();
    let (usage, response, completed) = with_assessment(&state, assessment_id, |assessment| {
        let answer = assessment
            .session
            .submit(payload.selected_index, payload.time_spent_secs, now)?;
        assessment.last_active_at = now;

        // Completion happens exactly once; later submits fail with SessionComplete
        let completed = if answer.is_complete {
            assessment
                .session
                .summary()
                .zip(assessment.result_row(assessment_id))
        } else {
            None
        };
        let response = AssessmentAnswerResponse {
            feedback: answer.feedback,
            level_change: answer.level_change,
            level: assessment.session.state().current_level,
            questions_remaining: answer.questions_remaining,
            is_complete: answer.is_complete,
        };
        Ok((answer.usage, response, completed))
    })?;

    state.usage.record(usage);
    metrics::record_answer("assessment", response.feedback.is_correct);

    if let Some((summary, row)) = completed {
        metrics::record_assessment_completed(&summary.skill_tier.id, summary.final_score);
        // a failed insert is retried by get_result and the cleanup job
        persist_assessment_result(&state, assessment_id, &row).await;
    }

    Ok(Json(response))
}

/// Summary of a completed assessment, from memory or from storage.
async fn get_result(
    State(state): State<ApiState>,
    Path(assessment_id): Path<Uuid>,
) -> Result<Json<AssessmentResultResponse>, ApiError> {
    if let Some(assessment) = state.assessments.load(assessment_id) {
        let summary = assessment.session.summary().ok_or_else(|| {
            ApiError::Conflict(format!("assessment {assessment_id} is still in progress"))
        })?;
        if !assessment.persisted {
            if let Some(row) = assessment.result_row(assessment_id) {
                persist_assessment_result(&state, assessment_id, &row).await;
            }
        }
        return Ok(Json(AssessmentResultResponse {
            assessment_id,
            user_id: assessment.user_id,
            summary,
        }));
    }

    let row = assessment::get(&state.pool, assessment_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("assessment {assessment_id}")))?;
    Ok(Json(AssessmentResultResponse {
        assessment_id,
        user_id: row.user_id,
        summary: row.into_summary(&state.engine.tiers),
    }))
}

/// Stored results of a user, newest first.
async fn list_results(
    State(state): State<ApiState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<AssessmentResultResponse>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let rows = assessment::list_for_user(&state.pool, user_id, limit).await?;

    Ok(Json(
        rows.into_iter()
            .map(|row| AssessmentResultResponse {
                assessment_id: row.id,
                user_id: row.user_id,
                summary: row.into_summary(&state.engine.tiers),
            })
            .collect(),
    ))
}
