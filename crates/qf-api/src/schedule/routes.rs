use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use chrono::Utc;
use qf_db::repositories::schedule;
use qf_engine::{
    PracticeSchedule,
    schedule::{DueTopic, due_topics},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

/// Create the schedule routes
pub fn routes() -> Router<ApiState> {
    Router::new().route("/schedules/{user_id}/due", get(list_due))
}

#[derive(Debug, Default, Deserialize)]
pub struct DueQuery {
    /// Only return topics whose review date has passed
    #[serde(default)]
    pub overdue_only: bool,
}

/// Every scheduled topic of a user with its urgency, most urgent first.
async fn list_due(
    State(state): State<ApiState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<DueQuery>,
) -> Result<Json<Vec<DueTopic>>, ApiError> {
    let rows = schedule::list_for_user(&state.pool, user_id).await?;
    let mut due = due_topics(rows.into_iter().map(PracticeSchedule::from), Utc::now());
    if query.overdue_only {
        due.retain(|topic| topic.status.is_overdue);
    }
    Ok(Json(due))
}
