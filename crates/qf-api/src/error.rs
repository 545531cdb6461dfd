use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use qf_engine::EngineError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl ApiError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Engine(err) => match err {
                EngineError::NoQuestionsAvailable { .. } | EngineError::UnknownQuestion(_) => {
                    StatusCode::NOT_FOUND
                }
                EngineError::InvalidSelection { .. } => StatusCode::BAD_REQUEST,
                EngineError::NoActiveQuestion | EngineError::SessionComplete => StatusCode::CONFLICT,
                EngineError::InvalidQuestion { .. }
                | EngineError::InvalidTierTable(_)
                | EngineError::InvalidConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::Database(_) => "database_error",
            Self::Engine(err) => err.code(),
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation_error",
            Self::Conflict(_) => "conflict",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Never leak driver messages to clients
        let message = match &self {
            Self::Database(e) => {
                tracing::error!("Database error: {e}");
                "Internal server error".to_string()
            }
            Self::Engine(e) if status.is_server_error() => {
                tracing::error!("Engine error: {e}");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(json!({
                "error": self.code(),
                "message": message,
            })),
        )
            .into_response()
    }
}
