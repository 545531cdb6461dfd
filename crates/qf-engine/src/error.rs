use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the engine.
///
/// Boundary conditions of normal play (advancing past the top level,
/// retreating below level 1, a failed level) are not errors and never show
/// up here.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("no questions available for topic '{topic}' at level {level}")]
    NoQuestionsAvailable { topic: String, level: u32 },
    #[error("question {0} is not part of this session")]
    UnknownQuestion(Uuid),
    #[error("selected option {selected} is out of range for {options} options")]
    InvalidSelection { selected: usize, options: usize },
    #[error("no question is waiting for an answer")]
    NoActiveQuestion,
    #[error("session is already complete")]
    SessionComplete,
    #[error("invalid question {id}: {reason}")]
    InvalidQuestion { id: Uuid, reason: String },
    #[error("invalid tier table: {0}")]
    InvalidTierTable(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EngineError {
    /// Short machine-readable code, stable across releases.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NoQuestionsAvailable { .. } => "no_questions_available",
            Self::UnknownQuestion(_) => "unknown_question",
            Self::InvalidSelection { .. } => "invalid_selection",
            Self::NoActiveQuestion => "no_active_question",
            Self::SessionComplete => "session_complete",
            Self::InvalidQuestion { .. } => "invalid_question",
            Self::InvalidTierTable(_) => "invalid_tier_table",
            Self::InvalidConfig(_) => "invalid_config",
        }
    }
}
