use qf_engine::{EngineConfig, EngineError};
use serde::Deserialize;

/// Deployment environment, read from `ENV`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    #[serde(alias = "dev")]
    Development,
    #[serde(alias = "prod")]
    Production,
}

impl Environment {
    pub const fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Server configuration, read from the process environment.
///
/// Variable names are the upper-cased field names (`DATABASE_URL`, `PORT`, ...).
#[derive(Clone, Debug, Deserialize)]
pub struct ApiConfig {
    pub database_url: String,
    #[serde(default)]
    pub env: Environment,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,
    /// Bound of the usage log channel; records beyond it are dropped
    #[serde(default = "default_usage_log_capacity")]
    pub usage_log_capacity: usize,

    pub adaptive_max_questions: Option<u32>,
    pub adaptive_start_level: Option<u32>,
    pub mastery_per_level: Option<u32>,
    pub mastery_threshold: Option<f64>,
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    10
}

const fn default_usage_log_capacity() -> usize {
    1024
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    /// Engine configuration with the environment overrides applied, validated.
    pub fn engine_config(&self) -> Result<EngineConfig, EngineError> {
        let mut config = EngineConfig::default();
        if let Some(max_questions) = self.adaptive_max_questions {
            config.adaptive.max_questions = max_questions;
        }
        if let Some(start_level) = self.adaptive_start_level {
            config.adaptive.start_level = start_level;
        }
        if let Some(per_level) = self.mastery_per_level {
            config.mastery.per_level = per_level;
        }
        if let Some(threshold) = self.mastery_threshold {
            config.mastery.threshold = threshold;
        }
        config.validate()?;
        Ok(config)
    }
}
