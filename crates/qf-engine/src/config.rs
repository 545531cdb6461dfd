use serde::{Deserialize, Serialize};

use crate::adaptive::AdaptiveConfig;
use crate::error::EngineError;
use crate::mastery::MasteryConfig;
use crate::schedule::SchedulerConfig;
use crate::scoring::TierTable;

/// Engine-wide configuration, loaded once at startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub mastery: MasteryConfig,
    pub adaptive: AdaptiveConfig,
    pub scheduler: SchedulerConfig,
    pub tiers: TierTable,
}

impl EngineConfig {
    /// Check every section. The tier table is already validated on construction.
    pub fn validate(&self) -> Result<(), EngineError> {
        self.mastery.validate()?;
        self.adaptive.validate()?;
        self.scheduler.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_overrides() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "adaptive": { "max_questions": 30 } }"#).unwrap();
        assert_eq!(config.adaptive.max_questions, 30);
        assert_eq!(config.adaptive.start_level, 3);
        assert_eq!(config.mastery.per_level, 5);
        assert_eq!(config.tiers, TierTable::default());
    }

    #[test]
    fn test_invalid_section_is_reported() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "mastery": { "threshold": 0.0 } }"#).unwrap();
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfig(_))
        ));
    }
}
