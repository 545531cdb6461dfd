//! Skill score and tier classification.
//!
//! The score blends three components into a bounded 0-100 value:
//!
//! * level: `highest_level / max_level * 60`
//! * accuracy: `total_correct / total_questions * 25`
//! * speed: `(30 - avg_secs) / 20 * 15`, clamped to `0..=15`
//!
//! The tier table is a fixed lookup, not a calibrated psychometric model.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

pub const MAX_SCORE: u32 = 100;

const LEVEL_WEIGHT: f64 = 60.0;
const ACCURACY_WEIGHT: f64 = 25.0;
const SPEED_WEIGHT: f64 = 15.0;
const SPEED_BASELINE_SECS: f64 = 30.0;
const SPEED_RANGE_SECS: f64 = 20.0;

/// Raw performance of a finished assessment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkillInputs {
    pub highest_level: u32,
    pub max_level: u32,
    pub total_correct: u32,
    pub total_questions: u32,
    pub avg_time_per_question: f64,
}

/// Compute the 0-100 skill score.
///
/// Returns 0 when no question was answered.
pub fn calculate_skill_score(inputs: &SkillInputs) -> u32 {
    if inputs.total_questions == 0 {
        return 0;
    }

    let level_ratio = if inputs.max_level == 0 {
        0.0
    } else {
        (f64::from(inputs.highest_level) / f64::from(inputs.max_level)).min(1.0)
    };
    let accuracy_ratio =
        (f64::from(inputs.total_correct) / f64::from(inputs.total_questions)).min(1.0);

    let level_score = level_ratio * LEVEL_WEIGHT;
    let accuracy_score = accuracy_ratio * ACCURACY_WEIGHT;
    let speed_score = speed_score(inputs.avg_time_per_question);

    let total = (level_score + accuracy_score + speed_score).min(f64::from(MAX_SCORE));
    total.round().max(0.0) as u32
}

fn speed_score(avg_secs: f64) -> f64 {
    if !avg_secs.is_finite() {
        return 0.0;
    }
    ((SPEED_BASELINE_SECS - avg_secs) / SPEED_RANGE_SECS * SPEED_WEIGHT).clamp(0.0, SPEED_WEIGHT)
}

/// A named score band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillTier {
    /// Stable identifier, e.g. `"proficient"`
    pub id: String,
    pub title: String,
    /// Inclusive lower bound
    pub min_score: u32,
    /// Inclusive upper bound
    pub max_score: u32,
    pub capabilities: Vec<String>,
    pub encouragement: String,
}

impl SkillTier {
    pub const fn contains(&self, score: u32) -> bool {
        self.min_score <= score && score <= self.max_score
    }
}

/// Ordered tiers whose bands partition `0..=100` with no gaps or overlaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<SkillTier>", into = "Vec<SkillTier>")]
pub struct TierTable {
    tiers: Vec<SkillTier>,
}

impl TierTable {
    /// Sort and validate a tier set.
    pub fn new(mut tiers: Vec<SkillTier>) -> Result<Self, EngineError> {
        tiers.sort_by_key(|t| t.min_score);

        let (Some(first), Some(last)) = (tiers.first(), tiers.last()) else {
            return Err(EngineError::InvalidTierTable("no tiers".to_string()));
        };
        if first.min_score != 0 {
            return Err(EngineError::InvalidTierTable(format!(
                "lowest tier '{}' starts at {} instead of 0",
                first.id, first.min_score
            )));
        }
        if last.max_score != MAX_SCORE {
            return Err(EngineError::InvalidTierTable(format!(
                "highest tier '{}' ends at {} instead of {MAX_SCORE}",
                last.id, last.max_score
            )));
        }

        for tier in &tiers {
            if tier.min_score > tier.max_score {
                return Err(EngineError::InvalidTierTable(format!(
                    "tier '{}' has min {} above max {}",
                    tier.id, tier.min_score, tier.max_score
                )));
            }
        }

        for pair in tiers.windows(2) {
            let (lower, upper) = (&pair[0], &pair[1]);
            if upper.min_score != lower.max_score + 1 {
                let kind = if upper.min_score <= lower.max_score {
                    "overlaps"
                } else {
                    "leaves a gap after"
                };
                return Err(EngineError::InvalidTierTable(format!(
                    "tier '{}' {kind} tier '{}'",
                    upper.id, lower.id
                )));
            }
        }

        Ok(Self { tiers })
    }

    /// The tier whose band contains `score`, or the lowest tier as a fallback.
    pub fn classify(&self, score: u32) -> &SkillTier {
        self.tiers
            .iter()
            .find(|t| t.contains(score))
            .unwrap_or(&self.tiers[0])
    }

    pub fn tiers(&self) -> &[SkillTier] {
        &self.tiers
    }

    pub fn highest(&self) -> &SkillTier {
        &self.tiers[self.tiers.len() - 1]
    }

    pub fn lowest(&self) -> &SkillTier {
        &self.tiers[0]
    }
}

impl TryFrom<Vec<SkillTier>> for TierTable {
    type Error = EngineError;

    fn try_from(tiers: Vec<SkillTier>) -> Result<Self, Self::Error> {
        Self::new(tiers)
    }
}

impl From<TierTable> for Vec<SkillTier> {
    fn from(table: TierTable) -> Self {
        table.tiers
    }
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            tiers: reference_tiers(),
        }
    }
}

fn tier(
    id: &str,
    title: &str,
    (min_score, max_score): (u32, u32),
    capabilities: &[&str],
    encouragement: &str,
) -> SkillTier {
    SkillTier {
        id: id.to_string(),
        title: title.to_string(),
        min_score,
        max_score,
        capabilities: capabilities.iter().map(|c| (*c).to_string()).collect(),
        encouragement: encouragement.to_string(),
    }
}

/// The seven reference tiers.
fn reference_tiers() -> Vec<SkillTier> {
    vec![
        tier(
            "novice",
            "Novice",
            (0, 19),
            &["Recognizes basic vocabulary of the subject"],
            "Every expert started here. Pick one topic and build from the ground up.",
        ),
        tier(
            "beginner",
            "Beginner",
            (20, 39),
            &[
                "Answers foundational questions",
                "Recalls core definitions",
            ],
            "The basics are taking shape. Regular short sessions will lock them in.",
        ),
        tier(
            "developing",
            "Developing",
            (40, 54),
            &[
                "Handles routine problems",
                "Connects related concepts with some help",
            ],
            "Solid progress. Target your weakest topic to move up fastest.",
        ),
        tier(
            "competent",
            "Competent",
            (55, 69),
            &[
                "Solves standard problems reliably",
                "Explains the reasoning behind answers",
            ],
            "You know your way around. Push into harder levels to keep growing.",
        ),
        tier(
            "proficient",
            "Proficient",
            (70, 84),
            &[
                "Works through multi-step problems",
                "Spots common mistakes",
                "Applies concepts in new contexts",
            ],
            "Strong work. Speed and consistency are what separate you from the top.",
        ),
        tier(
            "advanced",
            "Advanced",
            (85, 94),
            &[
                "Handles difficult questions under time pressure",
                "Transfers knowledge across topics",
            ],
            "Impressive. A little polish on the hardest levels and you are there.",
        ),
        tier(
            "expert",
            "Expert",
            (95, 100),
            &[
                "Masters the hardest levels quickly and accurately",
                "Could teach the subject to others",
            ],
            "Outstanding. Keep your edge with periodic reviews.",
        ),
    ]
}
