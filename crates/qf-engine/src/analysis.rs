//! Per-topic performance breakdown and study recommendations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::question::AnswerEvent;

/// Points above/below the session accuracy that flag a strength/weakness.
const CLASSIFICATION_MARGIN: f64 = 15.0;
/// Topics with fewer attempts are never classified.
const MIN_ATTEMPTS: u32 = 2;
const HIGH_PRIORITY_BELOW: f64 = 40.0;
const MEDIUM_PRIORITY_BELOW: f64 = 50.0;
const SLOW_FACTOR: f64 = 1.5;
const CHALLENGE_FROM: f64 = 80.0;

const MAX_WEAKNESS_RECOMMENDATIONS: usize = 2;
const MAX_SLOW_RECOMMENDATIONS: usize = 1;
const MAX_CHALLENGE_RECOMMENDATIONS: usize = 1;

/// Aggregated results for one topic. Derived, never persisted on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicPerformance {
    pub topic: String,
    pub attempts: u32,
    pub correct: u32,
    /// Percentage, 0-100
    pub accuracy: f64,
    pub avg_time_secs: f64,
    pub min_level: u32,
    pub max_level: u32,
    pub is_strength: bool,
    pub is_weakness: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    /// Very low accuracy, rebuild the fundamentals
    Remediate,
    /// Below average, needs more practice
    Reinforce,
    /// Correct but slow
    Pace,
    /// Doing well, try harder material
    Challenge,
    /// Nothing stood out, work on the weakest topic
    Focus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyRecommendation {
    pub topic: String,
    pub priority: Priority,
    pub kind: RecommendationKind,
    pub title: String,
    pub message: String,
    pub action_items: Vec<String>,
}

/// Breakdown of one session's answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceAnalysis {
    /// Percentage over all answers
    pub overall_accuracy: f64,
    pub avg_time_secs: f64,
    /// Sorted by topic name
    pub topics: Vec<TopicPerformance>,
}

#[derive(Default)]
struct Tally {
    attempts: u32,
    correct: u32,
    total_time: f64,
    min_level: u32,
    max_level: u32,
}

impl PerformanceAnalysis {
    pub fn from_events(events: &[AnswerEvent]) -> Self {
        let mut tallies: BTreeMap<&str, Tally> = BTreeMap::new();
        for event in events {
            let tally = tallies.entry(event.topic.as_str()).or_insert_with(|| Tally {
                min_level: event.level,
                max_level: event.level,
                ..Tally::default()
            });
            tally.attempts += 1;
            tally.total_time += event.time_spent_secs;
            tally.min_level = tally.min_level.min(event.level);
            tally.max_level = tally.max_level.max(event.level);
            if event.is_correct {
                tally.correct += 1;
            }
        }

        let attempts = events.len() as u32;
        let correct = events.iter().filter(|e| e.is_correct).count() as u32;
        let total_time: f64 = events.iter().map(|e| e.time_spent_secs).sum();
        let overall_accuracy = percentage(correct, attempts);
        let avg_time_secs = average(total_time, attempts);

        let topics = tallies
            .into_iter()
            .map(|(topic, tally)| {
                let accuracy = percentage(tally.correct, tally.attempts);
                let enough = tally.attempts >= MIN_ATTEMPTS;
                TopicPerformance {
                    topic: topic.to_string(),
                    attempts: tally.attempts,
                    correct: tally.correct,
                    accuracy,
                    avg_time_secs: average(tally.total_time, tally.attempts),
                    min_level: tally.min_level,
                    max_level: tally.max_level,
                    is_strength: enough && accuracy >= overall_accuracy + CLASSIFICATION_MARGIN,
                    is_weakness: enough && accuracy <= overall_accuracy - CLASSIFICATION_MARGIN,
                }
            })
            .collect();

        Self {
            overall_accuracy,
            avg_time_secs,
            topics,
        }
    }

    pub fn strengths(&self) -> impl Iterator<Item = &TopicPerformance> {
        self.topics.iter().filter(|t| t.is_strength)
    }

    pub fn weaknesses(&self) -> impl Iterator<Item = &TopicPerformance> {
        self.topics.iter().filter(|t| t.is_weakness)
    }

    /// Prioritized recommendations, high priority first.
    ///
    /// Never empty when there is at least one answered topic.
    pub fn recommendations(&self) -> Vec<StudyRecommendation> {
        let mut recommendations = Vec::new();

        let mut weak: Vec<&TopicPerformance> = self
            .weaknesses()
            .filter(|t| t.accuracy < MEDIUM_PRIORITY_BELOW)
            .collect();
        weak.sort_by(|a, b| a.accuracy.total_cmp(&b.accuracy));
        recommendations.extend(
            weak.into_iter()
                .take(MAX_WEAKNESS_RECOMMENDATIONS)
                .map(weakness_recommendation),
        );

        let slow_limit = self.avg_time_secs * SLOW_FACTOR;
        let mut slow: Vec<&TopicPerformance> = self
            .topics
            .iter()
            .filter(|t| !t.is_weakness && t.avg_time_secs > slow_limit)
            .collect();
        slow.sort_by(|a, b| b.avg_time_secs.total_cmp(&a.avg_time_secs));
        recommendations.extend(
            slow.into_iter()
                .take(MAX_SLOW_RECOMMENDATIONS)
                .map(|t| pace_recommendation(t, self.avg_time_secs)),
        );

        let mut strong: Vec<&TopicPerformance> = self
            .topics
            .iter()
            .filter(|t| t.accuracy >= CHALLENGE_FROM)
            .collect();
        strong.sort_by(|a, b| b.accuracy.total_cmp(&a.accuracy));
        recommendations.extend(
            strong
                .into_iter()
                .take(MAX_CHALLENGE_RECOMMENDATIONS)
                .map(challenge_recommendation),
        );

        if recommendations.is_empty() {
            if let Some(lowest) = self
                .topics
                .iter()
                .min_by(|a, b| a.accuracy.total_cmp(&b.accuracy))
            {
                recommendations.push(focus_recommendation(lowest));
            }
        }

        recommendations.sort_by_key(|r| r.priority);
        recommendations
    }
}

fn weakness_recommendation(topic: &TopicPerformance) -> StudyRecommendation {
    if topic.accuracy < HIGH_PRIORITY_BELOW {
        StudyRecommendation {
            topic: topic.topic.clone(),
            priority: Priority::High,
            kind: RecommendationKind::Remediate,
            title: format!("Rebuild the basics of {}", topic.topic),
            message: format!(
                "You answered {:.0}% of {} questions correctly. Go back to the fundamentals before moving on.",
                topic.accuracy, topic.topic
            ),
            action_items: vec![
                format!("Review the explanations for every {} question you missed", topic.topic),
                format!("Practice {} starting from level 1", topic.topic),
                "Use hints before answering until the pattern clicks".to_string(),
            ],
        }
    } else {
        StudyRecommendation {
            topic: topic.topic.clone(),
            priority: Priority::Medium,
            kind: RecommendationKind::Reinforce,
            title: format!("Strengthen {}", topic.topic),
            message: format!(
                "{:.0}% accuracy on {} is below your average. A few focused sessions will close the gap.",
                topic.accuracy, topic.topic
            ),
            action_items: vec![
                format!("Schedule a short {} practice session", topic.topic),
                "Re-read the explanations of the questions you missed".to_string(),
            ],
        }
    }
}

fn pace_recommendation(topic: &TopicPerformance, session_avg: f64) -> StudyRecommendation {
    StudyRecommendation {
        topic: topic.topic.clone(),
        priority: Priority::Medium,
        kind: RecommendationKind::Pace,
        title: format!("Speed up on {}", topic.topic),
        message: format!(
            "You spent {:.0}s per {} question against {:.0}s on average.",
            topic.avg_time_secs, topic.topic, session_avg
        ),
        action_items: vec![
            format!("Do timed {} drills to build fluency", topic.topic),
            "Memorize the key facts you keep working out from scratch".to_string(),
        ],
    }
}

fn challenge_recommendation(topic: &TopicPerformance) -> StudyRecommendation {
    StudyRecommendation {
        topic: topic.topic.clone(),
        priority: Priority::Low,
        kind: RecommendationKind::Challenge,
        title: format!("Push further in {}", topic.topic),
        message: format!(
            "{:.0}% accuracy on {}. You are ready for harder questions.",
            topic.accuracy, topic.topic
        ),
        action_items: vec![format!(
            "Practice {} above level {}",
            topic.topic, topic.max_level
        )],
    }
}

fn focus_recommendation(topic: &TopicPerformance) -> StudyRecommendation {
    StudyRecommendation {
        topic: topic.topic.clone(),
        priority: Priority::Medium,
        kind: RecommendationKind::Focus,
        title: format!("Focus on {}", topic.topic),
        message: format!(
            "{} is your lowest-scoring topic at {:.0}%. Concentrate your next sessions there.",
            topic.topic, topic.accuracy
        ),
        action_items: vec![format!("Start a practice session on {}", topic.topic)],
    }
}

fn percentage(correct: u32, attempts: u32) -> f64 {
    if attempts == 0 {
        0.0
    } else {
        f64::from(correct) / f64::from(attempts) * 100.0
    }
}

fn average(total: f64, count: u32) -> f64 {
    if count == 0 { 0.0 } else { total / f64::from(count) }
}
