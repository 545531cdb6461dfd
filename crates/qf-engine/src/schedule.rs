//! Spaced repetition for weak topics.
//!
//! An SM-2 style update driven by the accuracy of a focused practice
//! session. Strong sessions grow the ease factor and stretch the interval,
//! middling ones stretch it a little, weak ones shrink the ease factor
//! (never below `min_ease`) and make the topic due again tomorrow.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

/// Upper bound on review intervals, roughly a century.
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

/// Scheduler parameters. Accuracies are percentages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub initial_ease: f64,
    pub min_ease: f64,
    pub initial_interval_days: u32,
    /// At or above: ease grows and the interval is multiplied by it
    pub strong_accuracy: f64,
    /// Below: ease shrinks and the interval resets
    pub weak_accuracy: f64,
    pub ease_bonus: f64,
    pub ease_penalty: f64,
    /// Interval multiplier between `weak_accuracy` and `strong_accuracy`
    pub moderate_multiplier: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_ease: 2.5,
            min_ease: 1.3,
            initial_interval_days: 1,
            strong_accuracy: 80.0,
            weak_accuracy: 50.0,
            ease_bonus: 0.1,
            ease_penalty: 0.2,
            moderate_multiplier: 1.2,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.min_ease <= 1.0 || self.initial_ease < self.min_ease {
            return Err(EngineError::InvalidConfig(format!(
                "ease factors must satisfy 1.0 < min_ease ({}) <= initial_ease ({})",
                self.min_ease, self.initial_ease
            )));
        }
        if self.initial_interval_days == 0 {
            return Err(EngineError::InvalidConfig(
                "initial interval must be at least one day".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.weak_accuracy)
            || !(0.0..=100.0).contains(&self.strong_accuracy)
            || self.weak_accuracy > self.strong_accuracy
        {
            return Err(EngineError::InvalidConfig(format!(
                "accuracy bands must satisfy 0 <= weak ({}) <= strong ({}) <= 100",
                self.weak_accuracy, self.strong_accuracy
            )));
        }
        if self.moderate_multiplier < 1.0 {
            return Err(EngineError::InvalidConfig(
                "moderate multiplier must not shrink the interval".to_string(),
            ));
        }
        Ok(())
    }
}

/// Review plan for one (user, subject, topic) triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeSchedule {
    pub user_id: Uuid,
    pub subject: String,
    pub topic: String,
    pub next_practice_at: DateTime<Utc>,
    pub interval_days: u32,
    pub ease_factor: f64,
    pub review_count: u32,
    pub last_practiced_at: Option<DateTime<Utc>>,
    /// Accuracy percentage of the last session
    pub last_performance: Option<f64>,
}

impl PracticeSchedule {
    /// A never-practiced topic, due immediately.
    pub fn new(
        user_id: Uuid,
        subject: impl Into<String>,
        topic: impl Into<String>,
        config: &SchedulerConfig,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            subject: subject.into(),
            topic: topic.into(),
            next_practice_at: now,
            interval_days: config.initial_interval_days,
            ease_factor: config.initial_ease,
            review_count: 0,
            last_practiced_at: None,
            last_performance: None,
        }
    }

    /// Apply the result of a practice session.
    pub fn record_practice(&mut self, accuracy: f64, config: &SchedulerConfig, now: DateTime<Utc>) {
        let accuracy = if accuracy.is_finite() {
            accuracy.clamp(0.0, 100.0)
        } else {
            0.0
        };
        let previous_interval = self.interval_days;

        if accuracy >= config.strong_accuracy {
            self.ease_factor += config.ease_bonus;
            self.interval_days = scale_interval(self.interval_days, self.ease_factor);
        } else if accuracy >= config.weak_accuracy {
            self.interval_days = scale_interval(self.interval_days, config.moderate_multiplier);
        } else {
            self.ease_factor = (self.ease_factor - config.ease_penalty).max(config.min_ease);
            self.interval_days = 1;
        }

        self.review_count += 1;
        self.last_practiced_at = Some(now);
        self.last_performance = Some(accuracy);
        self.next_practice_at = now + Duration::days(i64::from(self.interval_days));

        tracing::debug!(
            topic = %self.topic,
            accuracy,
            previous_interval,
            interval_days = self.interval_days,
            ease_factor = self.ease_factor,
            "practice schedule updated"
        );
    }

    /// Restore the never-practiced defaults, due immediately.
    pub fn reset(&mut self, config: &SchedulerConfig, now: DateTime<Utc>) {
        *self = Self::new(
            self.user_id,
            std::mem::take(&mut self.subject),
            std::mem::take(&mut self.topic),
            config,
            now,
        );
    }

    /// Derived urgency. Not stored.
    pub fn due_status(&self, now: DateTime<Utc>) -> DueStatus {
        if now > self.next_practice_at {
            DueStatus {
                urgency: Urgency::High,
                is_overdue: true,
                days_overdue: (now - self.next_practice_at).num_days(),
            }
        } else {
            let urgency = if self.next_practice_at - now <= Duration::days(1) {
                Urgency::Medium
            } else {
                Urgency::Low
            };
            DueStatus {
                urgency,
                is_overdue: false,
                days_overdue: 0,
            }
        }
    }
}

/// Record a practice session, creating the schedule on first practice.
pub fn record_practice(
    existing: Option<PracticeSchedule>,
    user_id: Uuid,
    subject: &str,
    topic: &str,
    accuracy: f64,
    config: &SchedulerConfig,
    now: DateTime<Utc>,
) -> PracticeSchedule {
    let mut schedule =
        existing.unwrap_or_else(|| PracticeSchedule::new(user_id, subject, topic, config, now));
    schedule.record_practice(accuracy, config, now);
    schedule
}

fn scale_interval(days: u32, factor: f64) -> u32 {
    let scaled = (f64::from(days) * factor).round();
    if scaled >= f64::from(MAX_INTERVAL_DAYS) {
        MAX_INTERVAL_DAYS
    } else {
        (scaled as u32).max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueStatus {
    pub urgency: Urgency,
    pub is_overdue: bool,
    pub days_overdue: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DueTopic {
    pub schedule: PracticeSchedule,
    pub status: DueStatus,
}

/// All schedules with their urgency, most urgent first.
pub fn due_topics(
    schedules: impl IntoIterator<Item = PracticeSchedule>,
    now: DateTime<Utc>,
) -> Vec<DueTopic> {
    let mut due: Vec<DueTopic> = schedules
        .into_iter()
        .map(|schedule| DueTopic {
            status: schedule.due_status(now),
            schedule,
        })
        .collect();
    due.sort_by(|a, b| match a.status.urgency.cmp(&b.status.urgency) {
        Ordering::Equal => a.schedule.next_practice_at.cmp(&b.schedule.next_practice_at),
        other => other,
    });
    due
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn schedule(now: DateTime<Utc>) -> PracticeSchedule {
        PracticeSchedule::new(Uuid::new_v4(), "math", "fractions", &SchedulerConfig::default(), now)
    }

    #[test]
    fn test_first_practice_defaults() {
        let now = Utc::now();
        let s = record_practice(
            None,
            Uuid::new_v4(),
            "math",
            "fractions",
            90.0,
            &SchedulerConfig::default(),
            now,
        );
        // defaults 2.5 / 1 day, then a strong session
        assert!((s.ease_factor - 2.6).abs() < 1e-9);
        assert_eq!(s.interval_days, 3);
        assert_eq!(s.review_count, 1);
        assert_eq!(s.last_practiced_at, Some(now));
        assert_eq!(s.last_performance, Some(90.0));
        assert_eq!(s.next_practice_at, now + Duration::days(3));
    }

    #[test]
    fn test_weak_session_resets_interval() {
        let now = Utc::now();
        let config = SchedulerConfig::default();
        let mut s = schedule(now);
        s.interval_days = 40;
        s.ease_factor = 2.5;
        s.record_practice(45.0, &config, now);
        assert_eq!(s.interval_days, 1);
        assert!((s.ease_factor - 2.3).abs() < 1e-9);
        assert_eq!(s.next_practice_at, now + Duration::days(1));
    }

    #[test]
    fn test_ease_never_below_minimum() {
        let now = Utc::now();
        let config = SchedulerConfig::default();
        let mut s = schedule(now);
        for _ in 0..20 {
            s.record_practice(10.0, &config, now);
        }
        assert!((s.ease_factor - 1.3).abs() < 1e-9);
        assert_eq!(s.review_count, 20);
    }

    #[test]
    fn test_moderate_session() {
        let now = Utc::now();
        let config = SchedulerConfig::default();
        let mut s = schedule(now);
        s.interval_days = 10;
        s.record_practice(60.0, &config, now);
        assert_eq!(s.interval_days, 12);
        assert!((s.ease_factor - 2.5).abs() < 1e-9);

        // 1 * 1.2 rounds back to the one-day floor
        let mut fresh = schedule(now);
        fresh.record_practice(60.0, &config, now);
        assert_eq!(fresh.interval_days, 1);
    }

    #[test]
    fn test_band_edges() {
        let now = Utc::now();
        let config = SchedulerConfig::default();

        let mut s = schedule(now);
        s.interval_days = 10;
        s.record_practice(80.0, &config, now);
        assert_eq!(s.interval_days, 26);

        let mut s = schedule(now);
        s.interval_days = 10;
        s.record_practice(50.0, &config, now);
        assert_eq!(s.interval_days, 12);

        let mut s = schedule(now);
        s.interval_days = 10;
        s.record_practice(49.9, &config, now);
        assert_eq!(s.interval_days, 1);
    }

    #[test]
    fn test_reset() {
        let now = Utc::now();
        let config = SchedulerConfig::default();
        let mut s = schedule(now);
        s.record_practice(95.0, &config, now);
        s.record_practice(95.0, &config, now);
        s.reset(&config, now);
        assert_eq!(s.interval_days, 1);
        assert_eq!(s.review_count, 0);
        assert_eq!(s.ease_factor, 2.5);
        assert_eq!(s.topic, "fractions");
        assert_eq!(s.last_practiced_at, None);
    }

    #[test]
    fn test_due_status() {
        let now = Utc::now();
        let mut s = schedule(now);

        s.next_practice_at = now - Duration::hours(60);
        let status = s.due_status(now);
        assert_eq!(status.urgency, Urgency::High);
        assert!(status.is_overdue);
        assert_eq!(status.days_overdue, 2);

        s.next_practice_at = now + Duration::hours(20);
        assert_eq!(s.due_status(now).urgency, Urgency::Medium);

        s.next_practice_at = now;
        assert_eq!(s.due_status(now).urgency, Urgency::Medium);
        assert!(!s.due_status(now).is_overdue);

        s.next_practice_at = now + Duration::days(3);
        assert_eq!(s.due_status(now).urgency, Urgency::Low);
    }

    #[test]
    fn test_due_topics_sorted_by_urgency() {
        let now = Utc::now();
        let mut later = schedule(now);
        later.topic = "later".to_string();
        later.next_practice_at = now + Duration::days(5);
        let mut soon = schedule(now);
        soon.topic = "soon".to_string();
        soon.next_practice_at = now + Duration::hours(3);
        let mut overdue = schedule(now);
        overdue.topic = "overdue".to_string();
        overdue.next_practice_at = now - Duration::days(1);
        let mut very_overdue = schedule(now);
        very_overdue.topic = "very_overdue".to_string();
        very_overdue.next_practice_at = now - Duration::days(4);

        let due = due_topics(vec![later, soon, overdue, very_overdue], now);
        let order: Vec<&str> = due.iter().map(|d| d.schedule.topic.as_str()).collect();
        assert_eq!(order, vec!["very_overdue", "overdue", "soon", "later"]);
    }

    #[test]
    fn test_config_validation() {
        assert!(SchedulerConfig::default().validate().is_ok());
        let bad = SchedulerConfig {
            min_ease: 3.0,
            ..SchedulerConfig::default()
        };
        assert!(bad.validate().is_err());
        let bad = SchedulerConfig {
            weak_accuracy: 90.0,
            ..SchedulerConfig::default()
        };
        assert!(bad.validate().is_err());
    }

    proptest! {
        #[test]
        fn prop_weak_accuracy_always_resets(prior in 1u32..1000, accuracy in 0.0f64..50.0) {
            let now = Utc::now();
            let mut s = schedule(now);
            s.interval_days = prior;
            s.record_practice(accuracy, &SchedulerConfig::default(), now);
            prop_assert_eq!(s.interval_days, 1);
            prop_assert!(s.ease_factor >= 1.3);
        }

        #[test]
        fn prop_strong_sessions_strictly_grow(accuracies in prop::collection::vec(80.0f64..=100.0, 1..12)) {
            let now = Utc::now();
            let config = SchedulerConfig::default();
            let mut s = schedule(now);
            let mut previous = s.interval_days;
            for accuracy in accuracies {
                s.record_practice(accuracy, &config, now);
                prop_assert!(s.interval_days > previous);
                previous = s.interval_days;
            }
        }
    }
}
