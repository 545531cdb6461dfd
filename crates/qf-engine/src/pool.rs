//! Read-only question pool for one subject, grouped by topic and level.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;
use crate::question::Question;

/// Snapshot of the questions a session may draw from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionPool {
    subject: String,
    topics: BTreeMap<String, BTreeMap<u32, Vec<Question>>>,
}

impl QuestionPool {
    /// Build a pool, validating every question on the way in.
    pub fn from_questions(
        subject: impl Into<String>,
        questions: impl IntoIterator<Item = Question>,
    ) -> Result<Self, EngineError> {
        let mut pool = Self {
            subject: subject.into(),
            topics: BTreeMap::new(),
        };

        for question in questions {
            question.validate()?;
            pool.topics
                .entry(question.topic.clone())
                .or_default()
                .entry(question.level)
                .or_default()
                .push(question);
        }

        Ok(pool)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.topics.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.topics
            .values()
            .flat_map(BTreeMap::values)
            .map(Vec::len)
            .sum()
    }

    /// Questions of one topic at one level. Empty when either is unknown.
    pub fn level_questions(&self, topic: &str, level: u32) -> &[Question] {
        self.topics
            .get(topic)
            .and_then(|levels| levels.get(&level))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Questions at `level` across several topics, in topic order.
    pub fn questions_at_level<'a, S: AsRef<str>>(
        &'a self,
        topics: &[S],
        level: u32,
    ) -> Vec<&'a Question> {
        topics
            .iter()
            .flat_map(|topic| self.level_questions(topic.as_ref(), level))
            .collect()
    }

    /// Highest level with at least one question for `topic`.
    pub fn max_level(&self, topic: &str) -> Option<u32> {
        self.topics
            .get(topic)
            .and_then(|levels| levels.keys().next_back().copied())
    }

    /// Levels of `topic` holding at least one question, ascending.
    pub fn levels(&self, topic: &str) -> Vec<u32> {
        self.topics
            .get(topic)
            .map(|levels| levels.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Levels holding at least one question in any of `topics`, ascending.
    pub fn levels_for<S: AsRef<str>>(&self, topics: &[S]) -> Vec<u32> {
        let levels: BTreeSet<u32> = topics
            .iter()
            .flat_map(|topic| self.levels(topic.as_ref()))
            .collect();
        levels.into_iter().collect()
    }

    /// Highest level available across `topics`.
    pub fn max_level_for<S: AsRef<str>>(&self, topics: &[S]) -> Option<u32> {
        topics
            .iter()
            .filter_map(|topic| self.max_level(topic.as_ref()))
            .max()
    }

    pub fn find(&self, id: Uuid) -> Option<&Question> {
        self.topics
            .values()
            .flat_map(BTreeMap::values)
            .flatten()
            .find(|q| q.id == id)
    }

    /// Keep only the given topics.
    pub fn restrict<S: AsRef<str>>(&self, topics: &[S]) -> Self {
        Self {
            subject: self.subject.clone(),
            topics: self
                .topics
                .iter()
                .filter(|(name, _)| topics.iter().any(|t| t.as_ref() == name.as_str()))
                .map(|(name, levels)| (name.clone(), levels.clone()))
                .collect(),
        }
    }
}
