//! Persistence for learned patterns.
//!
//! The [`PatternStore`] trait is the only fallible boundary of the engine.
//! Backends must keep `(subject_id, from, to)` unique and must never lose a
//! reinforcement to a concurrent one: both bundled backends implement
//! [`PatternStore::upsert`] as a single atomic step.
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`find_exact`](PatternStore::find_exact) | Look up a pattern by its unique key |
//! | [`create`](PatternStore::create) | Insert a new pattern with a seed confidence |
//! | [`reinforce`](PatternStore::reinforce) | Bump confidence and occurrences |
//! | [`list`](PatternStore::list) | Ranked patterns for a subject |
//! | [`delete`](PatternStore::delete) | Remove a pattern |
//! | [`upsert`](PatternStore::upsert) | Create or reinforce |

pub mod memory;
pub mod sqlite;
pub mod unavailable;

pub use memory::MemoryPatternStore;
pub use sqlite::SqlitePatternStore;
pub use unavailable::UnavailableStore;

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::extractor::{PatternCandidate, PatternType};

/// Confidence added per reinforcement.
pub const REINFORCEMENT_STEP: f64 = 0.1;
pub const MAX_CONFIDENCE: f64 = 1.0;

/// A learned `from -> to` replacement scoped to one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnedPattern {
    pub id: String,
    pub subject_id: String,
    pub from: String,
    pub to: String,
    pub pattern_type: PatternType,
    pub confidence: f64,
    pub occurrences: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LearnedPattern {
    /// Confidence after one more reinforcement.
    pub fn reinforced_confidence(confidence: f64) -> f64 {
        (confidence + REINFORCEMENT_STEP).min(MAX_CONFIDENCE)
    }
}

/// Input for creating a pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPattern {
    pub subject_id: String,
    pub from: String,
    pub to: String,
    pub pattern_type: PatternType,
    pub confidence: f64,
    pub context: Option<String>,
}

impl NewPattern {
    /// Seed a pattern from an extracted candidate, keeping its confidence.
    pub fn from_candidate(subject_id: &str, candidate: &PatternCandidate) -> Self {
        Self {
            subject_id: subject_id.to_string(),
            from: candidate.from.clone(),
            to: candidate.to.clone(),
            pattern_type: candidate.pattern_type,
            confidence: candidate.confidence,
            context: candidate.context.clone(),
        }
    }

    pub(crate) fn seed_confidence(&self) -> f64 {
        self.confidence.clamp(0.0, MAX_CONFIDENCE)
    }
}

/// Filter for [`PatternStore::list`].
#[derive(Debug, Clone, PartialEq)]
pub struct PatternQuery {
    pub subject_id: String,
    pub min_confidence: f64,
    pub limit: Option<usize>,
}

impl PatternQuery {
    pub fn for_subject(subject_id: &str) -> Self {
        Self {
            subject_id: subject_id.to_string(),
            min_confidence: 0.0,
            limit: None,
        }
    }

    pub fn min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Outcome of an upsert.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "pattern", rename_all = "lowercase")]
pub enum Upserted {
    Created(LearnedPattern),
    Reinforced(LearnedPattern),
}

impl Upserted {
    pub fn pattern(&self) -> &LearnedPattern {
        match self {
            Upserted::Created(p) | Upserted::Reinforced(p) => p,
        }
    }

    pub fn into_pattern(self) -> LearnedPattern {
        match self {
            Upserted::Created(p) | Upserted::Reinforced(p) => p,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Upserted::Created(_))
    }
}

/// Ranking used by [`PatternStore::list`]: confidence, then occurrences,
/// then recency, then id, all descending. Total, so every backend returns
/// the same order for the same rows.
pub fn rank(a: &LearnedPattern, b: &LearnedPattern) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| b.occurrences.cmp(&a.occurrences))
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| b.id.cmp(&a.id))
}

pub trait PatternStore: Send + Sync {
    fn find_exact(
        &self,
        subject_id: &str,
        from: &str,
        to: &str,
    ) -> Result<Option<LearnedPattern>, StoreError>;

    fn create(&self, new: &NewPattern) -> Result<LearnedPattern, StoreError>;

    /// Set `confidence = min(1, confidence + 0.1)`, add one occurrence and
    /// touch `updated_at`.
    fn reinforce(&self, id: &str) -> Result<LearnedPattern, StoreError>;

    fn list(&self, query: &PatternQuery) -> Result<Vec<LearnedPattern>, StoreError>;

    fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Reinforce the pattern with the same key, or create it.
    ///
    /// This default is not atomic; backends shared between threads or
    /// processes override it.
    fn upsert(&self, new: &NewPattern) -> Result<Upserted, StoreError> {
        match self.find_exact(&new.subject_id, &new.from, &new.to)? {
            Some(existing) => self.reinforce(&existing.id).map(Upserted::Reinforced),
            None => self.create(new).map(Upserted::Created),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(id: &str, created_at: DateTime<Utc>) -> LearnedPattern {
        LearnedPattern {
            id: id.to_string(),
            subject_id: "u1".to_string(),
            from: "a".to_string(),
            to: "b".to_string(),
            pattern_type: PatternType::WordReplacement,
            confidence: 0.8,
            occurrences: 1,
            context: None,
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn rank_breaks_full_ties_by_id() {
        let now = Utc::now();
        let a = pattern("aaa", now);
        let b = pattern("bbb", now);
        assert_eq!(rank(&a, &b), Ordering::Greater);
        assert_eq!(rank(&b, &a), Ordering::Less);
        assert_eq!(rank(&a, &a), Ordering::Equal);

        let mut listed = vec![a.clone(), b.clone()];
        listed.sort_by(rank);
        assert_eq!(listed[0].id, "bbb");
    }
}
