//! In-memory [`PatternStore`] for tests and single-process use.
//!
//! All state sits behind one `parking_lot::Mutex`, so `upsert` is atomic with
//! respect to other callers.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use super::{rank, LearnedPattern, NewPattern, PatternQuery, PatternStore, Upserted};
use crate::error::StoreError;

type Key = (String, String, String);

#[derive(Default)]
struct Inner {
    by_id: HashMap<String, LearnedPattern>,
    by_key: HashMap<Key, String>,
}

impl Inner {
    fn insert(&mut self, new: &NewPattern) -> LearnedPattern {
        let now = Utc::now();
        let pattern = LearnedPattern {
            id: Uuid::new_v4().to_string(),
            subject_id: new.subject_id.clone(),
            from: new.from.clone(),
            to: new.to.clone(),
            pattern_type: new.pattern_type,
            confidence: new.seed_confidence(),
            occurrences: 1,
            context: new.context.clone(),
            created_at: now,
            updated_at: now,
        };
        self.by_key.insert(key_of(&pattern), pattern.id.clone());
        self.by_id.insert(pattern.id.clone(), pattern.clone());
        pattern
    }

    fn reinforce(&mut self, id: &str) -> Result<LearnedPattern, StoreError> {
        let pattern = self
            .by_id
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        pattern.confidence = LearnedPattern::reinforced_confidence(pattern.confidence);
        pattern.occurrences += 1;
        pattern.updated_at = Utc::now();
        Ok(pattern.clone())
    }
}

fn key_of(p: &LearnedPattern) -> Key {
    (p.subject_id.clone(), p.from.clone(), p.to.clone())
}

fn key(subject_id: &str, from: &str, to: &str) -> Key {
    (subject_id.to_string(), from.to_string(), to.to_string())
}

#[derive(Default)]
pub struct MemoryPatternStore {
    inner: Mutex<Inner>,
}

impl MemoryPatternStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PatternStore for MemoryPatternStore {
    fn find_exact(
        &self,
        subject_id: &str,
        from: &str,
        to: &str,
    ) -> Result<Option<LearnedPattern>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .by_key
            .get(&key(subject_id, from, to))
            .and_then(|id| inner.by_id.get(id))
            .cloned())
    }

    fn create(&self, new: &NewPattern) -> Result<LearnedPattern, StoreError> {
        let mut inner = self.inner.lock();
        if let Some(id) = inner.by_key.get(&key(&new.subject_id, &new.from, &new.to)) {
            return Err(StoreError::Conflict(id.clone()));
        }
        Ok(inner.insert(new))
    }

    fn reinforce(&self, id: &str) -> Result<LearnedPattern, StoreError> {
        self.inner.lock().reinforce(id)
    }

    fn list(&self, query: &PatternQuery) -> Result<Vec<LearnedPattern>, StoreError> {
        let inner = self.inner.lock();
        let mut patterns: Vec<LearnedPattern> = inner
            .by_id
            .values()
            .filter(|p| p.subject_id == query.subject_id && p.confidence >= query.min_confidence)
            .cloned()
            .collect();
        patterns.sort_by(rank);
        if let Some(limit) = query.limit {
            patterns.truncate(limit);
        }
        Ok(patterns)
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let removed = inner
            .by_id
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        inner.by_key.remove(&key_of(&removed));
        Ok(())
    }

    fn upsert(&self, new: &NewPattern) -> Result<Upserted, StoreError> {
        let mut inner = self.inner.lock();
        let existing = inner
            .by_key
            .get(&key(&new.subject_id, &new.from, &new.to))
            .cloned();
        match existing {
            Some(id) => inner.reinforce(&id).map(Upserted::Reinforced),
            None => Ok(Upserted::Created(inner.insert(new))),
        }
    }
}
