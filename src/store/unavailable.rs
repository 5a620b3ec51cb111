//! A [`PatternStore`] standing in for a backend that could not be opened.
//!
//! Every call fails with [`StoreError::Unavailable`], so the engine takes its
//! degraded path and still returns the pure result.

use super::{LearnedPattern, NewPattern, PatternQuery, PatternStore};
use crate::error::StoreError;

#[derive(Debug, Clone)]
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    fn fail<T>(&self) -> Result<T, StoreError> {
        Err(StoreError::Unavailable(self.reason.clone()))
    }
}

impl PatternStore for UnavailableStore {
    fn find_exact(&self, _: &str, _: &str, _: &str) -> Result<Option<LearnedPattern>, StoreError> {
        self.fail()
    }

    fn create(&self, _: &NewPattern) -> Result<LearnedPattern, StoreError> {
        self.fail()
    }

    fn reinforce(&self, _: &str) -> Result<LearnedPattern, StoreError> {
        self.fail()
    }

    fn list(&self, _: &PatternQuery) -> Result<Vec<LearnedPattern>, StoreError> {
        self.fail()
    }

    fn delete(&self, _: &str) -> Result<(), StoreError> {
        self.fail()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_call_reports_the_reason() {
        let store = UnavailableStore::new("disk full");
        match store.list(&PatternQuery::for_subject("u1")) {
            Err(StoreError::Unavailable(reason)) => assert_eq!(reason, "disk full"),
            other => panic!("expected unavailable, got {other:?}"),
        }
        assert!(store.find_exact("u1", "a", "b").is_err());
        assert!(store.delete("id").is_err());
    }
}
