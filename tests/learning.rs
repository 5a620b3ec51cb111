use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hebrew_polish::{
    DiffStrategy, EngineConfig, EngineError, LearnedPattern, LearningEngine, LearningStep,
    MemoryPatternStore, NewPattern, PatternQuery, PatternStore, PatternType, SqlitePatternStore,
    StoreError, UnavailableStore, Upserted, ValidationError,
};

/// Accepts a fixed number of upserts, then reports the backend as down.
struct FailingAfter {
    inner: MemoryPatternStore,
    remaining: AtomicUsize,
}

impl FailingAfter {
    fn new(writes: usize) -> Self {
        Self {
            inner: MemoryPatternStore::new(),
            remaining: AtomicUsize::new(writes),
        }
    }
}

impl PatternStore for FailingAfter {
    fn find_exact(
        &self,
        subject_id: &str,
        from: &str,
        to: &str,
    ) -> Result<Option<LearnedPattern>, StoreError> {
        self.inner.find_exact(subject_id, from, to)
    }

    fn create(&self, new: &NewPattern) -> Result<LearnedPattern, StoreError> {
        self.inner.create(new)
    }

    fn reinforce(&self, id: &str) -> Result<LearnedPattern, StoreError> {
        self.inner.reinforce(id)
    }

    fn list(&self, query: &PatternQuery) -> Result<Vec<LearnedPattern>, StoreError> {
        self.inner.list(query)
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.inner.delete(id)
    }

    fn upsert(&self, new: &NewPattern) -> Result<Upserted, StoreError> {
        let left = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if left.is_err() {
            return Err(StoreError::Unavailable("write quota exhausted".to_string()));
        }
        self.inner.upsert(new)
    }
}

fn memory_engine() -> (Arc<MemoryPatternStore>, LearningEngine) {
    let store = Arc::new(MemoryPatternStore::new());
    let engine = LearningEngine::new(store.clone(), EngineConfig::default());
    (store, engine)
}

#[test]
fn learned_correction_is_applied_to_new_text() {
    let (_, engine) = memory_engine();
    let outcome = engine
        .learn("u1", "אני רוצה ללכת", "אני מעדיף ללכת")
        .unwrap();
    assert_eq!(outcome.learning, LearningStep::Completed);
    assert!(outcome
        .created
        .iter()
        .any(|p| p.from == "רוצה" && p.to == "מעדיף" && p.confidence == 0.8));
    assert!(outcome.reinforced.is_empty());

    let applied = engine.apply_learned("u1", "אני רוצה לאכול");
    assert_eq!(applied.learning, LearningStep::Completed);
    assert_eq!(applied.outcome.corrected_text, "אני מעדיף לאכול");
    assert!(!applied.outcome.applied_patterns.is_empty());
}

#[test]
fn repeated_correction_reinforces() {
    let (store, engine) = memory_engine();
    let first = engine
        .learn("u1", "אני רוצה ללכת", "אני מעדיף ללכת")
        .unwrap();
    let second = engine
        .learn("u1", "אני רוצה ללכת", "אני מעדיף ללכת")
        .unwrap();
    assert!(second.created.is_empty());
    assert_eq!(second.reinforced.len(), first.created.len());

    let word = store
        .find_exact("u1", "רוצה", "מעדיף")
        .unwrap()
        .expect("word pattern stored");
    assert_eq!(word.occurrences, 2);
    assert_eq!(word.confidence, (0.8_f64 + 0.1).min(1.0));

    let phrase = store
        .find_exact("u1", "אני רוצה", "אני מעדיף")
        .unwrap()
        .expect("phrase pattern stored");
    assert_eq!(phrase.occurrences, 2);
    assert_eq!(phrase.confidence, (0.9_f64 + 0.1).min(1.0));
}

#[test]
fn subjects_do_not_share_patterns() {
    let (_, engine) = memory_engine();
    engine.learn("u1", "על מנת לנצח", "כדי לנצח").unwrap();
    let applied = engine.apply_learned("u2", "על מנת לנצח");
    assert_eq!(applied.outcome.corrected_text, "על מנת לנצח");
    assert!(applied.outcome.applied_patterns.is_empty());
}

#[test]
fn empty_input_is_rejected_before_learning() {
    let (store, engine) = memory_engine();
    assert_eq!(
        engine.learn("u1", "", "משהו").unwrap_err(),
        ValidationError::EmptyText { field: "original" }
    );
    assert_eq!(
        engine.learn("u1", "משהו", "   ").unwrap_err(),
        ValidationError::EmptyText { field: "corrected" }
    );
    assert_eq!(
        engine.learn("", "א", "ב").unwrap_err(),
        ValidationError::EmptyText { field: "subject" }
    );
    assert!(store.is_empty());
}

#[test]
fn curated_save_seeds_high_confidence() {
    let (_, engine) = memory_engine();
    let saved = engine
        .save_pattern("u1", "לשלב הבא", "הלאה", Some("לקחת את זה לשלב הבא"))
        .unwrap();
    assert!(saved.is_created());
    assert_eq!(saved.pattern().confidence, 0.8);
    assert_eq!(saved.pattern().pattern_type, PatternType::PhraseReplacement);
    assert_eq!(saved.pattern().context.as_deref(), Some("לקחת את זה לשלב הבא"));

    let again = engine.save_pattern("u1", "לשלב הבא", "הלאה", None).unwrap();
    assert!(matches!(again, Upserted::Reinforced(_)));
    assert_eq!(again.pattern().occurrences, 2);
}

#[test]
fn curated_save_rejects_malformed_pairs() {
    let (store, engine) = memory_engine();
    for (from, to) in [("", "x"), ("x", " "), ("כדי", "כדי")] {
        let err = engine.save_pattern("u1", from, to, None).unwrap_err();
        assert!(
            matches!(
                err,
                EngineError::Validation(ValidationError::MalformedPattern { .. })
            ),
            "expected malformed pattern for {from:?} -> {to:?}"
        );
    }
    assert!(store.is_empty());
}

#[test]
fn low_confidence_patterns_stay_suggestions() {
    let (store, engine) = memory_engine();
    store
        .create(&NewPattern {
            subject_id: "u1".to_string(),
            from: "על מנת".to_string(),
            to: "כדי".to_string(),
            pattern_type: PatternType::PhraseReplacement,
            confidence: 0.5,
            context: None,
        })
        .unwrap();
    let applied = engine.apply_learned("u1", "על מנת לנצח");
    assert_eq!(applied.outcome.corrected_text, "על מנת לנצח");

    let listed = engine.patterns("u1", 0.0, None).unwrap();
    assert_eq!(listed.len(), 1);
}

#[test]
fn store_outage_degrades_instead_of_failing() {
    let engine = LearningEngine::new(
        Arc::new(UnavailableStore::new("connection refused")),
        EngineConfig::default(),
    );

    let learned = engine
        .learn("u1", "אני רוצה ללכת", "אני מעדיף ללכת")
        .unwrap();
    assert!(learned.learning.is_degraded());
    assert!(!learned.learning.is_partial());
    assert!(!learned.candidates.is_empty());
    assert!(learned.created.is_empty());

    let applied = engine.apply_learned("u1", "על מנת לנצח");
    assert!(applied.learning.is_degraded());
    assert_eq!(applied.outcome.corrected_text, "על מנת לנצח");

    let polished = engine.polish("u1", "על מנת לנצח");
    assert!(polished.applied.learning.is_degraded());
    assert_eq!(polished.analysis.score, 92);

    assert!(matches!(
        engine.save_pattern("u1", "על מנת", "כדי", None),
        Err(EngineError::Store(StoreError::Unavailable(_)))
    ));
    assert!(engine.stats("u1").is_err());
}

#[test]
fn store_failure_midway_marks_learning_partial() {
    let store = Arc::new(FailingAfter::new(1));
    let engine = LearningEngine::new(store.clone(), EngineConfig::default());
    let outcome = engine
        .learn("u1", "אני רוצה ללכת", "אני מעדיף ללכת")
        .unwrap();

    assert_eq!(outcome.candidates.len(), 3);
    assert_eq!(outcome.created.len(), 1);
    assert!(outcome.reinforced.is_empty());
    assert!(outcome.learning.is_degraded());
    assert!(outcome.learning.is_partial());
    // The write that landed stays persisted.
    assert_eq!(store.inner.len(), 1);
}

#[test]
fn polish_scores_the_rewritten_text() {
    let (_, engine) = memory_engine();
    engine.save_pattern("u1", "על מנת", "כדי", None).unwrap();
    let polished = engine.polish("u1", "על מנת לנצח");
    assert_eq!(polished.applied.outcome.corrected_text, "כדי לנצח");
    assert_eq!(polished.analysis.score, 100);
    assert!(polished.analysis.issues.is_empty());
}

#[test]
fn deleted_patterns_stop_applying() {
    let (_, engine) = memory_engine();
    let saved = engine.save_pattern("u1", "על מנת", "כדי", None).unwrap();
    engine.delete_pattern(&saved.pattern().id).unwrap();
    let applied = engine.apply_learned("u1", "על מנת לנצח");
    assert_eq!(applied.outcome.corrected_text, "על מנת לנצח");
    assert!(matches!(
        engine.delete_pattern(&saved.pattern().id),
        Err(EngineError::Store(StoreError::NotFound(_)))
    ));
}

#[test]
fn aligned_strategy_learns_phrase_rewrites() {
    let store = Arc::new(MemoryPatternStore::new());
    let config = EngineConfig {
        diff_strategy: DiffStrategy::Aligned,
        ..EngineConfig::default()
    };
    let engine = LearningEngine::new(store.clone(), config);
    let outcome = engine
        .learn("u1", "על מנת להצליח צריך לעבוד", "כדי להצליח צריך לעבוד")
        .unwrap();
    assert_eq!(outcome.created.len(), 1);
    assert_eq!(outcome.created[0].from, "על מנת");
    assert_eq!(outcome.created[0].confidence, 0.9);

    let applied = engine.apply_learned("u1", "על מנת לנצח");
    assert_eq!(applied.outcome.corrected_text, "כדי לנצח");
}

#[test]
fn stats_summarise_subject_patterns() {
    let (_, engine) = memory_engine();
    engine.save_pattern("u1", "על מנת", "כדי", None).unwrap();
    engine.save_pattern("u1", "על מנת", "כדי", None).unwrap();
    engine.save_pattern("u1", "פידבק", "משוב", None).unwrap();

    let stats = engine.stats("u1").unwrap();
    assert_eq!(stats.total_patterns, 2);
    assert_eq!(stats.auto_applicable, 2);
    assert_eq!(stats.total_occurrences, 3);
    assert!(stats.mean_confidence > 0.8 && stats.mean_confidence < 0.9);

    let empty = engine.stats("nobody").unwrap();
    assert_eq!(empty.total_patterns, 0);
    assert_eq!(empty.mean_confidence, 0.0);
}

#[test]
fn sqlite_engine_round_trip() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("patterns.sqlite");
    {
        let engine = LearningEngine::new(
            Arc::new(SqlitePatternStore::open_at(&path)?),
            EngineConfig::default(),
        );
        engine.learn("u1", "אני רוצה ללכת", "אני מעדיף ללכת")?;
        engine.learn("u1", "אני רוצה ללכת", "אני מעדיף ללכת")?;
    }

    let engine = LearningEngine::new(
        Arc::new(SqlitePatternStore::open_at(&path)?),
        EngineConfig::default(),
    );
    let patterns = engine.patterns("u1", 0.7, None)?;
    assert_eq!(patterns.len(), 3);
    assert!(patterns.iter().all(|p| p.occurrences == 2));
    // Phrases started higher, so they rank first.
    assert_eq!(patterns[0].pattern_type, PatternType::PhraseReplacement);

    let applied = engine.apply_learned("u1", "אני רוצה לאכול");
    assert_eq!(applied.outcome.corrected_text, "אני מעדיף לאכול");
    Ok(())
}

#[test]
fn concurrent_learning_keeps_every_reinforcement() {
    let (store, engine) = memory_engine();
    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..10 {
                    let outcome = engine.learn("u1", "על מנת", "כדי").unwrap();
                    assert_eq!(outcome.learning, LearningStep::Completed);
                }
            });
        }
    });
    // Positional diff of these two texts yields only "על" -> "כדי".
    let pattern = store
        .find_exact("u1", "על", "כדי")
        .unwrap()
        .expect("pattern stored");
    assert_eq!(pattern.occurrences, 40);
    assert_eq!(pattern.confidence, 1.0);
}
