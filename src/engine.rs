//! Learning engine: wires the pure components to a [`PatternStore`].
//!
//! The store is the only fallible dependency. Operations on the user-visible
//! path ([`learn`](LearningEngine::learn), [`apply_learned`](LearningEngine::apply_learned),
//! [`polish`](LearningEngine::polish)) never fail because of it: they return
//! their pure result with [`LearningStep::Skipped`] instead. Pattern
//! management calls surface store errors as [`EngineError`].

use std::sync::Arc;

use serde::Serialize;

use crate::analyzer::{AnalysisResult, Analyzer};
use crate::applier::{Applier, ApplyOutcome};
use crate::config::EngineConfig;
use crate::error::{EngineError, StoreError, ValidationError};
use crate::extractor::{Extractor, PatternCandidate, PatternType};
use crate::store::{LearnedPattern, NewPattern, PatternQuery, PatternStore, Upserted};
use crate::text::is_blank;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum LearningStep {
    Completed,
    /// The store failed. `partial` is set when some writes landed before the
    /// failure; those are the ones reported in the outcome.
    Skipped { reason: String, partial: bool },
}

impl LearningStep {
    fn skipped(err: &StoreError) -> Self {
        LearningStep::Skipped {
            reason: err.to_string(),
            partial: false,
        }
    }

    fn skipped_after_writes(err: &StoreError, writes: usize) -> Self {
        LearningStep::Skipped {
            reason: err.to_string(),
            partial: writes > 0,
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, LearningStep::Skipped { partial: true, .. })
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, LearningStep::Skipped { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnOutcome {
    pub candidates: Vec<PatternCandidate>,
    pub created: Vec<LearnedPattern>,
    pub reinforced: Vec<LearnedPattern>,
    pub learning: LearningStep,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyLearnedOutcome {
    #[serde(flatten)]
    pub outcome: ApplyOutcome,
    pub learning: LearningStep,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolishOutcome {
    pub applied: ApplyLearnedOutcome,
    pub analysis: AnalysisResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningStats {
    pub total_patterns: usize,
    pub auto_applicable: usize,
    pub total_occurrences: u64,
    pub mean_confidence: f64,
}

pub struct LearningEngine {
    store: Arc<dyn PatternStore>,
    analyzer: Analyzer,
    extractor: Extractor,
    applier: Applier,
    config: EngineConfig,
}

impl LearningEngine {
    pub fn new(store: Arc<dyn PatternStore>, config: EngineConfig) -> Self {
        Self::with_analyzer(store, config, Analyzer::default())
    }

    pub fn with_analyzer(
        store: Arc<dyn PatternStore>,
        config: EngineConfig,
        analyzer: Analyzer,
    ) -> Self {
        Self {
            store,
            analyzer,
            extractor: Extractor::new(config.diff_strategy)
                .with_max_phrase_words(config.max_phrase_words),
            applier: Applier::new(config.apply_threshold),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn analyze(&self, text: &str) -> AnalysisResult {
        self.analyzer.analyze(text)
    }

    pub fn extract(&self, original: &str, corrected: &str) -> Vec<PatternCandidate> {
        self.extractor.extract(original, corrected)
    }

    /// Learn from one user correction.
    ///
    /// Upserts are not rolled back when the store fails partway through:
    /// `created` and `reinforced` then hold what was persisted and the step
    /// is marked partial.
    pub fn learn(
        &self,
        subject_id: &str,
        original: &str,
        corrected: &str,
    ) -> Result<LearnOutcome, ValidationError> {
        require_text("subject", subject_id)?;
        require_text("original", original)?;
        require_text("corrected", corrected)?;

        let candidates = self.extractor.extract(original, corrected);
        let mut created = Vec::new();
        let mut reinforced = Vec::new();
        let mut learning = LearningStep::Completed;

        for candidate in &candidates {
            match self.store.upsert(&NewPattern::from_candidate(subject_id, candidate)) {
                Ok(Upserted::Created(p)) => {
                    log::info!("Learned pattern '{}' -> '{}' for {}", p.from, p.to, subject_id);
                    created.push(p);
                }
                Ok(Upserted::Reinforced(p)) => {
                    log::debug!(
                        "Reinforced pattern '{}' -> '{}' to {:.2}",
                        p.from,
                        p.to,
                        p.confidence
                    );
                    reinforced.push(p);
                }
                Err(err) => {
                    log::warn!("Skipping learning step for {subject_id}: {err}");
                    learning =
                        LearningStep::skipped_after_writes(&err, created.len() + reinforced.len());
                    break;
                }
            }
        }

        Ok(LearnOutcome {
            candidates,
            created,
            reinforced,
            learning,
        })
    }

    /// Save a pattern the user chose by hand. Seeded at the curated
    /// confidence, or reinforced if it already exists.
    pub fn save_pattern(
        &self,
        subject_id: &str,
        from: &str,
        to: &str,
        context: Option<&str>,
    ) -> Result<Upserted, EngineError> {
        require_text("subject", subject_id)?;
        let from = from.trim();
        let to = to.trim();
        if from.is_empty() || to.is_empty() || from == to {
            return Err(ValidationError::MalformedPattern {
                from: from.to_string(),
                to: to.to_string(),
            }
            .into());
        }

        let new = NewPattern {
            subject_id: subject_id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            pattern_type: PatternType::for_span(from),
            confidence: self.config.curated_confidence,
            context: context.map(str::to_string),
        };
        let upserted = self.store.upsert(&new)?;
        if upserted.is_created() {
            log::info!("Saved pattern '{from}' -> '{to}' for {subject_id}");
        }
        Ok(upserted)
    }

    /// Rewrite freshly generated text with the subject's learned patterns.
    pub fn apply_learned(&self, subject_id: &str, text: &str) -> ApplyLearnedOutcome {
        let query = PatternQuery::for_subject(subject_id)
            .min_confidence(self.config.apply_threshold)
            .limit(self.config.apply_limit);
        match self.store.list(&query) {
            Ok(patterns) => ApplyLearnedOutcome {
                outcome: self.applier.apply(text, &patterns),
                learning: LearningStep::Completed,
            },
            Err(err) => {
                log::warn!("Returning text without learned patterns for {subject_id}: {err}");
                ApplyLearnedOutcome {
                    outcome: ApplyOutcome::unchanged(text),
                    learning: LearningStep::skipped(&err),
                }
            }
        }
    }

    /// Apply learned patterns, then score the result.
    pub fn polish(&self, subject_id: &str, text: &str) -> PolishOutcome {
        let applied = self.apply_learned(subject_id, text);
        let analysis = self.analyzer.analyze(&applied.outcome.corrected_text);
        PolishOutcome { applied, analysis }
    }

    pub fn patterns(
        &self,
        subject_id: &str,
        min_confidence: f64,
        limit: Option<usize>,
    ) -> Result<Vec<LearnedPattern>, EngineError> {
        let mut query = PatternQuery::for_subject(subject_id).min_confidence(min_confidence);
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        Ok(self.store.list(&query)?)
    }

    pub fn delete_pattern(&self, id: &str) -> Result<(), EngineError> {
        self.store.delete(id)?;
        log::info!("Deleted pattern {id}");
        Ok(())
    }

    pub fn stats(&self, subject_id: &str) -> Result<LearningStats, EngineError> {
        let patterns = self.store.list(&PatternQuery::for_subject(subject_id))?;
        let total_patterns = patterns.len();
        let auto_applicable = patterns
            .iter()
            .filter(|p| p.confidence >= self.config.apply_threshold)
            .count();
        let total_occurrences = patterns.iter().map(|p| u64::from(p.occurrences)).sum();
        let mean_confidence = if total_patterns == 0 {
            0.0
        } else {
            patterns.iter().map(|p| p.confidence).sum::<f64>() / total_patterns as f64
        };
        Ok(LearningStats {
            total_patterns,
            auto_applicable,
            total_occurrences,
            mean_confidence,
        })
    }
}

fn require_text(field: &'static str, text: &str) -> Result<(), ValidationError> {
    if is_blank(text) {
        return Err(ValidationError::EmptyText { field });
    }
    Ok(())
}
