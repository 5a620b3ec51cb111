//! # hebrew-polish
//!
//! Flags Hebrew that reads like machine translation and learns reusable
//! replacement rules from user corrections.
//!
//! - [`analyze`] scores text against the built-in [`RuleCorpus`].
//! - [`extract`] diffs an (original, corrected) pair into candidate rules.
//! - [`apply`] rewrites text with learned patterns.
//! - [`LearningEngine`] ties them to a [`PatternStore`].

pub mod analyzer;
pub mod applier;
pub mod config;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod store;
mod text;

pub use analyzer::{analyze, AnalysisResult, Analyzer, Issue};
pub use applier::{apply, AppliedPattern, Applier, ApplyOutcome};
pub use config::{Config, EngineConfig};
pub use corpus::{Category, Matcher, Rule, RuleCorpus, RuleSpec};
pub use engine::{
    ApplyLearnedOutcome, LearnOutcome, LearningEngine, LearningStats, LearningStep, PolishOutcome,
};
pub use error::{ConfigError, CorpusError, EngineError, StoreError, ValidationError};
pub use extractor::{extract, DiffStrategy, Extractor, PatternCandidate, PatternType};
pub use store::{
    LearnedPattern, MemoryPatternStore, NewPattern, PatternQuery, PatternStore,
    SqlitePatternStore, UnavailableStore, Upserted,
};
