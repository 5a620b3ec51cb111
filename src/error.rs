//! Error types for the polishing engine.
//!
//! The pure components (corpus matching, analysis, extraction, application)
//! never fail on string input. Errors only come from validating caller input,
//! from loading corpora or config files, and from the pattern store.

use thiserror::Error;

/// Input rejected before any analysis or learning happens.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required text is empty: {field}")]
    EmptyText { field: &'static str },

    #[error("Malformed pattern: '{from}' -> '{to}'")]
    MalformedPattern { from: String, to: String },
}

/// Failures from a [`PatternStore`](crate::store::PatternStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Pattern not found: {0}")]
    NotFound(String),

    #[error("Pattern already exists: {0}")]
    Conflict(String),

    #[error("Pattern store unavailable: {0}")]
    Unavailable(String),
}

/// Failures while building a rule corpus.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("Invalid pattern for rule '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Rule pattern is empty")]
    EmptyPattern,

    #[error("Failed to parse corpus file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Hard failures of explicit engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
