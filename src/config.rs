use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::applier::DEFAULT_APPLY_THRESHOLD;
use crate::error::ConfigError;
use crate::extractor::DiffStrategy;

pub const CONFIG_ENV: &str = "HEBREW_POLISH_CONFIG";
pub const DB_PATH_ENV: &str = "HEBREW_POLISH_DB_PATH";
const APP_DIR_NAME: &str = "hebrew-polish";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub engine: EngineConfig,
    pub corpus: CorpusConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub apply_threshold: f64,
    /// Maximum number of patterns pulled from the store per apply.
    pub apply_limit: usize,
    /// Seed confidence for patterns saved explicitly by the user.
    pub curated_confidence: f64,
    pub diff_strategy: DiffStrategy,
    /// Longest replaced span, in words, kept by the aligned diff.
    pub max_phrase_words: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            apply_threshold: DEFAULT_APPLY_THRESHOLD,
            apply_limit: 100,
            curated_confidence: 0.8,
            diff_strategy: DiffStrategy::Positional,
            max_phrase_words: 6,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// Extra rules in TOML; see [`RuleCorpus::from_toml_str`](crate::corpus::RuleCorpus::from_toml_str).
    pub path: Option<PathBuf>,
}

impl Config {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    /// Load from an explicit path, `HEBREW_POLISH_CONFIG`, or the data dir.
    /// `HEBREW_POLISH_DB_PATH` wins over the file's database path.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(explicit, |key| std::env::var_os(key))
    }

    /// [`Config::load`] with environment lookups routed through `env`.
    pub fn load_with_env<F>(explicit: Option<&Path>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => env(CONFIG_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| app_data_dir().join("config.toml")),
        };
        let mut config = Self::load_from(&path)?;
        if let Some(db) = env(DB_PATH_ENV) {
            config.database.path = PathBuf::from(db);
        }
        Ok(config)
    }
}

pub fn default_db_path() -> PathBuf {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        return PathBuf::from(path);
    }
    app_data_dir().join("patterns.sqlite")
}

fn app_data_dir() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_DATA_HOME") {
        return PathBuf::from(xdg).join(APP_DIR_NAME);
    }
    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR_NAME);
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(format!(".{APP_DIR_NAME}"))
}
