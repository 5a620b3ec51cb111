use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use hebrew_polish::{
    Analyzer, Config, DiffStrategy, Extractor, LearningEngine, PatternStore, RuleCorpus,
    SqlitePatternStore, UnavailableStore,
};

#[derive(Parser)]
#[command(
    name = "hebrew-polish",
    about = "Detect machine-translated Hebrew and learn from corrections",
    version
)]
struct Cli {
    /// Config file (defaults to $HEBREW_POLISH_CONFIG or the data dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Pattern database (overrides the config file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Score text; reads stdin if no files are given
    Analyze { files: Vec<PathBuf> },
    /// Print candidate patterns for an (original, corrected) pair
    Extract {
        #[arg(long)]
        original: PathBuf,
        #[arg(long)]
        corrected: PathBuf,
        /// Use the word-aligned diff instead of positional comparison
        #[arg(long)]
        aligned: bool,
    },
    /// Learn patterns from a correction
    Learn {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        original: PathBuf,
        #[arg(long)]
        corrected: PathBuf,
    },
    /// Save a hand-picked pattern
    Save {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// Rewrite text with learned patterns
    Apply {
        #[arg(long)]
        subject: String,
        file: Option<PathBuf>,
    },
    /// Apply learned patterns, then score the result
    Polish {
        #[arg(long)]
        subject: String,
        file: Option<PathBuf>,
    },
    /// Manage learned patterns
    Patterns {
        #[command(subcommand)]
        action: PatternsAction,
    },
    /// Summary of a subject's patterns
    Stats {
        #[arg(long)]
        subject: String,
    },
}

#[derive(Subcommand)]
enum PatternsAction {
    List {
        #[arg(long)]
        subject: String,
        #[arg(long, default_value_t = 0.0)]
        min_confidence: f64,
        #[arg(long)]
        limit: Option<usize>,
    },
    Delete { id: String },
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Error reading {}", path.display())),
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read stdin")?;
            Ok(input)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn build_analyzer(config: &Config) -> Result<Analyzer> {
    let corpus = match &config.corpus.path {
        Some(path) => RuleCorpus::load(path)
            .with_context(|| format!("Error loading corpus {}", path.display()))?,
        None => RuleCorpus::builtin(),
    };
    Ok(Analyzer::new(corpus))
}

/// How a command depends on the pattern database.
#[derive(Clone, Copy, PartialEq, Eq)]
enum StoreAccess {
    /// Pattern management: an unopenable database is an error.
    Required,
    /// Learn and apply: fall back to the pure result instead.
    BestEffort,
}

fn open_store(cli: &Cli, config: &Config, access: StoreAccess) -> Result<Arc<dyn PatternStore>> {
    let db_path = cli.db.clone().unwrap_or_else(|| config.database.path.clone());
    match SqlitePatternStore::open_at(&db_path) {
        Ok(store) => Ok(Arc::new(store)),
        Err(err) if access == StoreAccess::BestEffort => {
            log::warn!(
                "Pattern database {} unavailable, continuing without it: {}",
                db_path.display(),
                err
            );
            Ok(Arc::new(UnavailableStore::new(format!(
                "{}: {}",
                db_path.display(),
                err
            ))))
        }
        Err(err) => Err(err)
            .with_context(|| format!("Error opening pattern database {}", db_path.display())),
    }
}

fn build_engine(cli: &Cli, config: &Config, access: StoreAccess) -> Result<LearningEngine> {
    Ok(LearningEngine::with_analyzer(
        open_store(cli, config, access)?,
        config.engine.clone(),
        build_analyzer(config)?,
    ))
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match &cli.command {
        Command::Analyze { files } => {
            let analyzer = build_analyzer(&config)?;
            if files.is_empty() {
                print_json(&analyzer.analyze(&read_input(None)?))?;
            } else {
                for path in files {
                    print_json(&analyzer.analyze(&read_input(Some(path))?))?;
                }
            }
        }
        Command::Extract {
            original,
            corrected,
            aligned,
        } => {
            let strategy = if *aligned {
                DiffStrategy::Aligned
            } else {
                config.engine.diff_strategy
            };
            let extractor =
                Extractor::new(strategy).with_max_phrase_words(config.engine.max_phrase_words);
            let original = read_input(Some(original))?;
            let corrected = read_input(Some(corrected))?;
            print_json(&extractor.extract(&original, &corrected))?;
        }
        Command::Learn {
            subject,
            original,
            corrected,
        } => {
            let engine = build_engine(&cli, &config, StoreAccess::BestEffort)?;
            let original = read_input(Some(original))?;
            let corrected = read_input(Some(corrected))?;
            print_json(&engine.learn(subject, &original, &corrected)?)?;
        }
        Command::Save { subject, from, to } => {
            let engine = build_engine(&cli, &config, StoreAccess::Required)?;
            print_json(&engine.save_pattern(subject, from, to, None)?)?;
        }
        Command::Apply { subject, file } => {
            let engine = build_engine(&cli, &config, StoreAccess::BestEffort)?;
            let text = read_input(file.as_deref())?;
            print_json(&engine.apply_learned(subject, &text))?;
        }
        Command::Polish { subject, file } => {
            let engine = build_engine(&cli, &config, StoreAccess::BestEffort)?;
            let text = read_input(file.as_deref())?;
            print_json(&engine.polish(subject, &text))?;
        }
        Command::Patterns { action } => {
            let engine = build_engine(&cli, &config, StoreAccess::Required)?;
            match action {
                PatternsAction::List {
                    subject,
                    min_confidence,
                    limit,
                } => print_json(&engine.patterns(subject, *min_confidence, *limit)?)?,
                PatternsAction::Delete { id } => engine.delete_pattern(id)?,
            }
        }
        Command::Stats { subject } => {
            let engine = build_engine(&cli, &config, StoreAccess::Required)?;
            print_json(&engine.stats(subject)?)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use super::*;
    use hebrew_polish::{PatternQuery, StoreError};

    /// A database path whose parent is a regular file, so it can never open.
    fn blocked_db(dir: &Path) -> PathBuf {
        let blocker = dir.join("blocker");
        std::fs::write(&blocker, "").unwrap();
        blocker.join("patterns.sqlite")
    }

    fn cli_with_db(db: &Path) -> Cli {
        Cli::parse_from([
            OsString::from("hebrew-polish"),
            OsString::from("--db"),
            db.as_os_str().to_owned(),
            OsString::from("stats"),
            OsString::from("--subject"),
            OsString::from("u1"),
        ])
    }

    #[test]
    fn unopenable_database_degrades_best_effort_commands() {
        let dir = tempfile::tempdir().unwrap();
        let cli = cli_with_db(&blocked_db(dir.path()));
        let store = open_store(&cli, &Config::default(), StoreAccess::BestEffort)
            .expect("best-effort open never fails");
        assert!(matches!(
            store.list(&PatternQuery::for_subject("u1")),
            Err(StoreError::Unavailable(_))
        ));
    }

    #[test]
    fn unopenable_database_fails_management_commands() {
        let dir = tempfile::tempdir().unwrap();
        let cli = cli_with_db(&blocked_db(dir.path()));
        let err = open_store(&cli, &Config::default(), StoreAccess::Required)
            .err()
            .expect("required open must fail");
        assert!(err.to_string().contains("Error opening pattern database"));
    }
}
