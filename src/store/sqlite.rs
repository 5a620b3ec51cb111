//! SQLite-backed [`PatternStore`].
//!
//! Patterns live in a single `learned_patterns` table with a unique index on
//! `(subject_id, from_text, to_text)`. Reinforcement is done in SQL
//! (`INSERT ... ON CONFLICT DO UPDATE`) so two writers, even in different
//! processes, can never overwrite each other's bump.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{
    LearnedPattern, NewPattern, PatternQuery, PatternStore, Upserted, MAX_CONFIDENCE,
    REINFORCEMENT_STEP,
};
use crate::config;
use crate::error::StoreError;
use crate::extractor::PatternType;

const SCHEMA_VERSION: i32 = 1;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const COLUMNS: &str = "id, subject_id, from_text, to_text, pattern_type, confidence, \
                       occurrences, context, created_at, updated_at";

type DbConn = Arc<Mutex<Connection>>;

#[derive(Clone)]
pub struct SqlitePatternStore {
    conn: DbConn,
}

impl SqlitePatternStore {
    /// Open the database at the default location.
    pub fn open() -> Result<Self, StoreError> {
        Self::open_at(&config::default_db_path())
    }

    /// Open or create the database at `path`.
    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::from_connection(conn)
    }

    /// In-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        init(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn init(conn: &Connection) -> Result<(), StoreError> {
    let existing_version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if existing_version < SCHEMA_VERSION {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS learned_patterns (
                id TEXT PRIMARY KEY,
                subject_id TEXT NOT NULL,
                from_text TEXT NOT NULL,
                to_text TEXT NOT NULL,
                pattern_type TEXT NOT NULL,
                confidence REAL NOT NULL,
                occurrences INTEGER NOT NULL DEFAULT 1,
                context TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (subject_id, from_text, to_text)
            );
            CREATE INDEX IF NOT EXISTS idx_learned_patterns_rank
                ON learned_patterns (subject_id, confidence DESC, occurrences DESC);
            "#,
        )?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }
    Ok(())
}

fn row_to_pattern(row: &Row<'_>) -> rusqlite::Result<LearnedPattern> {
    let pattern_type: String = row.get(4)?;
    let pattern_type = pattern_type.parse::<PatternType>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, e.into())
    })?;
    Ok(LearnedPattern {
        id: row.get(0)?,
        subject_id: row.get(1)?,
        from: row.get(2)?,
        to: row.get(3)?,
        pattern_type,
        confidence: row.get(5)?,
        occurrences: row.get(6)?,
        context: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

impl PatternStore for SqlitePatternStore {
    fn find_exact(
        &self,
        subject_id: &str,
        from: &str,
        to: &str,
    ) -> Result<Option<LearnedPattern>, StoreError> {
        let conn = self.conn.lock();
        let pattern = conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM learned_patterns \
                     WHERE subject_id = ?1 AND from_text = ?2 AND to_text = ?3"
                ),
                params![subject_id, from, to],
                row_to_pattern,
            )
            .optional()?;
        Ok(pattern)
    }

    fn create(&self, new: &NewPattern) -> Result<LearnedPattern, StoreError> {
        let conn = self.conn.lock();
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
        conn.execute(
            &format!(
                "INSERT INTO learned_patterns ({COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ),
            params![
                pattern.id,
                pattern.subject_id,
                pattern.from,
                pattern.to,
                pattern.pattern_type.as_str(),
                pattern.confidence,
                pattern.occurrences,
                pattern.context,
                pattern.created_at,
                pattern.updated_at,
            ],
        )?;
        Ok(pattern)
    }

    fn reinforce(&self, id: &str) -> Result<LearnedPattern, StoreError> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!(
                "UPDATE learned_patterns \
                 SET confidence = MIN(?2, confidence + ?3), \
                     occurrences = occurrences + 1, \
                     updated_at = ?4 \
                 WHERE id = ?1 \
                 RETURNING {COLUMNS}"
            ),
            params![id, MAX_CONFIDENCE, REINFORCEMENT_STEP, Utc::now()],
            row_to_pattern,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn list(&self, query: &PatternQuery) -> Result<Vec<LearnedPattern>, StoreError> {
        let conn = self.conn.lock();
        // SQLite treats a negative LIMIT as "no limit".
        let limit = query
            .limit
            .map(|l| i64::try_from(l).unwrap_or(i64::MAX))
            .unwrap_or(-1);
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM learned_patterns \
             WHERE subject_id = ?1 AND confidence >= ?2 \
             ORDER BY confidence DESC, occurrences DESC, created_at DESC, id DESC \
             LIMIT ?3"
        ))?;
        let rows = stmt.query_map(
            params![query.subject_id, query.min_confidence, limit],
            row_to_pattern,
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let rows = conn.execute("DELETE FROM learned_patterns WHERE id = ?1", [id])?;
        if rows == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn upsert(&self, new: &NewPattern) -> Result<Upserted, StoreError> {
        let conn = self.conn.lock();
        let now = Utc::now();
        let pattern = conn.query_row(
            &format!(
                "INSERT INTO learned_patterns ({COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?8, ?8) \
                 ON CONFLICT (subject_id, from_text, to_text) DO UPDATE SET \
                     confidence = MIN(?9, learned_patterns.confidence + ?10), \
                     occurrences = learned_patterns.occurrences + 1, \
                     updated_at = excluded.updated_at \
                 RETURNING {COLUMNS}"
            ),
            params![
                Uuid::new_v4().to_string(),
                new.subject_id,
                new.from,
                new.to,
                new.pattern_type.as_str(),
                new.seed_confidence(),
                new.context,
                now,
                MAX_CONFIDENCE,
                REINFORCEMENT_STEP,
            ],
            row_to_pattern,
        )?;
        if pattern.occurrences == 1 {
            Ok(Upserted::Created(pattern))
        } else {
            Ok(Upserted::Reinforced(pattern))
        }
    }
}
