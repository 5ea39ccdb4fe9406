use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{params, Connection, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::util::percentage;

type Result<T> = std::result::Result<T, StoreError>;

/// Bumped whenever the table layout changes.
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS word_stats (
    word TEXT PRIMARY KEY,
    correct_count INTEGER NOT NULL DEFAULT 0 CHECK (correct_count >= 0),
    incorrect_count INTEGER NOT NULL DEFAULT 0 CHECK (incorrect_count >= 0),
    last_attempt_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS quiz_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    completed_at TEXT NOT NULL,
    dictionary_name TEXT NOT NULL,
    score INTEGER NOT NULL CHECK (score >= 0),
    total INTEGER NOT NULL CHECK (total >= score),
    best_streak INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_quiz_history_completed_at ON quiz_history(completed_at);
"#;

const UPSERT_WORD_STAT: &str = r#"
INSERT INTO word_stats (word, correct_count, incorrect_count, last_attempt_at)
VALUES (?1, ?2, ?3, ?4)
ON CONFLICT(word) DO UPDATE SET
    correct_count = correct_count + excluded.correct_count,
    incorrect_count = incorrect_count + excluded.incorrect_count,
    last_attempt_at = excluded.last_attempt_at
"#;

/// Per-word performance record
#[derive(Debug, Clone, PartialEq)]
pub struct WordStat {
    pub word: String,
    pub correct_count: u32,
    pub incorrect_count: u32,
    pub last_attempt_at: DateTime<Utc>,
}

impl WordStat {
    pub fn attempts(&self) -> u32 {
        self.correct_count + self.incorrect_count
    }

    /// Percentage of correct attempts, always derived from the two counters
    pub fn accuracy(&self) -> f64 {
        percentage(self.correct_count.into(), self.attempts().into())
    }
}

/// A finished session as handed to the store; the id is assigned on insert
#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoryEntry {
    pub completed_at: DateTime<Utc>,
    pub dictionary_name: String,
    pub score: u32,
    pub total: u32,
    pub best_streak: u32,
}

/// A stored, immutable session result
#[derive(Debug, Clone, PartialEq)]
pub struct QuizHistoryEntry {
    pub id: i64,
    pub completed_at: DateTime<Utc>,
    pub dictionary_name: String,
    pub score: u32,
    pub total: u32,
    pub best_streak: u32,
}

impl QuizHistoryEntry {
    pub fn percentage(&self) -> f64 {
        percentage(self.score.into(), self.total.into())
    }
}

/// Durable learner progress: per-word counters and append-only session history.
///
/// Every method other than `initialize` fails with `StoreError::NotInitialized`
/// until `initialize` has succeeded.
pub trait ProgressStore: Send + Sync {
    fn initialize(&self) -> Result<()>;

    /// Count one attempt at `word` and return the updated record
    fn record_attempt(&self, word: &str, was_correct: bool) -> Result<WordStat>;

    /// All word records, in no particular order
    fn word_stats(&self) -> Result<Vec<WordStat>>;

    fn append_history(&self, entry: NewHistoryEntry) -> Result<QuizHistoryEntry>;

    /// All session results, most recent first
    fn history(&self) -> Result<Vec<QuizHistoryEntry>>;
}

/// Canonical key for a word: surrounding whitespace removed, lowercased
pub fn normalize_word_key(word: &str) -> String {
    word.trim().to_lowercase()
}

#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    Memory,
}

/// SQLite-backed progress store
#[derive(Debug)]
pub struct SqliteStore {
    location: Location,
    conn: Mutex<Option<Connection>>,
}

impl SqliteStore {
    /// Create a store for the database file at `path`. Nothing is opened
    /// until `initialize` is called.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            location: Location::File(path.as_ref().to_path_buf()),
            conn: Mutex::new(None),
        }
    }

    /// Create a store backed by a private in-memory database
    pub fn in_memory() -> Self {
        Self {
            location: Location::Memory,
            conn: Mutex::new(None),
        }
    }

    /// Create and initialize a store for the database file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let store = Self::new(path);
        store.initialize()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self::in_memory();
        store.initialize()?;
        Ok(store)
    }

    /// The database file, or `None` for an in-memory store
    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            Location::File(path) => Some(path),
            Location::Memory => None,
        }
    }

    fn display_path(&self) -> PathBuf {
        self.path()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(":memory:"))
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = self.lock();
        let conn = guard.as_mut().ok_or(StoreError::NotInitialized)?;
        f(conn)
    }

    fn unavailable(&self, reason: impl ToString) -> StoreError {
        StoreError::StorageUnavailable {
            path: self.display_path(),
            reason: reason.to_string(),
        }
    }

    fn open_connection(&self) -> Result<Connection> {
        match &self.location {
            Location::Memory => Connection::open_in_memory().map_err(|e| self.unavailable(e)),
            Location::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        self.unavailable(format!("failed to create directory: {e}"))
                    })?;
                }
                Connection::open(path).map_err(|e| self.unavailable(e))
            }
        }
    }

    /// Create the tables if needed and check that an existing database has the
    /// layout this build expects.
    fn prepare_schema(&self, conn: &Connection) -> Result<()> {
        let version: i64 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .map_err(|e| self.unavailable(e))?;
        if version > SCHEMA_VERSION {
            return Err(self.unavailable(format!(
                "schema version {version} is newer than supported version {SCHEMA_VERSION}"
            )));
        }

        conn.execute_batch(SCHEMA)
            .map_err(|e| self.unavailable(e))?;

        for query in [
            "SELECT word, correct_count, incorrect_count, last_attempt_at FROM word_stats LIMIT 0",
            "SELECT id, completed_at, dictionary_name, score, total, best_streak FROM quiz_history LIMIT 0",
        ] {
            conn.prepare(query)
                .map_err(|e| self.unavailable(format!("unexpected schema: {e}")))?;
        }

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)
            .map_err(|e| self.unavailable(e))?;
        Ok(())
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    // Fixed-width UTC so lexical order in SQL matches chronological order
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn word_stat_from_row(row: &Row<'_>) -> rusqlite::Result<WordStat> {
    let last_attempt_at: String = row.get(3)?;
    Ok(WordStat {
        word: row.get(0)?,
        correct_count: row.get(1)?,
        incorrect_count: row.get(2)?,
        last_attempt_at: parse_timestamp(3, &last_attempt_at)?,
    })
}

fn history_entry_from_row(row: &Row<'_>) -> rusqlite::Result<QuizHistoryEntry> {
    let completed_at: String = row.get(1)?;
    Ok(QuizHistoryEntry {
        id: row.get(0)?,
        completed_at: parse_timestamp(1, &completed_at)?,
        dictionary_name: row.get(2)?,
        score: row.get(3)?,
        total: row.get(4)?,
        best_streak: row.get(5)?,
    })
}

fn write_error(record: &str) -> impl Fn(rusqlite::Error) -> StoreError + '_ {
    move |source| StoreError::Write {
        record: record.to_string(),
        source,
    }
}

fn read_error(collection: &'static str) -> impl Fn(rusqlite::Error) -> StoreError {
    move |source| StoreError::Read { collection, source }
}

impl ProgressStore for SqliteStore {
    fn initialize(&self) -> Result<()> {
        let mut guard = self.lock();
        if guard.is_some() {
            return Ok(());
        }

        let conn = self.open_connection()?;
        self.prepare_schema(&conn)?;
        *guard = Some(conn);

        info!(path = %self.display_path().display(), "progress store ready");
        Ok(())
    }

    fn record_attempt(&self, word: &str, was_correct: bool) -> Result<WordStat> {
        let key = normalize_word_key(word);
        if key.is_empty() {
            return Err(StoreError::InvalidRecord(
                "word key is empty after normalization".to_string(),
            ));
        }
        let record = format!("word stat '{key}'");
        let (correct, incorrect) = if was_correct { (1, 0) } else { (0, 1) };

        self.with_conn(|conn| {
            let tx = conn.transaction().map_err(write_error(&record))?;
            tx.execute(
                UPSERT_WORD_STAT,
                params![key, correct, incorrect, format_timestamp(Utc::now())],
            )
            .map_err(write_error(&record))?;
            let stat = tx
                .query_row(
                    "SELECT word, correct_count, incorrect_count, last_attempt_at FROM word_stats WHERE word = ?1",
                    [&key],
                    word_stat_from_row,
                )
                .map_err(write_error(&record))?;
            tx.commit().map_err(write_error(&record))?;

            debug!(word = %stat.word, was_correct, accuracy = stat.accuracy(), "recorded attempt");
            Ok(stat)
        })
    }

    fn word_stats(&self) -> Result<Vec<WordStat>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT word, correct_count, incorrect_count, last_attempt_at FROM word_stats")
                .map_err(read_error("word_stats"))?;
            let rows = stmt
                .query_map([], word_stat_from_row)
                .map_err(read_error("word_stats"))?;

            let mut stats = Vec::new();
            for stat in rows {
                stats.push(stat.map_err(read_error("word_stats"))?);
            }
            Ok(stats)
        })
    }

    fn append_history(&self, entry: NewHistoryEntry) -> Result<QuizHistoryEntry> {
        if entry.score > entry.total {
            return Err(StoreError::InvalidRecord(format!(
                "score {} exceeds total {}",
                entry.score, entry.total
            )));
        }
        if entry.best_streak > entry.score {
            return Err(StoreError::InvalidRecord(format!(
                "best streak {} exceeds score {}",
                entry.best_streak, entry.score
            )));
        }

        // Stored at microsecond precision; return exactly what history() will read
        let completed_at = entry.completed_at.trunc_subsecs(6);
        self.with_conn(|conn| {
            let record = format!("history entry for '{}'", entry.dictionary_name);
            conn.execute(
                r#"
                INSERT INTO quiz_history (completed_at, dictionary_name, score, total, best_streak)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    format_timestamp(completed_at),
                    entry.dictionary_name,
                    entry.score,
                    entry.total,
                    entry.best_streak,
                ],
            )
            .map_err(write_error(&record))?;

            let stored = QuizHistoryEntry {
                id: conn.last_insert_rowid(),
                completed_at,
                dictionary_name: entry.dictionary_name,
                score: entry.score,
                total: entry.total,
                best_streak: entry.best_streak,
            };
            debug!(id = stored.id, score = stored.score, total = stored.total, "appended history");
            Ok(stored)
        })
    }

    fn history(&self) -> Result<Vec<QuizHistoryEntry>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    r#"
                    SELECT id, completed_at, dictionary_name, score, total, best_streak
                    FROM quiz_history
                    ORDER BY completed_at DESC, id DESC
                    "#,
                )
                .map_err(read_error("quiz_history"))?;
            let rows = stmt
                .query_map([], history_entry_from_row)
                .map_err(read_error("quiz_history"))?;

            let mut history = Vec::new();
            for entry in rows {
                history.push(entry.map_err(read_error("quiz_history"))?);
            }
            Ok(history)
        })
    }
}
