//! SQLite-based completion storage and statistics.
//!
//! Provides persistent storage for:
//! - Completed steps (one row per completion record)
//! - Completed sessions (one row per session summary)
//! - Daily and all-time practice statistics

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{CoreError, DatabaseError, PersistenceError};
use crate::record::{CompletionRecord, SessionSummary};
use crate::reporter::{Ack, CompletionStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRow {
    pub id: i64,
    pub step_id: String,
    pub seconds_spent: u64,
    pub position: usize,
    pub rating: Option<u8>,
    pub note: Option<String>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRow {
    pub run_id: String,
    pub step_count: usize,
    pub total_elapsed_secs: u64,
    pub average_rating: Option<f64>,
    pub records: Vec<CompletionRecord>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Stats {
    pub total_sessions: u64,
    pub total_steps: u64,
    pub total_practice_secs: u64,
    pub today_sessions: u64,
    pub today_practice_secs: u64,
}

/// SQLite database for completion storage.
///
/// The connection sits behind a mutex so the database can serve as a
/// [`CompletionStore`] shared with the reporter's writer task.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `~/.config/drillroom/drillroom.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("drillroom.db");
        Self::open_at(&path)
    }

    pub fn open_at(path: &Path) -> Result<Self, CoreError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn().execute_batch(
            "CREATE TABLE IF NOT EXISTS step_completions (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                step_id       TEXT NOT NULL,
                seconds_spent INTEGER NOT NULL,
                position      INTEGER NOT NULL,
                rating        INTEGER,
                note          TEXT,
                completed_at  TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS session_completions (
                run_id             TEXT PRIMARY KEY,
                step_count         INTEGER NOT NULL,
                total_elapsed_secs INTEGER NOT NULL,
                average_rating     REAL,
                records            TEXT NOT NULL,
                completed_at       TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_step_completions_completed_at ON step_completions(completed_at);
            CREATE INDEX IF NOT EXISTS idx_session_completions_completed_at ON session_completions(completed_at);",
        )?;
        Ok(())
    }

    /// Record a finished step.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn insert_step(&self, record: &CompletionRecord) -> Result<i64, DatabaseError> {
        let conn = self.conn();
        let feedback = record.feedback.as_ref();
        conn.execute(
            "INSERT INTO step_completions (step_id, seconds_spent, position, rating, note, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.step_id.as_str(),
                record.seconds_spent,
                record.position as i64,
                feedback.and_then(|f| f.rating),
                feedback.and_then(|f| f.note.as_deref()),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Record a finished session under a fresh run id, which is returned.
    pub fn insert_session(&self, summary: &SessionSummary) -> Result<String, DatabaseError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let records = serde_json::to_string(&summary.records)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        self.conn().execute(
            "INSERT INTO session_completions (run_id, step_count, total_elapsed_secs, average_rating, records, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                run_id,
                summary.step_count() as i64,
                summary.total_elapsed_secs,
                summary.average_rating(),
                records,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(run_id)
    }

    /// Most recent sessions first.
    pub fn history(&self, limit: usize) -> Result<Vec<SessionRow>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT run_id, step_count, total_elapsed_secs, average_rating, records, completed_at
             FROM session_completions
             ORDER BY completed_at DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, u64>(2)?,
                row.get::<_, Option<f64>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            let (run_id, step_count, total_elapsed_secs, average_rating, records, completed_at) =
                row?;
            sessions.push(SessionRow {
                run_id,
                step_count: step_count as usize,
                total_elapsed_secs,
                average_rating,
                records: serde_json::from_str(&records)
                    .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
                completed_at: parse_timestamp(&completed_at)?,
            });
        }
        Ok(sessions)
    }

    /// Most recent step completions first, including those of stopped runs.
    pub fn step_history(&self, limit: usize) -> Result<Vec<StepRow>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, step_id, seconds_spent, position, rating, note, completed_at
             FROM step_completions
             ORDER BY id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, Option<u8>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut steps = Vec::new();
        for row in rows {
            let (id, step_id, seconds_spent, position, rating, note, completed_at) = row?;
            steps.push(StepRow {
                id,
                step_id,
                seconds_spent,
                position: position as usize,
                rating,
                note,
                completed_at: parse_timestamp(&completed_at)?,
            });
        }
        Ok(steps)
    }

    pub fn stats_today(&self) -> Result<Stats, DatabaseError> {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        self.stats_since(&format!("{today}T00:00:00+00:00"))
    }

    pub fn stats_all(&self) -> Result<Stats, DatabaseError> {
        let mut stats = self.stats_since("")?;
        let today = self.stats_today()?;
        stats.today_sessions = today.today_sessions;
        stats.today_practice_secs = today.today_practice_secs;
        Ok(stats)
    }

    /// Totals over rows completed at or after `since` (RFC 3339). The
    /// `today_*` fields mirror the totals.
    fn stats_since(&self, since: &str) -> Result<Stats, DatabaseError> {
        let conn = self.conn();
        let (total_steps, total_practice_secs) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(seconds_spent), 0)
             FROM step_completions
             WHERE completed_at >= ?1",
            params![since],
            |row| Ok((row.get::<_, u64>(0)?, row.get::<_, u64>(1)?)),
        )?;
        let total_sessions = conn
            .query_row(
                "SELECT COUNT(*) FROM session_completions WHERE completed_at >= ?1",
                params![since],
                |row| row.get::<_, u64>(0),
            )
            .optional()?
            .unwrap_or(0);

        Ok(Stats {
            total_sessions,
            total_steps,
            total_practice_secs,
            today_sessions: total_sessions,
            today_practice_secs: total_practice_secs,
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::QueryFailed(format!("bad timestamp '{value}': {e}")))
}

#[async_trait]
impl CompletionStore for Database {
    async fn record_step_completion(
        &self,
        record: &CompletionRecord,
    ) -> Result<Ack, PersistenceError> {
        let id = self.insert_step(record)?;
        Ok(Ack {
            reference: Some(id.to_string()),
        })
    }

    async fn record_session_completion(
        &self,
        summary: &SessionSummary,
    ) -> Result<Ack, PersistenceError> {
        let run_id = self.insert_session(summary)?;
        Ok(Ack {
            reference: Some(run_id),
        })
    }
}
