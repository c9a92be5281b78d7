//! Append-only storage for session audit records.

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

use crate::errors::{SafeLock, WatchError, WatchResult};

/// Level surfaced to the client and stored with every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterventionLevel {
    Normal,
    Medium,
}

impl InterventionLevel {
    pub fn from_decision(intervene: bool) -> Self {
        if intervene {
            InterventionLevel::Medium
        } else {
            InterventionLevel::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InterventionLevel::Normal => "normal",
            InterventionLevel::Medium => "medium",
        }
    }
}

impl FromStr for InterventionLevel {
    type Err = WatchError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "normal" => Ok(InterventionLevel::Normal),
            "medium" => Ok(InterventionLevel::Medium),
            other => Err(WatchError::internal(format!(
                "unknown intervention level '{other}'"
            ))),
        }
    }
}

impl ToSql for InterventionLevel {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for InterventionLevel {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: WatchError| FromSqlError::Other(Box::new(e)))
    }
}

/// A record as handed to the store, before the server assigns id and time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSessionRecord {
    pub user_id: String,
    pub session_start_time: String,
    pub session_duration_min: f64,
    pub active_period_label: String,
    pub avg_video_duration_sec: f64,
    pub switch_frequency: f64,
    pub content_emotion_score: f64,
    /// Comma-joined keywords.
    pub content_type_keywords: String,
    pub repeated_viewing_ratio: f64,
    pub skipped_intro_ratio: f64,
    pub saved_to_favorites: bool,
    pub three_day_total_watch_time: f64,
    pub short_video_ratio: f64,
    pub self_reported_goal: String,
    pub ai_tone_description: String,
    pub predicted_label: String,
    pub intervention_level: InterventionLevel,
    pub advice_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub entry: NewSessionRecord,
}

pub trait SessionStore: Send + Sync {
    /// Insert one record. The store assigns `id` and `timestamp`.
    fn append(&self, entry: &NewSessionRecord) -> WatchResult<SessionRecord>;

    /// Most recent records for one user, newest first.
    fn recent_for_user(&self, user_id: &str, limit: usize) -> WatchResult<Vec<SessionRecord>>;

    fn count(&self) -> WatchResult<u64>;

    /// Cheap liveness check used by `/readyz`.
    fn ping(&self) -> WatchResult<()>;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS session_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    session_start_time TEXT NOT NULL,
    session_duration_min REAL NOT NULL,
    active_period_label TEXT NOT NULL,
    avg_video_duration_sec REAL NOT NULL,
    switch_frequency REAL NOT NULL,
    content_emotion_score REAL NOT NULL,
    content_type_keywords TEXT NOT NULL,
    repeated_viewing_ratio REAL NOT NULL,
    skipped_intro_ratio REAL NOT NULL,
    saved_to_favorites INTEGER NOT NULL,
    three_day_total_watch_time REAL NOT NULL,
    short_video_ratio REAL NOT NULL,
    self_reported_goal TEXT NOT NULL,
    ai_tone_description TEXT NOT NULL,
    predicted_label TEXT NOT NULL,
    intervention_level TEXT NOT NULL CHECK (intervention_level IN ('normal', 'medium')),
    advice_text TEXT NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_session_logs_user ON session_logs (user_id, id);

CREATE TRIGGER IF NOT EXISTS session_logs_no_update
BEFORE UPDATE ON session_logs
BEGIN
    SELECT RAISE(ABORT, 'session_logs is append-only');
END;

CREATE TRIGGER IF NOT EXISTS session_logs_no_delete
BEFORE DELETE ON session_logs
BEGIN
    SELECT RAISE(ABORT, 'session_logs is append-only');
END;
";

const SELECT_COLUMNS: &str = "id, timestamp, user_id, session_start_time, session_duration_min, \
    active_period_label, avg_video_duration_sec, switch_frequency, content_emotion_score, \
    content_type_keywords, repeated_viewing_ratio, skipped_intro_ratio, saved_to_favorites, \
    three_day_total_watch_time, short_video_ratio, self_reported_goal, ai_tone_description, \
    predicted_label, intervention_level, advice_text";

/// SQLite-backed store. One connection behind a mutex serializes writers.
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
}

impl SqliteSessionStore {
    pub fn open(path: &Path) -> WatchResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| WatchError::io("creating database directory", e))?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| WatchError::database(format!("open {}", path.display()), e))?;
        if let Err(e) = conn.pragma_update(None, "journal_mode", "WAL") {
            tracing::warn!("failed to enable WAL mode: {e}");
        }
        Self::init(conn)
    }

    pub fn open_in_memory() -> WatchResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| WatchError::database("open in-memory database", e))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> WatchResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| WatchError::database("create session_logs schema", e))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRecord> {
    Ok(SessionRecord {
        id: row.get("id")?,
        timestamp: row.get("timestamp")?,
        entry: NewSessionRecord {
            user_id: row.get("user_id")?,
            session_start_time: row.get("session_start_time")?,
            session_duration_min: row.get("session_duration_min")?,
            active_period_label: row.get("active_period_label")?,
            avg_video_duration_sec: row.get("avg_video_duration_sec")?,
            switch_frequency: row.get("switch_frequency")?,
            content_emotion_score: row.get("content_emotion_score")?,
            content_type_keywords: row.get("content_type_keywords")?,
            repeated_viewing_ratio: row.get("repeated_viewing_ratio")?,
            skipped_intro_ratio: row.get("skipped_intro_ratio")?,
            saved_to_favorites: row.get("saved_to_favorites")?,
            three_day_total_watch_time: row.get("three_day_total_watch_time")?,
            short_video_ratio: row.get("short_video_ratio")?,
            self_reported_goal: row.get("self_reported_goal")?,
            ai_tone_description: row.get("ai_tone_description")?,
            predicted_label: row.get("predicted_label")?,
            intervention_level: row.get("intervention_level")?,
            advice_text: row.get("advice_text")?,
        },
    })
}

impl SessionStore for SqliteSessionStore {
    fn append(&self, entry: &NewSessionRecord) -> WatchResult<SessionRecord> {
        let timestamp = Utc::now();
        let conn = self.conn.safe_lock("session_store")?;
        conn.execute(
            "INSERT INTO session_logs (user_id, session_start_time, session_duration_min,
                active_period_label, avg_video_duration_sec, switch_frequency, content_emotion_score,
                content_type_keywords, repeated_viewing_ratio, skipped_intro_ratio, saved_to_favorites,
                three_day_total_watch_time, short_video_ratio, self_reported_goal, ai_tone_description,
                predicted_label, intervention_level, advice_text, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
            params![
                entry.user_id,
                entry.session_start_time,
                entry.session_duration_min,
                entry.active_period_label,
                entry.avg_video_duration_sec,
                entry.switch_frequency,
                entry.content_emotion_score,
                entry.content_type_keywords,
                entry.repeated_viewing_ratio,
                entry.skipped_intro_ratio,
                entry.saved_to_favorites,
                entry.three_day_total_watch_time,
                entry.short_video_ratio,
                entry.self_reported_goal,
                entry.ai_tone_description,
                entry.predicted_label,
                entry.intervention_level,
                entry.advice_text,
                timestamp.to_rfc3339(),
            ],
        )
        .map_err(|e| WatchError::database("insert session_log", e))?;

        Ok(SessionRecord {
            id: conn.last_insert_rowid(),
            timestamp,
            entry: entry.clone(),
        })
    }

    fn recent_for_user(&self, user_id: &str, limit: usize) -> WatchResult<Vec<SessionRecord>> {
        let conn = self.conn.safe_lock("session_store")?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM session_logs WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2"
        ))?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let records = stmt
            .query_map(params![user_id, limit], read_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| WatchError::database("select session_logs", e))?;
        Ok(records)
    }

    fn count(&self) -> WatchResult<u64> {
        let conn = self.conn.safe_lock("session_store")?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM session_logs", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn ping(&self) -> WatchResult<()> {
        let conn = self.conn.safe_lock("session_store")?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}
