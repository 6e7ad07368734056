//! Database schema and row mapping

use crate::state_machine::{Session, Step};
use rusqlite::Row;

/// SQL schema for initialization
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    user_id INTEGER PRIMARY KEY,
    step TEXT NOT NULL DEFAULT '{"type":"menu"}',
    topic TEXT,
    language TEXT,
    notes TEXT,
    processing BOOLEAN NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_processing ON sessions(processing);
"#;

pub(super) const SELECT_SESSION: &str =
    "SELECT step, topic, language, notes, processing FROM sessions WHERE user_id = ?1";

pub(super) const UPSERT_SESSION: &str =
    "INSERT INTO sessions (user_id, step, topic, language, notes, processing, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
     ON CONFLICT(user_id) DO UPDATE SET
        step = excluded.step,
        topic = excluded.topic,
        language = excluded.language,
        notes = excluded.notes,
        processing = excluded.processing,
        updated_at = excluded.updated_at";

/// Map a `SELECT_SESSION` row. An unreadable step falls back to the menu.
pub(super) fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    let step_json: String = row.get(0)?;
    let step: Step = serde_json::from_str(&step_json).unwrap_or_default();
    Ok(Session {
        step,
        topic: row.get(1)?,
        language: row.get(2)?,
        notes: row.get(3)?,
        processing: row.get(4)?,
    })
}
