//! Durable session storage
//!
//! Stores one row per user with the step serialized as tagged JSON. Drop-in
//! replacement for the in-memory store that survives restarts.

mod schema;

pub use schema::SCHEMA;
use schema::{session_from_row, SELECT_SESSION, UPSERT_SESSION};

use crate::session::{SessionPatch, SessionStore, StoreError, UserId};
use crate::state_machine::Session;
use async_trait::async_trait;
use chrono::Utc;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Connections kept for a database file
const POOL_SIZE: u32 = 8;
/// How long a writer waits for another connection's write lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Step encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub type DbResult<T> = Result<T, DbError>;

/// Pooled database handle.
///
/// Each operation checks out its own connection, so work for different users
/// runs on separate connections. WAL mode lets readers proceed while another
/// connection writes.
#[derive(Clone)]
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conn.execute_batch("PRAGMA journal_mode = WAL;")
        });
        Self::init(manager, POOL_SIZE)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        // Shared-cache memory databases report lock conflicts instead of
        // waiting, so a single connection serves them
        Self::init(SqliteConnectionManager::memory(), 1)
    }

    fn init(manager: SqliteConnectionManager, size: u32) -> DbResult<Self> {
        let pool = Pool::builder().max_size(size).build(manager)?;
        pool.get()?.execute_batch(SCHEMA)?;
        Ok(Self { pool })
    }

    fn conn(&self) -> DbResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    pub fn get_session(&self, user: UserId) -> DbResult<Option<Session>> {
        let conn = self.conn()?;
        let session = conn
            .query_row(SELECT_SESSION, params![user.0], session_from_row)
            .optional()?;
        Ok(session)
    }

    pub fn put_session(&self, user: UserId, session: &Session) -> DbResult<()> {
        let conn = self.conn()?;
        write_session(&conn, user, session)
    }

    /// Merge a patch inside one write transaction
    pub fn update_session(&self, user: UserId, patch: SessionPatch) -> DbResult<Session> {
        let mut conn = self.conn()?;
        // Take the write lock up front so two patches cannot read the same row
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut session = tx
            .query_row(SELECT_SESSION, params![user.0], session_from_row)
            .optional()?
            .unwrap_or_default();
        patch.apply(&mut session);
        write_session(&tx, user, &session)?;
        tx.commit()?;
        Ok(session)
    }

    pub fn delete_session(&self, user: UserId) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM sessions WHERE user_id = ?1", params![user.0])?;
        Ok(())
    }

    /// Drop sessions left mid-generation by a previous process.
    ///
    /// Their generation outcome can never arrive, so they would otherwise
    /// reject every message until the user sent the greeting.
    pub fn reset_in_flight(&self) -> DbResult<usize> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM sessions WHERE processing = 1", [])?;
        Ok(removed)
    }
}

fn write_session(conn: &Connection, user: UserId, session: &Session) -> DbResult<()> {
    let step_json = serde_json::to_string(&session.step)?;
    conn.execute(
        UPSERT_SESSION,
        params![
            user.0,
            step_json,
            session.topic,
            session.language,
            session.notes,
            session.processing,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

#[async_trait]
impl SessionStore for Database {
    async fn get(&self, user: UserId) -> Result<Option<Session>, StoreError> {
        let db = self.clone();
        Ok(tokio::task::spawn_blocking(move || db.get_session(user)).await??)
    }

    async fn set(&self, user: UserId, session: Session) -> Result<(), StoreError> {
        let db = self.clone();
        Ok(tokio::task::spawn_blocking(move || db.put_session(user, &session)).await??)
    }

    async fn update(&self, user: UserId, patch: SessionPatch) -> Result<Session, StoreError> {
        let db = self.clone();
        Ok(tokio::task::spawn_blocking(move || db.update_session(user, patch)).await??)
    }

    async fn delete(&self, user: UserId) -> Result<(), StoreError> {
        let db = self.clone();
        Ok(tokio::task::spawn_blocking(move || db.delete_session(user)).await??)
    }
}
