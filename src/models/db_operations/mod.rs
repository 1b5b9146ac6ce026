//! SQLite persistence for the moderation engine. Each `*_db_operations` file
//! holds the SQL for one table as free functions over a `Connection`, plus
//! the repository trait implementation that delegates to them.

pub mod content_db_operations;
pub mod contributions_db_operations;
pub mod moderator_actions_db_operations;
pub mod outbox_db_operations;
pub mod reports_db_operations;
pub mod users_db_operations;

use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::{ErrorCode, Row, TransactionBehavior};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::engine::repository::Store;
use crate::engine::EngineError;
use crate::models::{Role, UserAccount};
use crate::setup::db_setup::{setup_moderation_db, SetupError};
use crate::DbPool;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("Setup error: {0}")]
    Setup(#[from] SetupError),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("{entity} {id} has a newer version")]
    Stale { entity: &'static str, id: String },
}

impl DbError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DbError::NotFound { entity, id: id.to_string() }
    }

    pub fn stale(entity: &'static str, id: impl ToString) -> Self {
        DbError::Stale { entity, id: id.to_string() }
    }

    /// Lock contention and pool checkout timeouts clear up on their own.
    pub fn is_transient(&self) -> bool {
        match self {
            DbError::Pool(_) => true,
            DbError::Rusqlite(rusqlite::Error::SqliteFailure(err, _)) => {
                matches!(err.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
            }
            _ => false,
        }
    }
}

impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        if err.is_transient() {
            return EngineError::StorageUnavailable(err.to_string());
        }
        match err {
            DbError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            DbError::Stale { entity, id } => EngineError::VersionConflict { entity, id },
            other => EngineError::Storage(other.to_string()),
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Fixed-width UTC timestamps, so text comparison orders them correctly.
pub fn to_db_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn opt_db_time(time: &Option<DateTime<Utc>>) -> Option<String> {
    time.as_ref().map(to_db_time)
}

pub(crate) fn get_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_time(idx, &raw)
}

pub(crate) fn get_opt_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| parse_time(idx, &raw)).transpose()
}

fn parse_time(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn get_json<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Pooled SQLite store. Every engine transaction runs under `BEGIN IMMEDIATE`,
/// so writers are serialized and a waiting writer sees the committed rows.
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let manager = SqliteConnectionManager::file(path.as_ref()).with_init(|conn| {
            conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000; PRAGMA foreign_keys = ON;")
        });
        let pool = Pool::builder()
            .max_size(8)
            .connection_timeout(Duration::from_secs(5))
            .build(manager)?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn initialize(&self) -> DbResult<()> {
        let mut conn = self.pool.get()?;
        setup_moderation_db(&mut conn)?;
        Ok(())
    }

    pub fn create_user(&self, username: &str, role: Role) -> DbResult<UserAccount> {
        let conn = self.pool.get()?;
        users_db_operations::create_user(&conn, username, role, Utc::now())
    }

    pub fn list_users(&self) -> DbResult<Vec<UserAccount>> {
        let conn = self.pool.get()?;
        users_db_operations::read_all_users(&conn)
    }
}

impl Store for SqliteStore {
    fn transaction<T>(
        &self,
        work: &mut dyn FnMut(&dyn crate::engine::repository::Repositories) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let mut conn = self.pool.get().map_err(DbError::from)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(DbError::from)?;
        let value = work(&*tx)?;
        tx.commit().map_err(DbError::from)?;
        Ok(value)
    }
}
