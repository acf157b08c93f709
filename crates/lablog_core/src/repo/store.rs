//! SQLite-backed lab store.
//!
//! Owns the connection, the clock and the store configuration. The per-entity
//! repository traits are implemented for this type in sibling modules.

use super::{
    RepoError, RepoResult, ASSOCIATION_TABLE, PROCESSES_TABLE, REAGENTS_TABLE, USERS_TABLE,
};
use crate::clock::{Clock, SystemClock};
use crate::config::{DeletePolicy, StoreConfig};
use crate::db::migrations::{current_user_version, latest_version};
use crate::db::{open_db, open_db_in_memory};
use crate::model::EpochMs;
use log::{debug, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Instant;

const REQUIRED_TABLES: [&str; 4] = [USERS_TABLE, REAGENTS_TABLE, PROCESSES_TABLE, ASSOCIATION_TABLE];

/// Entity store and association manager over one SQLite connection.
pub struct SqliteLabStore<C: Clock = SystemClock> {
    conn: Connection,
    clock: C,
    config: StoreConfig,
}

/// One write transaction plus the stamp every row written in it receives.
pub(super) struct UnitOfWork<'a> {
    pub(super) tx: Transaction<'a>,
    pub(super) now: EpochMs,
    pub(super) user_delete_policy: DeletePolicy,
}

impl SqliteLabStore<SystemClock> {
    /// Opens (and migrates) a database file with default settings.
    pub fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        Self::with_config(open_db(path)?, StoreConfig::default())
    }

    /// Opens a fresh in-memory database with default settings.
    pub fn open_in_memory() -> RepoResult<Self> {
        Self::with_config(open_db_in_memory()?, StoreConfig::default())
    }

    /// Wraps a migrated connection with default settings.
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        Self::with_config(conn, StoreConfig::default())
    }

    /// Wraps a migrated connection with `config` and the wall clock.
    pub fn with_config(conn: Connection, config: StoreConfig) -> RepoResult<Self> {
        Self::with_clock(conn, config, SystemClock)
    }
}

impl<C: Clock> SqliteLabStore<C> {
    /// Wraps a migrated connection with an explicit clock.
    ///
    /// # Errors
    /// - `UninitializedConnection` when the schema version is not current.
    /// - `MissingRequiredTable` when one of the four lab tables is absent.
    pub fn with_clock(conn: Connection, config: StoreConfig, clock: C) -> RepoResult<Self> {
        ensure_connection_ready(&conn)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(config.busy_timeout())?;
        Ok(Self {
            conn,
            clock,
            config,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Schema version recorded on the underlying database.
    pub fn schema_version(&self) -> RepoResult<u32> {
        Ok(current_user_version(&self.conn)?)
    }

    /// Row count of each logical table, in schema order.
    pub fn table_counts(&self) -> RepoResult<Vec<(&'static str, i64)>> {
        REQUIRED_TABLES
            .iter()
            .map(|table| -> RepoResult<(&'static str, i64)> {
                let count: i64 =
                    self.conn
                        .query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
                            row.get(0)
                        })?;
                Ok((*table, count))
            })
            .collect()
    }

    pub(super) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Starts an immediate write transaction stamped with the current time.
    pub(super) fn begin(&mut self) -> RepoResult<UnitOfWork<'_>> {
        let now = self.clock.now_ms();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(UnitOfWork {
            tx,
            now,
            user_delete_policy: self.config.user_delete_policy,
        })
    }
}

/// Emits one metadata-only event for a finished store mutation.
pub(super) fn log_write<T>(
    event: &str,
    id: Option<i64>,
    started_at: Instant,
    result: &RepoResult<T>,
) {
    let id = id.map_or_else(|| "-".to_string(), |id| id.to_string());
    match result {
        Ok(_) => debug!(
            "event={event} module=repo status=ok id={id} duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(err) => warn!(
            "event={event} module=repo status=error id={id} duration_ms={} error_code={}",
            started_at.elapsed().as_millis(),
            err.code()
        ),
    }
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in REQUIRED_TABLES {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
