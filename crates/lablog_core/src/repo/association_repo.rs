//! Reagent↔process association manager.
//!
//! # Responsibility
//! - Maintain the many-to-many join rows independently of either endpoint.
//! - Provide the detach helpers endpoint deletes run before removing a row.
//!
//! # Invariants
//! - At most one row per `(reagent_id, process_id)` pair.
//! - Every join row references an existing reagent and process at every
//!   committed point.
//! - Linking and unlinking never re-stamp either endpoint.

use super::store::{log_write, SqliteLabStore};
use super::{ensure_exists, EntityKind, RepoResult};
use crate::clock::Clock;
use crate::model::association::ReagentProcessAssociation;
use crate::model::process::ProcessId;
use crate::model::reagent::ReagentId;
use rusqlite::{params, Connection};
use std::time::Instant;

/// Repository interface for the reagent/process join collection.
pub trait AssociationRepository {
    /// Links a reagent to a process.
    ///
    /// Returns `true` when a row was written and `false` when the pair was
    /// already linked. Fails with `NotFound` when either endpoint is absent.
    fn link(&mut self, reagent_id: ReagentId, process_id: ProcessId) -> RepoResult<bool>;
    /// Removes the link if present. Returns whether a row was removed.
    fn unlink(&mut self, reagent_id: ReagentId, process_id: ProcessId) -> RepoResult<bool>;
    /// Ids of processes linked to `reagent_id`, ascending.
    fn processes_of(&self, reagent_id: ReagentId) -> RepoResult<Vec<ProcessId>>;
    /// Ids of reagents linked to `process_id`, ascending.
    fn reagents_of(&self, process_id: ProcessId) -> RepoResult<Vec<ReagentId>>;
    /// Every join row, ordered by `(reagent_id, process_id)`.
    fn list_associations(&self) -> RepoResult<Vec<ReagentProcessAssociation>>;
}

impl<C: Clock> AssociationRepository for SqliteLabStore<C> {
    fn link(&mut self, reagent_id: ReagentId, process_id: ProcessId) -> RepoResult<bool> {
        let started_at = Instant::now();
        let result = self.begin().and_then(|unit| {
            ensure_exists(&unit.tx, EntityKind::Reagent, reagent_id)?;
            ensure_exists(&unit.tx, EntityKind::Process, process_id)?;
            let inserted = unit.tx.execute(
                "INSERT OR IGNORE INTO reagent_process_association (reagent_id, process_id)
                 VALUES (?1, ?2);",
                params![reagent_id, process_id],
            )?;
            unit.tx.commit()?;
            Ok(inserted == 1)
        });
        log_write("association_link", Some(reagent_id), started_at, &result);
        result
    }

    fn unlink(&mut self, reagent_id: ReagentId, process_id: ProcessId) -> RepoResult<bool> {
        let started_at = Instant::now();
        let result = self.begin().and_then(|unit| {
            let removed = unit.tx.execute(
                "DELETE FROM reagent_process_association
                 WHERE reagent_id = ?1 AND process_id = ?2;",
                params![reagent_id, process_id],
            )?;
            unit.tx.commit()?;
            Ok(removed == 1)
        });
        log_write("association_unlink", Some(reagent_id), started_at, &result);
        result
    }

    fn processes_of(&self, reagent_id: ReagentId) -> RepoResult<Vec<ProcessId>> {
        ensure_exists(self.conn(), EntityKind::Reagent, reagent_id)?;
        collect_ids(
            self.conn(),
            "SELECT process_id FROM reagent_process_association
             WHERE reagent_id = ?1
             ORDER BY process_id ASC;",
            reagent_id,
        )
    }

    fn reagents_of(&self, process_id: ProcessId) -> RepoResult<Vec<ReagentId>> {
        ensure_exists(self.conn(), EntityKind::Process, process_id)?;
        collect_ids(
            self.conn(),
            "SELECT reagent_id FROM reagent_process_association
             WHERE process_id = ?1
             ORDER BY reagent_id ASC;",
            process_id,
        )
    }

    fn list_associations(&self) -> RepoResult<Vec<ReagentProcessAssociation>> {
        let mut stmt = self.conn().prepare(
            "SELECT reagent_id, process_id
             FROM reagent_process_association
             ORDER BY reagent_id ASC, process_id ASC;",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ReagentProcessAssociation {
                    reagent_id: row.get(0)?,
                    process_id: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

/// Removes every join row mentioning `reagent_id`. Returns rows removed.
pub(crate) fn detach_reagent(conn: &Connection, reagent_id: ReagentId) -> RepoResult<usize> {
    let removed = conn.execute(
        "DELETE FROM reagent_process_association WHERE reagent_id = ?1;",
        [reagent_id],
    )?;
    Ok(removed)
}

/// Removes every join row mentioning `process_id`. Returns rows removed.
pub(crate) fn detach_process(conn: &Connection, process_id: ProcessId) -> RepoResult<usize> {
    let removed = conn.execute(
        "DELETE FROM reagent_process_association WHERE process_id = ?1;",
        [process_id],
    )?;
    Ok(removed)
}

fn collect_ids(conn: &Connection, sql: &str, key: i64) -> RepoResult<Vec<i64>> {
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
        .query_map([key], |row| row.get(0))?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(ids)
}
