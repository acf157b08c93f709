//! Process repository contract and SQLite implementation.
//!
//! # Invariants
//! - `process_type` is written only from the two-value `ProcessType` enum and
//!   read rows outside that domain are rejected, not masked.
//! - `created_by`/`updated_by` must resolve to users at write time.
//! - Insert stamps `created_at == updated_at`; each update moves
//!   `updated_at` strictly forward and never touches `created_at`.
//! - Deleting a process removes its join rows first, in the same transaction.

use super::association_repo::detach_process;
use super::store::{log_write, SqliteLabStore, UnitOfWork};
use super::{
    ensure_exists, ensure_user_reference, push_order_and_page, write_error, EntityKind, RepoError,
    RepoResult, PROCESSES_TABLE,
};
use crate::clock::{restamp, Clock};
use crate::model::process::{NewProcess, Process, ProcessId, ProcessPatch, ProcessType};
use crate::model::user::UserId;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::time::Instant;

const PROCESS_SELECT_SQL: &str = "SELECT
    id,
    name,
    process_type,
    created_at,
    created_by,
    updated_at,
    updated_by
FROM processes";

/// Query options for listing processes. Set fields must all match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessListQuery {
    pub name: Option<String>,
    pub process_type: Option<ProcessType>,
    pub created_by: Option<UserId>,
    pub updated_by: Option<UserId>,
    /// Matches rows where the user is creator or last editor.
    pub touched_by: Option<UserId>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for process records.
pub trait ProcessRepository {
    fn insert_process(&mut self, process: &NewProcess) -> RepoResult<Process>;
    fn update_process(&mut self, id: ProcessId, patch: &ProcessPatch) -> RepoResult<Process>;
    fn delete_process(&mut self, id: ProcessId) -> RepoResult<()>;
    fn get_process(&self, id: ProcessId) -> RepoResult<Option<Process>>;
    /// Lists processes ordered by id.
    fn list_processes(&self, query: &ProcessListQuery) -> RepoResult<Vec<Process>>;
}

impl<C: Clock> ProcessRepository for SqliteLabStore<C> {
    fn insert_process(&mut self, process: &NewProcess) -> RepoResult<Process> {
        let started_at = Instant::now();
        let result = self.begin().and_then(|unit| insert_in(unit, process));
        let id = result.as_ref().ok().map(|created| created.id);
        log_write("process_insert", id, started_at, &result);
        result
    }

    fn update_process(&mut self, id: ProcessId, patch: &ProcessPatch) -> RepoResult<Process> {
        let started_at = Instant::now();
        let result = self.begin().and_then(|unit| update_in(unit, id, patch));
        log_write("process_update", Some(id), started_at, &result);
        result
    }

    fn delete_process(&mut self, id: ProcessId) -> RepoResult<()> {
        let started_at = Instant::now();
        let result = self.begin().and_then(|unit| {
            ensure_exists(&unit.tx, EntityKind::Process, id)?;
            detach_process(&unit.tx, id)?;
            unit.tx.execute("DELETE FROM processes WHERE id = ?1;", [id])?;
            unit.tx.commit()?;
            Ok(())
        });
        log_write("process_delete", Some(id), started_at, &result);
        result
    }

    fn get_process(&self, id: ProcessId) -> RepoResult<Option<Process>> {
        load_process(self.conn(), id)
    }

    fn list_processes(&self, query: &ProcessListQuery) -> RepoResult<Vec<Process>> {
        let mut sql = format!("{PROCESS_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(name) = &query.name {
            sql.push_str(" AND name = ?");
            bind_values.push(Value::Text(name.clone()));
        }
        if let Some(process_type) = query.process_type {
            sql.push_str(" AND process_type = ?");
            bind_values.push(Value::Text(process_type.as_str().to_string()));
        }
        if let Some(user_id) = query.created_by {
            sql.push_str(" AND created_by = ?");
            bind_values.push(Value::Integer(user_id));
        }
        if let Some(user_id) = query.updated_by {
            sql.push_str(" AND updated_by = ?");
            bind_values.push(Value::Integer(user_id));
        }
        if let Some(user_id) = query.touched_by {
            sql.push_str(" AND (created_by = ? OR updated_by = ?)");
            bind_values.push(Value::Integer(user_id));
            bind_values.push(Value::Integer(user_id));
        }
        push_order_and_page(&mut sql, &mut bind_values, query.limit, query.offset);

        let mut stmt = self.conn().prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut processes = Vec::new();
        while let Some(row) = rows.next()? {
            processes.push(parse_process_row(row)?);
        }
        Ok(processes)
    }
}

fn insert_in(unit: UnitOfWork<'_>, process: &NewProcess) -> RepoResult<Process> {
    ensure_user_reference(&unit.tx, PROCESSES_TABLE, "created_by", process.created_by)?;
    ensure_user_reference(&unit.tx, PROCESSES_TABLE, "updated_by", process.updated_by)?;

    unit.tx
        .execute(
            "INSERT INTO processes (
                name,
                process_type,
                created_at,
                created_by,
                updated_at,
                updated_by
            ) VALUES (?1, ?2, ?3, ?4, ?3, ?5);",
            params![
                process.name.as_str(),
                process.process_type.as_str(),
                unit.now,
                process.created_by,
                process.updated_by,
            ],
        )
        .map_err(|err| write_error(err, PROCESSES_TABLE))?;

    let created = Process {
        id: unit.tx.last_insert_rowid(),
        name: process.name.clone(),
        process_type: process.process_type,
        created_at: unit.now,
        created_by: process.created_by,
        updated_at: unit.now,
        updated_by: process.updated_by,
    };
    unit.tx.commit()?;
    Ok(created)
}

fn update_in(unit: UnitOfWork<'_>, id: ProcessId, patch: &ProcessPatch) -> RepoResult<Process> {
    let current = load_process(&unit.tx, id)?.ok_or(RepoError::NotFound {
        entity: EntityKind::Process,
        id,
    })?;

    let mut next = current.clone();
    patch.apply_to(&mut next);
    if patch.created_by.is_some() {
        ensure_user_reference(&unit.tx, PROCESSES_TABLE, "created_by", next.created_by)?;
    }
    if patch.updated_by.is_some() {
        ensure_user_reference(&unit.tx, PROCESSES_TABLE, "updated_by", next.updated_by)?;
    }
    next.updated_at = restamp(unit.now, current.updated_at);

    unit.tx
        .execute(
            "UPDATE processes
             SET
                name = ?2,
                process_type = ?3,
                created_by = ?4,
                updated_at = ?5,
                updated_by = ?6
             WHERE id = ?1;",
            params![
                id,
                next.name.as_str(),
                next.process_type.as_str(),
                next.created_by,
                next.updated_at,
                next.updated_by,
            ],
        )
        .map_err(|err| write_error(err, PROCESSES_TABLE))?;
    unit.tx.commit()?;
    Ok(next)
}

fn load_process(conn: &Connection, id: ProcessId) -> RepoResult<Option<Process>> {
    let mut stmt = conn.prepare(&format!("{PROCESS_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_process_row(row)?));
    }
    Ok(None)
}

fn parse_process_row(row: &Row<'_>) -> RepoResult<Process> {
    let type_text: String = row.get("process_type")?;
    let process_type = type_text.parse::<ProcessType>().map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid process type `{type_text}` in processes.process_type"
        ))
    })?;

    Ok(Process {
        id: row.get("id")?,
        name: row.get("name")?,
        process_type,
        created_at: row.get("created_at")?,
        created_by: row.get("created_by")?,
        updated_at: row.get("updated_at")?,
        updated_by: row.get("updated_by")?,
    })
}
