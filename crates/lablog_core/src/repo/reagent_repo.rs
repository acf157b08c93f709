//! Reagent repository contract and SQLite implementation.
//!
//! # Invariants
//! - `lot` is unique; an update may keep the row's own lot.
//! - `created_by`/`updated_by` must resolve to users at write time.
//! - Insert stamps `created_at == updated_at`; each update moves
//!   `updated_at` strictly forward and never touches `created_at`.
//! - Deleting a reagent removes its join rows first, in the same transaction.

use super::association_repo::detach_reagent;
use super::store::{log_write, SqliteLabStore, UnitOfWork};
use super::{
    ensure_exists, ensure_user_reference, push_order_and_page, write_error, EntityKind, RepoError,
    RepoResult, REAGENTS_TABLE,
};
use crate::clock::{restamp, Clock};
use crate::model::reagent::{NewReagent, Reagent, ReagentId, ReagentPatch};
use crate::model::user::UserId;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::time::Instant;

const REAGENT_SELECT_SQL: &str = "SELECT
    id,
    name,
    lot,
    created_at,
    created_by,
    updated_at,
    updated_by
FROM reagents";

/// Query options for listing reagents. Set fields must all match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReagentListQuery {
    pub name: Option<String>,
    pub lot: Option<String>,
    pub created_by: Option<UserId>,
    pub updated_by: Option<UserId>,
    /// Matches rows where the user is creator or last editor.
    pub touched_by: Option<UserId>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for reagent records.
pub trait ReagentRepository {
    fn insert_reagent(&mut self, reagent: &NewReagent) -> RepoResult<Reagent>;
    fn update_reagent(&mut self, id: ReagentId, patch: &ReagentPatch) -> RepoResult<Reagent>;
    fn delete_reagent(&mut self, id: ReagentId) -> RepoResult<()>;
    fn get_reagent(&self, id: ReagentId) -> RepoResult<Option<Reagent>>;
    fn find_reagent_by_lot(&self, lot: &str) -> RepoResult<Option<Reagent>>;
    /// Lists reagents ordered by id.
    fn list_reagents(&self, query: &ReagentListQuery) -> RepoResult<Vec<Reagent>>;
}

impl<C: Clock> ReagentRepository for SqliteLabStore<C> {
    fn insert_reagent(&mut self, reagent: &NewReagent) -> RepoResult<Reagent> {
        let started_at = Instant::now();
        let result = self.begin().and_then(|unit| insert_in(unit, reagent));
        let id = result.as_ref().ok().map(|created| created.id);
        log_write("reagent_insert", id, started_at, &result);
        result
    }

    fn update_reagent(&mut self, id: ReagentId, patch: &ReagentPatch) -> RepoResult<Reagent> {
        let started_at = Instant::now();
        let result = self.begin().and_then(|unit| update_in(unit, id, patch));
        log_write("reagent_update", Some(id), started_at, &result);
        result
    }

    fn delete_reagent(&mut self, id: ReagentId) -> RepoResult<()> {
        let started_at = Instant::now();
        let result = self.begin().and_then(|unit| {
            ensure_exists(&unit.tx, EntityKind::Reagent, id)?;
            detach_reagent(&unit.tx, id)?;
            unit.tx.execute("DELETE FROM reagents WHERE id = ?1;", [id])?;
            unit.tx.commit()?;
            Ok(())
        });
        log_write("reagent_delete", Some(id), started_at, &result);
        result
    }

    fn get_reagent(&self, id: ReagentId) -> RepoResult<Option<Reagent>> {
        load_reagent(self.conn(), id)
    }

    fn find_reagent_by_lot(&self, lot: &str) -> RepoResult<Option<Reagent>> {
        let reagent = self
            .conn()
            .query_row(
                &format!("{REAGENT_SELECT_SQL} WHERE lot = ?1;"),
                [lot],
                parse_reagent_row,
            )
            .optional()?;
        Ok(reagent)
    }

    fn list_reagents(&self, query: &ReagentListQuery) -> RepoResult<Vec<Reagent>> {
        let mut sql = format!("{REAGENT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(name) = &query.name {
            sql.push_str(" AND name = ?");
            bind_values.push(Value::Text(name.clone()));
        }
        if let Some(lot) = &query.lot {
            sql.push_str(" AND lot = ?");
            bind_values.push(Value::Text(lot.clone()));
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
        let reagents = stmt
            .query_map(params_from_iter(bind_values), parse_reagent_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(reagents)
    }
}

fn insert_in(unit: UnitOfWork<'_>, reagent: &NewReagent) -> RepoResult<Reagent> {
    ensure_lot_available(&unit.tx, &reagent.lot, None)?;
    ensure_user_reference(&unit.tx, REAGENTS_TABLE, "created_by", reagent.created_by)?;
    ensure_user_reference(&unit.tx, REAGENTS_TABLE, "updated_by", reagent.updated_by)?;

    unit.tx
        .execute(
            "INSERT INTO reagents (
                name,
                lot,
                created_at,
                created_by,
                updated_at,
                updated_by
            ) VALUES (?1, ?2, ?3, ?4, ?3, ?5);",
            params![
                reagent.name.as_str(),
                reagent.lot.as_str(),
                unit.now,
                reagent.created_by,
                reagent.updated_by,
            ],
        )
        .map_err(|err| write_error(err, REAGENTS_TABLE))?;

    let created = Reagent {
        id: unit.tx.last_insert_rowid(),
        name: reagent.name.clone(),
        lot: reagent.lot.clone(),
        created_at: unit.now,
        created_by: reagent.created_by,
        updated_at: unit.now,
        updated_by: reagent.updated_by,
    };
    unit.tx.commit()?;
    Ok(created)
}

fn update_in(unit: UnitOfWork<'_>, id: ReagentId, patch: &ReagentPatch) -> RepoResult<Reagent> {
    let current = load_reagent(&unit.tx, id)?.ok_or(RepoError::NotFound {
        entity: EntityKind::Reagent,
        id,
    })?;

    let mut next = current.clone();
    patch.apply_to(&mut next);
    if patch.lot.is_some() {
        ensure_lot_available(&unit.tx, &next.lot, Some(id))?;
    }
    if patch.created_by.is_some() {
        ensure_user_reference(&unit.tx, REAGENTS_TABLE, "created_by", next.created_by)?;
    }
    if patch.updated_by.is_some() {
        ensure_user_reference(&unit.tx, REAGENTS_TABLE, "updated_by", next.updated_by)?;
    }
    next.updated_at = restamp(unit.now, current.updated_at);

    unit.tx
        .execute(
            "UPDATE reagents
             SET
                name = ?2,
                lot = ?3,
                created_by = ?4,
                updated_at = ?5,
                updated_by = ?6
             WHERE id = ?1;",
            params![
                id,
                next.name.as_str(),
                next.lot.as_str(),
                next.created_by,
                next.updated_at,
                next.updated_by,
            ],
        )
        .map_err(|err| write_error(err, REAGENTS_TABLE))?;
    unit.tx.commit()?;
    Ok(next)
}

fn load_reagent(conn: &Connection, id: ReagentId) -> RepoResult<Option<Reagent>> {
    let reagent = conn
        .query_row(
            &format!("{REAGENT_SELECT_SQL} WHERE id = ?1;"),
            [id],
            parse_reagent_row,
        )
        .optional()?;
    Ok(reagent)
}

fn parse_reagent_row(row: &Row<'_>) -> rusqlite::Result<Reagent> {
    Ok(Reagent {
        id: row.get("id")?,
        name: row.get("name")?,
        lot: row.get("lot")?,
        created_at: row.get("created_at")?,
        created_by: row.get("created_by")?,
        updated_at: row.get("updated_at")?,
        updated_by: row.get("updated_by")?,
    })
}

fn ensure_lot_available(conn: &Connection, lot: &str, except_id: Option<ReagentId>) -> RepoResult<()> {
    let taken: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM reagents WHERE lot = ?1 AND id IS NOT ?2
        );",
        params![lot, except_id],
        |row| row.get(0),
    )?;
    if taken == 1 {
        return Err(RepoError::ConstraintViolation {
            table: REAGENTS_TABLE,
            column: "lot",
            detail: "lot is already assigned to another reagent".to_string(),
        });
    }
    Ok(())
}
