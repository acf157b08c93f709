//! User repository contract and SQLite implementation.
//!
//! # Invariants
//! - `full_name` is unique across all users.
//! - Every update refreshes the user's `created_at` stamp.
//! - Deleting a user referenced by any reagent or process as creator or
//!   editor is rejected under `DeletePolicy::Restrict` and cascades to those
//!   rows under `DeletePolicy::Cascade`.

use super::store::{log_write, SqliteLabStore, UnitOfWork};
use super::{
    ensure_exists, push_order_and_page, write_error, EntityKind, RepoError, RepoResult,
    PROCESSES_TABLE, REAGENTS_TABLE, USERS_TABLE,
};
use crate::clock::{restamp, Clock};
use crate::config::DeletePolicy;
use crate::model::user::{NewUser, User, UserId, UserPatch};
use log::info;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::time::Instant;

const USER_SELECT_SQL: &str = "SELECT id, full_name, created_at FROM users";

/// Query options for listing users.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserListQuery {
    /// Case-sensitive `full_name` prefix filter.
    pub full_name_prefix: Option<String>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for user records.
pub trait UserRepository {
    fn insert_user(&mut self, user: &NewUser) -> RepoResult<User>;
    fn update_user(&mut self, id: UserId, patch: &UserPatch) -> RepoResult<User>;
    fn delete_user(&mut self, id: UserId) -> RepoResult<()>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    fn find_user_by_full_name(&self, full_name: &str) -> RepoResult<Option<User>>;
    /// Lists users ordered by id.
    fn list_users(&self, query: &UserListQuery) -> RepoResult<Vec<User>>;
}

impl<C: Clock> UserRepository for SqliteLabStore<C> {
    fn insert_user(&mut self, user: &NewUser) -> RepoResult<User> {
        let started_at = Instant::now();
        let result = self.begin().and_then(|unit| insert_in(unit, user));
        let id = result.as_ref().ok().map(|created| created.id);
        log_write("user_insert", id, started_at, &result);
        result
    }

    fn update_user(&mut self, id: UserId, patch: &UserPatch) -> RepoResult<User> {
        let started_at = Instant::now();
        let result = self.begin().and_then(|unit| update_in(unit, id, patch));
        log_write("user_update", Some(id), started_at, &result);
        result
    }

    fn delete_user(&mut self, id: UserId) -> RepoResult<()> {
        let started_at = Instant::now();
        let result = self.begin().and_then(|unit| delete_in(unit, id));
        log_write("user_delete", Some(id), started_at, &result);
        result
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        load_user(self.conn(), id)
    }

    fn find_user_by_full_name(&self, full_name: &str) -> RepoResult<Option<User>> {
        let user = self
            .conn()
            .query_row(
                &format!("{USER_SELECT_SQL} WHERE full_name = ?1;"),
                [full_name],
                parse_user_row,
            )
            .optional()?;
        Ok(user)
    }

    fn list_users(&self, query: &UserListQuery) -> RepoResult<Vec<User>> {
        let mut sql = format!("{USER_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(prefix) = &query.full_name_prefix {
            sql.push_str(" AND substr(full_name, 1, length(?)) = ?");
            bind_values.push(Value::Text(prefix.clone()));
            bind_values.push(Value::Text(prefix.clone()));
        }
        push_order_and_page(&mut sql, &mut bind_values, query.limit, query.offset);

        let mut stmt = self.conn().prepare(&sql)?;
        let users = stmt
            .query_map(params_from_iter(bind_values), parse_user_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }
}

fn insert_in(unit: UnitOfWork<'_>, user: &NewUser) -> RepoResult<User> {
    ensure_full_name_available(&unit.tx, &user.full_name, None)?;
    unit.tx
        .execute(
            "INSERT INTO users (full_name, created_at) VALUES (?1, ?2);",
            params![user.full_name.as_str(), unit.now],
        )
        .map_err(|err| write_error(err, USERS_TABLE))?;
    let created = User {
        id: unit.tx.last_insert_rowid(),
        full_name: user.full_name.clone(),
        created_at: unit.now,
    };
    unit.tx.commit()?;
    Ok(created)
}

fn update_in(unit: UnitOfWork<'_>, id: UserId, patch: &UserPatch) -> RepoResult<User> {
    let current = load_user(&unit.tx, id)?.ok_or(RepoError::NotFound {
        entity: EntityKind::User,
        id,
    })?;
    if let Some(full_name) = &patch.full_name {
        ensure_full_name_available(&unit.tx, full_name, Some(id))?;
    }

    let mut next = current.clone();
    patch.apply_to(&mut next);
    next.created_at = restamp(unit.now, current.created_at);

    unit.tx
        .execute(
            "UPDATE users SET full_name = ?2, created_at = ?3 WHERE id = ?1;",
            params![id, next.full_name.as_str(), next.created_at],
        )
        .map_err(|err| write_error(err, USERS_TABLE))?;
    unit.tx.commit()?;
    Ok(next)
}

fn delete_in(unit: UnitOfWork<'_>, id: UserId) -> RepoResult<()> {
    ensure_exists(&unit.tx, EntityKind::User, id)?;

    let reagent_refs = count_references(&unit.tx, REAGENTS_TABLE, id)?;
    let process_refs = count_references(&unit.tx, PROCESSES_TABLE, id)?;
    match unit.user_delete_policy {
        DeletePolicy::Restrict => {
            let referencing = [(REAGENTS_TABLE, reagent_refs), (PROCESSES_TABLE, process_refs)];
            for (table, references) in referencing {
                if references > 0 {
                    return Err(RepoError::ReferentialIntegrity {
                        entity: EntityKind::User,
                        id,
                        referenced_by: table,
                        references,
                    });
                }
            }
        }
        DeletePolicy::Cascade if reagent_refs + process_refs > 0 => {
            let links = cascade_user_references(&unit.tx, id)?;
            info!(
                "event=user_delete_cascade module=repo status=ok id={id} reagents={reagent_refs} processes={process_refs} links={links}"
            );
        }
        DeletePolicy::Cascade => {}
    }

    unit.tx.execute("DELETE FROM users WHERE id = ?1;", [id])?;
    unit.tx.commit()?;
    Ok(())
}

fn load_user(conn: &Connection, id: UserId) -> RepoResult<Option<User>> {
    let user = conn
        .query_row(
            &format!("{USER_SELECT_SQL} WHERE id = ?1;"),
            [id],
            parse_user_row,
        )
        .optional()?;
    Ok(user)
}

fn parse_user_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        full_name: row.get("full_name")?,
        created_at: row.get("created_at")?,
    })
}

fn ensure_full_name_available(
    conn: &Connection,
    full_name: &str,
    except_id: Option<UserId>,
) -> RepoResult<()> {
    let taken: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM users WHERE full_name = ?1 AND id IS NOT ?2
        );",
        params![full_name, except_id],
        |row| row.get(0),
    )?;
    if taken == 1 {
        return Err(RepoError::ConstraintViolation {
            table: USERS_TABLE,
            column: "full_name",
            detail: "full_name is already taken by another user".to_string(),
        });
    }
    Ok(())
}

fn count_references(conn: &Connection, table: &'static str, user_id: UserId) -> RepoResult<i64> {
    let count = conn.query_row(
        &format!("SELECT COUNT(*) FROM {table} WHERE created_by = ?1 OR updated_by = ?1;"),
        [user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Removes every reagent and process that references `user_id`, join rows
/// first. Returns the number of join rows removed.
fn cascade_user_references(conn: &Connection, user_id: UserId) -> RepoResult<usize> {
    let links = conn.execute(
        "DELETE FROM reagent_process_association
         WHERE reagent_id IN (
                SELECT id FROM reagents WHERE created_by = ?1 OR updated_by = ?1
            )
            OR process_id IN (
                SELECT id FROM processes WHERE created_by = ?1 OR updated_by = ?1
            );",
        [user_id],
    )?;
    conn.execute(
        "DELETE FROM reagents WHERE created_by = ?1 OR updated_by = ?1;",
        [user_id],
    )?;
    conn.execute(
        "DELETE FROM processes WHERE created_by = ?1 OR updated_by = ?1;",
        [user_id],
    )?;
    Ok(links)
}
