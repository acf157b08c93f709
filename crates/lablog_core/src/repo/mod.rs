//! Repository layer: the entity store and the association manager.
//!
//! # Responsibility
//! - Define one repository contract per entity plus the join contract.
//! - Enforce uniqueness, foreign-key and audit-stamp rules on every write.
//! - Translate SQLite failures into semantic errors.
//!
//! # Invariants
//! - Every mutation runs in one `BEGIN IMMEDIATE` transaction; an error
//!   before commit rolls back everything the call wrote.
//! - `SqliteLabStore` owns its connection and is the only write path.
//! - Invariant checks run inside the write transaction; SQLite constraints
//!   are a backstop, not the primary check.

use crate::db::DbError;
use crate::model::process::ProcessTypeParseError;
use rusqlite::types::Value;
use rusqlite::{Connection, ErrorCode};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod association_repo;
pub mod process_repo;
pub mod reagent_repo;
mod store;
pub mod user_repo;

pub use store::SqliteLabStore;

pub(crate) const USERS_TABLE: &str = "users";
pub(crate) const REAGENTS_TABLE: &str = "reagents";
pub(crate) const PROCESSES_TABLE: &str = "processes";
pub(crate) const ASSOCIATION_TABLE: &str = "reagent_process_association";

pub type RepoResult<T> = Result<T, RepoError>;

/// Entity kinds addressable by surrogate id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    User,
    Reagent,
    Process,
}

impl EntityKind {
    pub fn table(self) -> &'static str {
        match self {
            Self::User => USERS_TABLE,
            Self::Reagent => REAGENTS_TABLE,
            Self::Process => PROCESSES_TABLE,
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::Reagent => "reagent",
            Self::Process => "process",
        })
    }
}

/// Errors from store and association operations.
#[derive(Debug)]
pub enum RepoError {
    /// Unique-key collision or a value outside an enum domain.
    ConstraintViolation {
        table: &'static str,
        column: &'static str,
        detail: String,
    },
    /// A referenced row does not exist at write time.
    ///
    /// `column` is `"*"` and `missing_id` is `None` when SQLite reported the
    /// failure without naming the offending key.
    ForeignKeyViolation {
        table: &'static str,
        column: &'static str,
        missing_id: Option<i64>,
    },
    /// The targeted row does not exist.
    NotFound { entity: EntityKind, id: i64 },
    /// Delete blocked by restrict-mode references.
    ReferentialIntegrity {
        entity: EntityKind,
        id: i64,
        referenced_by: &'static str,
        references: i64,
    },
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted into a valid record.
    InvalidData(String),
}

impl RepoError {
    /// Stable machine-readable code, used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConstraintViolation { .. } => "constraint_violation",
            Self::ForeignKeyViolation { .. } => "foreign_key_violation",
            Self::NotFound { .. } => "not_found",
            Self::ReferentialIntegrity { .. } => "referential_integrity",
            Self::Db(_) => "db_error",
            Self::UninitializedConnection { .. } => "uninitialized_connection",
            Self::MissingRequiredTable(_) => "missing_required_table",
            Self::InvalidData(_) => "invalid_data",
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConstraintViolation {
                table,
                column,
                detail,
            } => write!(f, "constraint violation on {table}.{column}: {detail}"),
            Self::ForeignKeyViolation {
                table,
                column,
                missing_id: Some(id),
            } => write!(f, "{table}.{column} references missing user {id}"),
            Self::ForeignKeyViolation {
                table,
                missing_id: None,
                ..
            } => write!(f, "foreign key violation on {table}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::ReferentialIntegrity {
                entity,
                id,
                referenced_by,
                references,
            } => write!(
                f,
                "{entity} {id} is still referenced by {references} row(s) in {referenced_by}"
            ),
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "lab store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "lab store requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Text outside the `pre`/`post` domain is an enum-domain breach.
impl From<ProcessTypeParseError> for RepoError {
    fn from(value: ProcessTypeParseError) -> Self {
        Self::ConstraintViolation {
            table: PROCESSES_TABLE,
            column: "process_type",
            detail: value.to_string(),
        }
    }
}

/// Maps a failed INSERT/UPDATE on `table` to a semantic error.
///
/// Only reached when a constraint fires that the explicit checks did not
/// catch first; non-constraint failures stay `Db`.
pub(crate) fn write_error(err: rusqlite::Error, table: &'static str) -> RepoError {
    let (extended_code, message) = match err {
        rusqlite::Error::SqliteFailure(failure, message)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            (failure.extended_code, message.unwrap_or_default())
        }
        other => return other.into(),
    };

    if extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY {
        return RepoError::ForeignKeyViolation {
            table,
            column: "*",
            missing_id: None,
        };
    }

    RepoError::ConstraintViolation {
        table,
        column: column_named_in(&message, table),
        detail: message,
    }
}

fn column_named_in(message: &str, table: &'static str) -> &'static str {
    const KNOWN_COLUMNS: &[(&str, &str)] = &[
        (USERS_TABLE, "full_name"),
        (REAGENTS_TABLE, "lot"),
        (PROCESSES_TABLE, "process_type"),
        (ASSOCIATION_TABLE, "reagent_id"),
    ];
    KNOWN_COLUMNS
        .iter()
        .find(|(known_table, column)| *known_table == table && message.contains(column))
        .map_or("*", |(_, column)| column)
}

/// Returns whether a row with `id` exists in `table`.
pub(crate) fn row_exists(conn: &Connection, table: &'static str, id: i64) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?1);"),
        [id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

/// Fails with `NotFound` unless `entity` row `id` exists.
pub(crate) fn ensure_exists(conn: &Connection, entity: EntityKind, id: i64) -> RepoResult<()> {
    if row_exists(conn, entity.table(), id)? {
        Ok(())
    } else {
        Err(RepoError::NotFound { entity, id })
    }
}

/// Fails with `ForeignKeyViolation` unless `user_id` resolves to a user.
pub(crate) fn ensure_user_reference(
    conn: &Connection,
    table: &'static str,
    column: &'static str,
    user_id: i64,
) -> RepoResult<()> {
    if row_exists(conn, USERS_TABLE, user_id)? {
        Ok(())
    } else {
        Err(RepoError::ForeignKeyViolation {
            table,
            column,
            missing_id: Some(user_id),
        })
    }
}

/// Appends `ORDER BY id` plus optional pagination to a list query.
pub(crate) fn push_order_and_page(
    sql: &mut String,
    bind_values: &mut Vec<Value>,
    limit: Option<u32>,
    offset: u32,
) {
    sql.push_str(" ORDER BY id ASC");
    if let Some(limit) = limit {
        sql.push_str(" LIMIT ?");
        bind_values.push(Value::Integer(i64::from(limit)));
        if offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(offset)));
        }
    } else if offset > 0 {
        sql.push_str(" LIMIT -1 OFFSET ?");
        bind_values.push(Value::Integer(i64::from(offset)));
    }
}

#[cfg(test)]
mod tests {
    use super::{
        column_named_in, push_order_and_page, write_error, RepoError, REAGENTS_TABLE, USERS_TABLE,
    };
    use crate::db::open_db_in_memory;
    use rusqlite::types::Value;

    #[test]
    fn column_is_recovered_from_sqlite_unique_message() {
        assert_eq!(
            column_named_in("UNIQUE constraint failed: users.full_name", USERS_TABLE),
            "full_name"
        );
        assert_eq!(
            column_named_in("UNIQUE constraint failed: reagents.lot", REAGENTS_TABLE),
            "lot"
        );
        assert_eq!(column_named_in("NOT NULL constraint failed", USERS_TABLE), "*");
    }

    #[test]
    fn unique_failure_from_sqlite_maps_to_constraint_violation() {
        let conn = open_db_in_memory().unwrap();
        let insert = "INSERT INTO users (full_name, created_at) VALUES ('Ada', 1);";
        conn.execute(insert, []).unwrap();

        let err = conn.execute(insert, []).unwrap_err();

        match write_error(err, USERS_TABLE) {
            RepoError::ConstraintViolation {
                table,
                column,
                detail,
            } => {
                assert_eq!((table, column), ("users", "full_name"));
                assert!(detail.contains("UNIQUE"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn foreign_key_failure_from_sqlite_maps_to_unnamed_violation() {
        let conn = open_db_in_memory().unwrap();

        let err = conn
            .execute(
                "INSERT INTO reagents (name, lot, created_at, created_by, updated_at, updated_by)
                 VALUES ('Acetone', 'L1', 1, 99, 1, 99);",
                [],
            )
            .unwrap_err();

        assert!(matches!(
            write_error(err, REAGENTS_TABLE),
            RepoError::ForeignKeyViolation {
                table: "reagents",
                column: "*",
                missing_id: None
            }
        ));
    }

    #[test]
    fn non_constraint_failure_stays_db_error() {
        let conn = open_db_in_memory().unwrap();

        let err = conn
            .execute("INSERT INTO missing_table (id) VALUES (1);", [])
            .unwrap_err();

        assert!(matches!(write_error(err, USERS_TABLE), RepoError::Db(_)));
    }

    #[test]
    fn pagination_uses_unbounded_limit_for_offset_only() {
        let mut sql = String::from("SELECT id FROM users");
        let mut binds = Vec::new();
        push_order_and_page(&mut sql, &mut binds, None, 3);
        assert!(sql.ends_with("ORDER BY id ASC LIMIT -1 OFFSET ?"));
        assert_eq!(binds, vec![Value::Integer(3)]);
    }
}
