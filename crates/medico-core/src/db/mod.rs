//! Database layer for medico.

mod schema;
mod accounts;
mod catalog;
mod patients;
mod reports;
mod staff;

pub use schema::*;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Transaction, TransactionBehavior};
use std::path::Path;
use thiserror::Error;

use crate::auth::AuthError;
use crate::models::{AttendanceStatus, Gender, ReportStatus};
use crate::templates::{ParameterTemplate, PARAMETER_TEMPLATES};
use crate::validation::{missing_pk, ValidationErrors};

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Credential error: {0}")]
    Auth(#[from] AuthError),
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
    templates: &'static [ParameterTemplate],
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> DbResult<Self> {
        let db = Self {
            conn,
            templates: PARAMETER_TEMPLATES,
        };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Replace the parameter templates applied when lab tests are created.
    pub fn set_parameter_templates(&mut self, templates: &'static [ParameterTemplate]) {
        self.templates = templates;
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin a write transaction.
    ///
    /// IMMEDIATE takes the write lock up front, so reads made inside the
    /// transaction cannot be invalidated by another writer before commit.
    pub(crate) fn write_transaction(&self) -> DbResult<Transaction<'_>> {
        Ok(Transaction::new_unchecked(
            &self.conn,
            TransactionBehavior::Immediate,
        )?)
    }

    /// Whether `table` has a row with this id.
    pub(crate) fn row_exists(&self, table: &str, id: i64) -> DbResult<bool> {
        let sql = format!("SELECT 1 FROM {} WHERE id = ?", table);
        Ok(self
            .conn
            .query_row(&sql, [id], |_| Ok(()))
            .optional()?
            .is_some())
    }

    /// Record a field error when a referenced row is missing.
    pub(crate) fn check_reference(
        &self,
        errors: &mut ValidationErrors,
        field: &str,
        table: &str,
        id: i64,
    ) -> DbResult<()> {
        if !self.row_exists(table, id)? {
            errors.add(field, missing_pk(id));
        }
        Ok(())
    }

    /// Record a field error when `field = value` is already taken by another row.
    ///
    /// `label` names the entity in the message ("test category with this name already exists.").
    pub(crate) fn check_unique<V: ToSql>(
        &self,
        errors: &mut ValidationErrors,
        table: &str,
        label: &str,
        field: &str,
        value: V,
        exclude_id: Option<i64>,
    ) -> DbResult<()> {
        let sql = format!("SELECT 1 FROM {} WHERE {} = ?1 AND id != ?2", table, field);
        let taken = self
            .conn
            .query_row(&sql, rusqlite::params![value, exclude_id.unwrap_or(-1)], |_| Ok(()))
            .optional()?
            .is_some();
        if taken {
            errors.add(
                field,
                format!("{} with this {} already exists.", label, field.replace('_', " ")),
            );
        }
        Ok(())
    }

    /// Delete a row by id from `table`.
    pub(crate) fn delete_row(&self, table: &str, id: i64) -> DbResult<bool> {
        let sql = format!("DELETE FROM {} WHERE id = ?", table);
        let rows_affected = self.conn.execute(&sql, [id])?;
        Ok(rows_affected > 0)
    }
}

/// Turn constraint failures that slipped past validation into `DbError::Constraint`.
pub(crate) fn constraint_error(err: rusqlite::Error) -> DbError {
    match &err {
        rusqlite::Error::SqliteFailure(e, msg) if e.code == ErrorCode::ConstraintViolation => {
            DbError::Constraint(msg.clone().unwrap_or_else(|| e.to_string()))
        }
        _ => DbError::Sqlite(err),
    }
}

pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

macro_rules! text_enum_sql {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let s = value.as_str()?;
                <$ty>::parse(s).ok_or_else(|| {
                    FromSqlError::Other(format!("unknown {} value: {}", stringify!($ty), s).into())
                })
            }
        }
    };
}

text_enum_sql!(Gender);
text_enum_sql!(ReportStatus);
text_enum_sql!(AttendanceStatus);
