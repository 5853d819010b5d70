//! Database error translation.

use idemkey_core::{ExecutionKey, OnceError};

/// Maps driver errors from a claim insert to [`OnceError`].
///
/// The one decision that differs between engines is which error means "this
/// key already exists". Postgres reports unique violations as SQLSTATE
/// `23505`; an installation fronting a different engine through a foreign
/// data wrapper can plug in its own mapping here.
pub trait ErrorTranslator: Send + Sync {
    fn translate(&self, operation: &'static str, key: &ExecutionKey, err: sqlx::Error) -> OnceError;
}

/// [`ErrorTranslator`] for stock Postgres.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgErrorTranslator;

impl ErrorTranslator for PgErrorTranslator {
    fn translate(
        &self,
        operation: &'static str,
        key: &ExecutionKey,
        err: sqlx::Error,
    ) -> OnceError {
        if is_unique_violation(&err) {
            OnceError::duplicate(key.clone())
        } else {
            map_store_error(operation, err)
        }
    }
}

/// Check if an error is a unique constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

/// Map SQLx errors to [`OnceError::Store`].
pub(crate) fn map_store_error(operation: &'static str, err: sqlx::Error) -> OnceError {
    match err {
        sqlx::Error::Database(db_err) => {
            OnceError::store(operation, format!("database error: {}", db_err.message()))
        }
        sqlx::Error::PoolClosed => OnceError::store(operation, "connection pool closed"),
        other => OnceError::store(operation, other.to_string()),
    }
}
