//! Mapping of database errors onto the transaction contract.

use eventide_core::StoreError;

/// `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// `lock_not_available`, raised when `lock_timeout` expires.
const LOCK_NOT_AVAILABLE: &str = "55P03";

/// Classifies a `sqlx` error by its SQLSTATE.
#[must_use]
pub fn store_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            Some(UNIQUE_VIOLATION) => return StoreError::Duplicate(db.message().to_owned()),
            Some(LOCK_NOT_AVAILABLE) => {
                return StoreError::LockNotAvailable(db.message().to_owned());
            }
            _ => {}
        }
    }
    StoreError::Backend(err.to_string())
}

/// Converts an unsigned counter to a `BIGINT` column value.
pub(crate) fn to_bigint(value: u64, column: &str) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Backend(format!("{column} {value} overflows BIGINT")))
}

/// Converts a `BIGINT` column value back to an unsigned counter.
pub(crate) fn from_bigint(value: i64, column: &str) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::Backend(format!("{column} {value} is negative")))
}
