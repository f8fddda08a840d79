//! Classification of SQLx errors into repository errors.

use crate::error::RepositoryError;

/// SQLSTATE `serialization_failure`.
const SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE `deadlock_detected`.
const DEADLOCK_DETECTED: &str = "40P01";
/// SQLSTATE class 23: integrity constraint violation.
const INTEGRITY_CONSTRAINT_CLASS: &str = "23";

/// Maps a driver error onto the repository taxonomy.
///
/// Serialization failures and deadlocks become [`RepositoryError::Conflict`]
/// (transient), pool timeouts become [`RepositoryError::PoolExhausted`] (transient),
/// class-23 violations become [`RepositoryError::Constraint`]. Everything else is
/// an opaque backend failure.
pub fn classify_sqlx_error(e: sqlx::Error) -> RepositoryError {
    match &e {
        sqlx::Error::PoolTimedOut => return RepositoryError::PoolExhausted,
        sqlx::Error::RowNotFound => {
            return RepositoryError::NotFound {
                entity: "row",
                id: String::new(),
            };
        }
        _ => {}
    }

    let Some(db_err) = e.as_database_error() else {
        return RepositoryError::Backend(e.to_string());
    };

    let code = db_err.code().map(|c| c.into_owned()).unwrap_or_default();

    if code == SERIALIZATION_FAILURE || code == DEADLOCK_DETECTED {
        return RepositoryError::Conflict(db_err.message().to_string());
    }

    if code.starts_with(INTEGRITY_CONSTRAINT_CLASS) {
        let constraint = db_err
            .constraint()
            .map(str::to_string)
            .unwrap_or_else(|| db_err.message().to_string());
        return RepositoryError::Constraint(constraint);
    }

    RepositoryError::Backend(e.to_string())
}

impl From<sqlx::Error> for RepositoryError {
    fn from(e: sqlx::Error) -> Self {
        classify_sqlx_error(e)
    }
}
