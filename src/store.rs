use thiserror::Error;

use crate::slips::repo_types::SlipStatus;

/// Failures surfaced by the user and slip stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate {0}")]
    DuplicateKey(&'static str),

    #[error("record not found")]
    NotFound,

    #[error("slip is already {0}")]
    InvalidTransition(SlipStatus),

    #[error("database error: {0}")]
    Unavailable(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Maps a PostgreSQL unique violation (SQLSTATE 23505) to the field it guards.
pub(crate) fn unique_violation(err: &sqlx::Error) -> Option<&'static str> {
    let sqlx::Error::Database(db_err) = err else {
        return None;
    };
    if db_err.code().as_deref() != Some("23505") {
        return None;
    }
    let field = match db_err.constraint() {
        Some(c) if c.contains("username") => "username",
        Some(c) if c.contains("email") => "email",
        Some(c) if c.contains("slip_number") => "slipNumber",
        _ => "record",
    };
    Some(field)
}

/// Converts a sqlx error, promoting unique violations to `DuplicateKey`.
pub(crate) fn map_db_err(err: sqlx::Error) -> StoreError {
    match unique_violation(&err) {
        Some(field) => StoreError::DuplicateKey(field),
        None => StoreError::Unavailable(err),
    }
}
