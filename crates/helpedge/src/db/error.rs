//! Database error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQLite error from rusqlite.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error when creating directories or files.
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A migration failed to apply.
    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    /// The database lock was poisoned.
    #[error("Database lock poisoned")]
    LockPoisoned,

    /// A stored value could not be mapped back onto a domain type.
    #[error("Invalid value '{value}' in column '{column}'")]
    InvalidColumn { column: &'static str, value: String },

    /// A record failed validation before it reached SQLite.
    #[error("Validation failed: {0}")]
    Validation(String),
}

impl DatabaseError {
    /// Returns true if this error is a UNIQUE (or PRIMARY KEY) constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => {
                err.code == rusqlite::ErrorCode::ConstraintViolation
                    && (err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                        || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
            }
            _ => false,
        }
    }

    /// Returns true if a UNIQUE violation names the given column in its message.
    pub fn is_unique_violation_on(&self, column: &str) -> bool {
        if !self.is_unique_violation() {
            return false;
        }
        match self {
            DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(_, Some(msg))) => {
                msg.contains(column)
            }
            _ => true,
        }
    }
}
