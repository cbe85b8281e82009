use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HelpedgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Ingestion run failed: {0}")]
    Ingest(#[from] crate::ingest::IngestError),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

pub type Result<T> = std::result::Result<T, HelpedgeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    #[test]
    fn test_unopenable_database_is_database_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let open = || -> Result<Database> { Ok(Database::open(&blocker.join("helpedge.db"))?) };
        let err = open().unwrap_err();
        assert!(matches!(err, HelpedgeError::Database(_)));
        assert!(err.to_string().starts_with("Database error"));
    }
}
