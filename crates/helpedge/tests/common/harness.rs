//! Test harness with an isolated, file-backed ticket store.

#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;

use helpedge::db::{category_repo, ticket_repo};
use helpedge::ingest::{IngestOptions, IngestOrchestrator};
use helpedge::{Database, Ticket};

/// Temp-directory database plus orchestrator construction helpers.
pub struct TestHarness {
    temp_dir: TempDir,
    /// Path of the SQLite file inside the temp directory.
    pub db_path: PathBuf,
    pub db: Database,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("data").join("helpedge.db");
        let db = Database::open(&db_path).expect("Failed to open test database");
        Self {
            temp_dir,
            db_path,
            db,
        }
    }

    /// Like [`TestHarness::new`] with a custom SQLite busy timeout.
    pub fn with_busy_timeout(busy_timeout: Duration) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("data").join("helpedge.db");
        let db = Database::lazy(&db_path).with_busy_timeout(busy_timeout);
        ticket_repo::count(&db).expect("Failed to open test database");
        Self {
            temp_dir,
            db_path,
            db,
        }
    }

    pub fn options() -> IngestOptions {
        IngestOptions {
            system_user_id: "system".to_string(),
            max_run_duration: Duration::from_secs(30),
            dedupe_by_message_id: false,
            max_body_chars: 5000,
        }
    }

    pub fn orchestrator(&self) -> IngestOrchestrator {
        IngestOrchestrator::new(self.db.clone(), Self::options())
    }

    pub fn orchestrator_with(&self, options: IngestOptions) -> IngestOrchestrator {
        IngestOrchestrator::new(self.db.clone(), options)
    }

    /// A second, independent connection to the same database file.
    pub fn second_connection(&self) -> Database {
        Database::open(&self.db_path).expect("Failed to open second connection")
    }

    pub fn ticket_count(&self) -> u64 {
        ticket_repo::count(&self.db).unwrap()
    }

    pub fn ticket(&self, number: &str) -> Ticket {
        ticket_repo::find_by_number(&self.db, number)
            .unwrap()
            .unwrap_or_else(|| panic!("ticket {} not found", number))
    }

    pub fn general_category_rows(&self) -> u64 {
        category_repo::count_by_name(&self.db, "General").unwrap()
    }
}
