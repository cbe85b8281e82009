//! Ticket store backed by SQLite.
//!
//! `Database` is an explicitly owned handle: the connection is opened lazily
//! on first use, migrations run exactly once, and every clone shares the same
//! connection. All access is serialized through a `Mutex<Connection>`, which
//! is fine for SQLite (which serializes writes anyway).

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use once_cell::sync::OnceCell;
use rusqlite::Connection;

pub mod category_repo;
pub mod counter_repo;
pub mod error;
pub mod migrations;
pub mod ticket_repo;

pub use error::DatabaseError;

/// How long a statement waits on a lock held by another connection.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    Memory,
}

struct Inner {
    location: Location,
    busy_timeout: Duration,
    conn: OnceCell<Mutex<Connection>>,
}

/// Thread-safe, lazily-initialized database handle.
///
/// Cloning is cheap (inner `Arc`).
#[derive(Clone)]
pub struct Database {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("location", &self.inner.location)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl Database {
    /// Creates a handle for the database at `path`. Nothing is opened until
    /// the first query.
    pub fn lazy(path: impl Into<PathBuf>) -> Self {
        Self::with_location(Location::File(path.into()), DEFAULT_BUSY_TIMEOUT)
    }

    /// Opens (or creates) the database at the given path and runs all
    /// pending migrations immediately.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        let db = Self::lazy(path);
        db.connection()?;
        Ok(db)
    }

    /// Opens an in-memory database for testing. Runs all migrations.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let db = Self::with_location(Location::Memory, DEFAULT_BUSY_TIMEOUT);
        db.connection()?;
        Ok(db)
    }

    /// Overrides the SQLite busy timeout. Only effective before first use.
    pub fn with_busy_timeout(self, busy_timeout: Duration) -> Self {
        if self.is_initialized() {
            log::warn!("Busy timeout change ignored: database already initialized");
            return self;
        }
        Self::with_location(self.inner.location.clone(), busy_timeout)
    }

    fn with_location(location: Location, busy_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                location,
                busy_timeout,
                conn: OnceCell::new(),
            }),
        }
    }

    /// Returns true once the underlying connection has been opened.
    pub fn is_initialized(&self) -> bool {
        self.inner.conn.get().is_some()
    }

    fn connection(&self) -> Result<&Mutex<Connection>, DatabaseError> {
        self.inner.conn.get_or_try_init(|| {
            let conn = match &self.inner.location {
                Location::File(path) => {
                    if let Some(parent) = path.parent() {
                        if !parent.as_os_str().is_empty() {
                            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                                path: parent.to_path_buf(),
                                source: e,
                            })?;
                        }
                    }
                    let conn = Connection::open(path)?;
                    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
                    log::info!("Database opened at {}", path.display());
                    conn
                }
                Location::Memory => Connection::open_in_memory()?,
            };
            conn.execute_batch("PRAGMA foreign_keys=ON;")?;
            conn.busy_timeout(self.inner.busy_timeout)?;

            migrations::run_all(&conn)?;

            Ok(Mutex::new(conn))
        })
    }

    /// Provides locked access to the underlying connection, opening it first
    /// if needed.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self
            .connection()?
            .lock()
            .map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }
}

/// Returns the canonical database path: `~/.helpedge/data/helpedge.db`.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".helpedge").join("data").join("helpedge.db"))
}
