//! Schema versioning for the ticket store.
//!
//! Each step is applied inside its own transaction together with its row in
//! `_migrations`, and the resulting version is mirrored into
//! `PRAGMA user_version` so external tools can read it without a query.
//! A store written by a newer build is refused rather than modified.

use rusqlite::{params, Connection};

use super::error::DatabaseError;

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
    /// Set for `ALTER TABLE .. ADD COLUMN` steps, which SQLite cannot repeat.
    adds_column: Option<(&'static str, &'static str)>,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_categories_table",
        sql: include_str!("sql/001_create_categories.sql"),
        adds_column: None,
    },
    Migration {
        version: 2,
        name: "create_tickets_table",
        sql: include_str!("sql/002_create_tickets.sql"),
        adds_column: None,
    },
    Migration {
        version: 3,
        name: "create_counters_table",
        sql: include_str!("sql/003_create_counters.sql"),
        adds_column: None,
    },
    Migration {
        version: 4,
        name: "add_message_id_to_tickets",
        sql: include_str!("sql/004_add_message_id_to_tickets.sql"),
        adds_column: Some(("tickets", "message_id")),
    },
];

/// Highest schema version this build knows how to produce.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

/// Brings the schema up to [`latest_version`].
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let applied: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;
    let latest = latest_version();
    if applied > latest {
        return Err(DatabaseError::Migration {
            version: applied,
            reason: format!(
                "ticket store is at schema v{} but this build only knows v{}",
                applied, latest
            ),
        });
    }

    for step in MIGRATIONS.iter().filter(|m| m.version > applied) {
        apply(conn, step)?;
    }

    conn.pragma_update(None, "user_version", latest)?;
    Ok(())
}

fn apply(conn: &Connection, step: &Migration) -> Result<(), DatabaseError> {
    let failed = |e: rusqlite::Error| DatabaseError::Migration {
        version: step.version,
        reason: e.to_string(),
    };

    let tx = conn.unchecked_transaction()?;
    let already_there = match step.adds_column {
        Some((table, column)) => column_exists(&tx, table, column)?,
        None => false,
    };

    if already_there {
        log::info!("Schema v{} ({}) already present, recording only", step.version, step.name);
    } else {
        log::info!("Applying schema v{}: {}", step.version, step.name);
        tx.execute_batch(step.sql).map_err(failed)?;
    }

    tx.execute(
        "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
        params![step.version, step.name],
    )?;
    tx.commit().map_err(failed)?;
    Ok(())
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, DatabaseError> {
    // PRAGMA arguments cannot be bound, so the name is checked instead.
    if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(DatabaseError::Migration {
            version: 0,
            reason: format!("refusing to inspect table '{}'", table),
        });
    }
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let mut names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    names.try_fold(false, |found, name| Ok(found || name? == column))
}
