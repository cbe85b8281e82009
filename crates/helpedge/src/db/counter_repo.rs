//! Named monotonic counters in the `counters` table.
//!
//! Sequence numbers come from a single atomic upsert-increment statement, so
//! concurrent producers (threads or processes sharing the database file) can
//! never observe the same value.

use rusqlite::{params, OptionalExtension};

use super::{Database, DatabaseError};

/// Counter used to derive ticket numbers.
pub const TICKET_NUMBER_COUNTER: &str = "ticketNumber";

/// Atomically increments the named counter and returns the new value.
///
/// A counter that does not exist yet starts at 1.
pub fn next_value(db: &Database, name: &str) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        let value: i64 = conn.query_row(
            "INSERT INTO counters (name, value) VALUES (?1, 1)
             ON CONFLICT(name) DO UPDATE SET value = value + 1
             RETURNING value",
            params![name],
            |r| r.get(0),
        )?;
        log::debug!("Counter '{}' advanced to {}", name, value);
        Ok(value)
    })
}

/// Reads the current value of a counter without changing it.
pub fn current_value(db: &Database, name: &str) -> Result<Option<i64>, DatabaseError> {
    db.with_conn(|conn| {
        let value = conn
            .query_row(
                "SELECT value FROM counters WHERE name = ?1",
                params![name],
                |r| r.get::<_, i64>(0),
            )
            .optional()?;
        Ok(value)
    })
}
