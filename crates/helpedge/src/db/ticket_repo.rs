//! Ticket repository: operations on the `tickets` table.

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use crate::model::{
    is_valid_ticket_number, NewTicket, Ticket, TicketPriority, TicketSource, TicketStatus,
};

use super::category_repo::parse_timestamp;
use super::{Database, DatabaseError};

struct TicketRow {
    id: String,
    ticket_number: String,
    title: String,
    description: String,
    status: String,
    priority: String,
    category_id: String,
    assigned_to: Option<String>,
    created_by: String,
    customer_email: String,
    customer_name: Option<String>,
    source: String,
    message_id: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TicketRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            ticket_number: row.get("ticket_number")?,
            title: row.get("title")?,
            description: row.get("description")?,
            status: row.get("status")?,
            priority: row.get("priority")?,
            category_id: row.get("category_id")?,
            assigned_to: row.get("assigned_to")?,
            created_by: row.get("created_by")?,
            customer_email: row.get("customer_email")?,
            customer_name: row.get("customer_name")?,
            source: row.get("source")?,
            message_id: row.get("message_id")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn into_ticket(self) -> Result<Ticket, DatabaseError> {
        Ok(Ticket {
            status: self
                .status
                .parse::<TicketStatus>()
                .map_err(|e| DatabaseError::InvalidColumn {
                    column: "status",
                    value: e.value,
                })?,
            priority: self.priority.parse::<TicketPriority>().map_err(|e| {
                DatabaseError::InvalidColumn {
                    column: "priority",
                    value: e.value,
                }
            })?,
            source: self
                .source
                .parse::<TicketSource>()
                .map_err(|e| DatabaseError::InvalidColumn {
                    column: "source",
                    value: e.value,
                })?,
            created_at: parse_timestamp("created_at", self.created_at)?,
            updated_at: parse_timestamp("updated_at", self.updated_at)?,
            id: self.id,
            ticket_number: self.ticket_number,
            title: self.title,
            description: self.description,
            category_id: self.category_id,
            assigned_to: self.assigned_to,
            created_by: self.created_by,
            customer_email: self.customer_email,
            customer_name: self.customer_name,
            message_id: self.message_id,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT id, ticket_number, title, description, status, priority,
     category_id, assigned_to, created_by, customer_email, customer_name, source, message_id,
     created_at, updated_at FROM tickets";

/// Inserts a ticket under the given number in a single statement.
///
/// A taken number surfaces as a UNIQUE violation on `tickets.ticket_number`.
pub fn insert(
    db: &Database,
    ticket_number: &str,
    new: &NewTicket,
) -> Result<Ticket, DatabaseError> {
    if !is_valid_ticket_number(ticket_number) {
        return Err(DatabaseError::Validation(format!(
            "invalid ticket number '{}'",
            ticket_number
        )));
    }
    if new.customer_email.trim().is_empty() {
        return Err(DatabaseError::Validation(
            "customer email is required".to_string(),
        ));
    }

    let now = Utc::now();
    let ticket = Ticket {
        id: uuid::Uuid::new_v4().to_string(),
        ticket_number: ticket_number.to_string(),
        title: new.title.clone(),
        description: new.description.clone(),
        status: new.status,
        priority: new.priority,
        category_id: new.category_id.clone(),
        assigned_to: new.assigned_to.clone(),
        created_by: new.created_by.clone(),
        customer_email: new.customer_email.clone(),
        customer_name: new.customer_name.clone(),
        source: new.source,
        message_id: new.message_id.clone(),
        created_at: now,
        updated_at: now,
    };

    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO tickets (id, ticket_number, title, description, status, priority,
             category_id, assigned_to, created_by, customer_email, customer_name, source,
             message_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                ticket.id,
                ticket.ticket_number,
                ticket.title,
                ticket.description,
                ticket.status.as_str(),
                ticket.priority.as_str(),
                ticket.category_id,
                ticket.assigned_to,
                ticket.created_by,
                ticket.customer_email,
                ticket.customer_name,
                ticket.source.as_str(),
                ticket.message_id,
                ticket.created_at.to_rfc3339(),
                ticket.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    })?;

    Ok(ticket)
}

fn find_one(
    db: &Database,
    clause: &str,
    value: &str,
) -> Result<Option<Ticket>, DatabaseError> {
    let row = db.with_conn(|conn| {
        let row = conn
            .query_row(
                &format!("{} WHERE {} = ?1 ORDER BY created_at ASC LIMIT 1", SELECT_COLUMNS, clause),
                params![value],
                TicketRow::from_row,
            )
            .optional()?;
        Ok(row)
    })?;
    row.map(TicketRow::into_ticket).transpose()
}

/// Finds a ticket by its `TKT-NNNNNN` number.
pub fn find_by_number(db: &Database, ticket_number: &str) -> Result<Option<Ticket>, DatabaseError> {
    find_one(db, "ticket_number", ticket_number)
}

/// Finds the earliest ticket created from the given mail Message-ID.
pub fn find_by_message_id(db: &Database, message_id: &str) -> Result<Option<Ticket>, DatabaseError> {
    find_one(db, "message_id", message_id)
}

/// Lists the most recently created tickets, newest first.
pub fn list_recent(db: &Database, limit: u32) -> Result<Vec<Ticket>, DatabaseError> {
    let rows = db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "{} ORDER BY created_at DESC, ticket_number DESC LIMIT ?1",
            SELECT_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![limit], TicketRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })?;
    rows.into_iter().map(TicketRow::into_ticket).collect()
}

/// Counts tickets that arrived through the given source.
pub fn count_by_source(db: &Database, source: TicketSource) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM tickets WHERE source = ?1",
            params![source.as_str()],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Counts all tickets.
pub fn count(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM tickets", [], |r| r.get(0))?;
        Ok(count)
    })
}
