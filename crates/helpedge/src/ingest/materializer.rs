//! Conversion of parsed mail into persisted tickets.

use thiserror::Error;
use tracing::{debug, warn};

use crate::db::{counter_repo, ticket_repo, Database, DatabaseError};
use crate::email::ParsedEmail;
use crate::model::{
    format_ticket_number, truncate_chars, Category, NewTicket, Ticket, TicketPriority,
    TicketSource, TicketStatus, MAX_CUSTOMER_NAME_CHARS, MAX_DESCRIPTION_CHARS, MAX_TITLE_CHARS,
    TICKET_NUMBER_WIDTH,
};

use super::NO_SUBJECT;

#[derive(Error, Debug)]
pub enum MaterializeError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// Two freshly allocated numbers were both already taken.
    #[error("Ticket number {ticket_number} already in use after retry")]
    NumberCollision { ticket_number: String },
}

/// Builds the ticket record for a parsed message without touching the store.
pub fn build_ticket(parsed: &ParsedEmail, category: &Category, created_by: &str) -> NewTicket {
    let title = parsed.subject.as_deref().unwrap_or(NO_SUBJECT);

    NewTicket {
        title: truncate_chars(title, MAX_TITLE_CHARS),
        description: truncate_chars(&parsed.body, MAX_DESCRIPTION_CHARS),
        status: TicketStatus::Open,
        priority: TicketPriority::Medium,
        category_id: category.id.clone(),
        assigned_to: None,
        created_by: created_by.to_string(),
        customer_email: parsed.from_address.trim().to_lowercase(),
        customer_name: parsed
            .from_name
            .as_deref()
            .map(|name| truncate_chars(name, MAX_CUSTOMER_NAME_CHARS)),
        source: TicketSource::Email,
        message_id: parsed.message_id.clone(),
    }
}

/// Persists tickets under freshly allocated ticket numbers.
pub struct TicketMaterializer {
    db: Database,
    created_by: String,
}

impl TicketMaterializer {
    pub fn new(db: Database, created_by: impl Into<String>) -> Self {
        Self {
            db,
            created_by: created_by.into(),
        }
    }

    /// Allocates the next ticket number from the shared counter.
    pub fn next_ticket_number(&self) -> Result<String, DatabaseError> {
        let value = counter_repo::next_value(&self.db, counter_repo::TICKET_NUMBER_COUNTER)?;
        Ok(format_ticket_number(value, TICKET_NUMBER_WIDTH))
    }

    /// Creates the ticket for one message.
    ///
    /// The insert is a single statement, so a failure leaves nothing behind.
    /// A number that is already taken (for example after the counter was
    /// reset) is retried once with a new number.
    pub fn materialize(
        &self,
        parsed: &ParsedEmail,
        category: &Category,
    ) -> Result<Ticket, MaterializeError> {
        let new_ticket = build_ticket(parsed, category, &self.created_by);

        let mut retried = false;
        loop {
            let ticket_number = self.next_ticket_number()?;
            match ticket_repo::insert(&self.db, &ticket_number, &new_ticket) {
                Ok(ticket) => {
                    debug!(ticket_number = %ticket.ticket_number, "Ticket stored");
                    return Ok(ticket);
                }
                Err(e) if e.is_unique_violation_on("ticket_number") => {
                    if retried {
                        return Err(MaterializeError::NumberCollision { ticket_number });
                    }
                    warn!(%ticket_number, "Ticket number already taken, allocating another");
                    retried = true;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
