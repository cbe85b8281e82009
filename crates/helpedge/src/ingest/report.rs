//! Outcome of one ingestion run.

use std::fmt;

use serde::Serialize;

use crate::email::MessageId;

/// Per-message processing stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStage {
    Fetch,
    Parse,
    ResolveCategory,
    Materialize,
    Acknowledge,
}

impl MessageStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStage::Fetch => "fetch",
            MessageStage::Parse => "parse",
            MessageStage::ResolveCategory => "resolve_category",
            MessageStage::Materialize => "materialize",
            MessageStage::Acknowledge => "acknowledge",
        }
    }
}

impl fmt::Display for MessageStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message that did not produce a ticket. It stays unread on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageFailure {
    pub id: u32,
    pub stage: MessageStage,
    pub error: String,
}

impl MessageFailure {
    pub fn new(id: MessageId, stage: MessageStage, error: impl ToString) -> Self {
        Self {
            id: id.0,
            stage,
            error: error.to_string(),
        }
    }
}

/// Summary returned by a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Messages reported unread by the server.
    pub unseen: usize,
    /// Ticket numbers created, in processing order.
    pub created: Vec<String>,
    /// Messages skipped because their Message-ID already had a ticket.
    pub duplicates: usize,
    /// Messages that failed before a ticket existed.
    pub failures: Vec<MessageFailure>,
    /// Tickets whose message could not be flagged as seen. These messages
    /// are fetched again on the next run.
    pub ack_failures: usize,
}

impl RunReport {
    pub fn tickets_created(&self) -> usize {
        self.created.len()
    }

    /// True when every unread message was turned into a ticket and flagged.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.ack_failures == 0
    }

    pub(crate) fn record_failure(&mut self, failure: MessageFailure) {
        self.failures.push(failure);
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} unread, {} tickets created, {} duplicates, {} failed, {} not acknowledged",
            self.unseen,
            self.created.len(),
            self.duplicates,
            self.failures.len(),
            self.ack_failures
        )
    }
}
