//! Run-level and per-message ingestion errors.

use std::time::Duration;

use thiserror::Error;

use crate::db::DatabaseError;
use crate::email::{MailError, MessageId, ParseError};

use super::materializer::MaterializeError;
use super::report::MessageStage;

/// Errors that abort a whole ingestion run.
///
/// The transport has already been closed when one of these is returned.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Network, TLS or authentication failure while opening the session.
    #[error("Could not connect to mailbox: {0}")]
    Connection(#[source] MailError),

    /// The inbox could not be opened.
    #[error("Could not open mailbox: {0}")]
    Mailbox(#[source] MailError),

    /// The unread search failed, so nothing could be processed.
    #[error("Could not list unread messages: {0}")]
    Enumerate(#[source] MailError),

    /// A fetch or flag round trip left the session unusable, so the rest of
    /// the run was abandoned rather than reading another message's responses.
    #[error("Mailbox session lost at message {id} ({stage}): {source}")]
    SessionLost {
        id: MessageId,
        stage: MessageStage,
        #[source]
        source: MailError,
    },

    /// The run exceeded its wall-clock budget and was abandoned.
    #[error("Run exceeded its {budget:?} budget after creating {tickets_created} tickets")]
    RunTimeout {
        budget: Duration,
        tickets_created: usize,
    },

    /// Processing panicked; the connection was still closed.
    #[error("Run panicked: {0}")]
    Panicked(String),
}

/// A failure confined to one message. The run continues with the next one.
#[derive(Error, Debug)]
pub enum MessageError {
    #[error("fetch failed: {0}")]
    Fetch(#[source] MailError),

    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),

    #[error("category resolution failed: {0}")]
    Category(#[source] DatabaseError),

    #[error("ticket creation failed: {0}")]
    Materialize(#[from] MaterializeError),
}

impl MessageError {
    /// Splits off mailbox errors after which the session cannot be reused.
    pub fn into_session_fatal(self) -> Result<MailError, Self> {
        match self {
            MessageError::Fetch(e) if e.is_session_fatal() => Ok(e),
            other => Err(other),
        }
    }

    /// The processing stage at which the message failed.
    pub fn stage(&self) -> MessageStage {
        match self {
            MessageError::Fetch(_) => MessageStage::Fetch,
            MessageError::Parse(_) => MessageStage::Parse,
            MessageError::Category(_) => MessageStage::ResolveCategory,
            MessageError::Materialize(_) => MessageStage::Materialize,
        }
    }
}
