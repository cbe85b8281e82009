//! Mailbox access for the ingestion pipeline.
//!
//! [`MailTransport`] is the seam the orchestrator drives; [`ImapClient`] is the
//! production implementation over IMAPS. [`EmailParser`] reduces fetched bytes
//! to a [`ParsedEmail`].

pub mod client;
pub mod error;
pub mod parser;
pub mod transport;

pub use client::ImapClient;
pub use error::{MailError, ParseError};
pub use parser::{EmailParser, ParsedEmail, UNKNOWN_SENDER};
pub use transport::{MailTransport, MailboxInfo, MessageId};
