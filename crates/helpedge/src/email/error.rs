//! Mailbox transport and message parsing error types.

use std::time::Duration;

use thiserror::Error;

use super::transport::MessageId;

/// Errors that can occur while talking to the mail server.
#[derive(Error, Debug)]
pub enum MailError {
    /// Failed to reach the IMAP server.
    #[error("IMAP connection failed: {0}")]
    ConnectionFailed(String),

    /// TLS/SSL error during connection.
    #[error("TLS error: {0}")]
    TlsError(String),

    /// The server rejected the credentials.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// No password could be resolved from the configured sources.
    #[error("Credentials not found: {0}")]
    CredentialsNotFound(String),

    /// The folder could not be selected for read/write.
    #[error("Mailbox '{folder}' unavailable: {reason}")]
    MailboxUnavailable { folder: String, reason: String },

    /// Fetching one message failed.
    #[error("Failed to fetch message {id}: {reason}")]
    FetchFailed { id: MessageId, reason: String },

    /// Setting the \Seen flag failed.
    #[error("Failed to mark message {id} as seen: {reason}")]
    FlagFailed { id: MessageId, reason: String },

    /// IMAP protocol error.
    #[error("IMAP protocol error: {0}")]
    ProtocolError(String),

    /// An operation was attempted without an open session or mailbox.
    #[error("Not connected: {0}")]
    NotConnected(&'static str),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// A round trip exceeded its time budget.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
}

impl MailError {
    /// Whether the session can no longer be trusted for further commands.
    ///
    /// An expired round trip leaves unread responses on the wire, and a
    /// protocol error means client and server disagree about state. Either
    /// way the next command could read answers meant for an earlier one.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            MailError::Timeout { .. } | MailError::ProtocolError(_) | MailError::NotConnected(_)
        )
    }
}

impl From<async_native_tls::Error> for MailError {
    fn from(err: async_native_tls::Error) -> Self {
        MailError::TlsError(err.to_string())
    }
}

/// Errors from turning raw bytes into a [`ParsedEmail`](super::ParsedEmail).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The byte stream is not a readable RFC 5322 message.
    #[error("Unreadable message ({size} bytes): {reason}")]
    Unreadable { size: usize, reason: String },
}

/// Result type for mailbox operations.
pub type Result<T> = std::result::Result<T, MailError>;
