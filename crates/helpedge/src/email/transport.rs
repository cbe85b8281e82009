//! The seam between the ingestion orchestrator and a mail server.

use std::fmt;

use async_trait::async_trait;

use super::error::Result;

/// IMAP message UID within the selected folder.
///
/// Stable while the folder's UIDVALIDITY holds, unlike sequence numbers which
/// shift on EXPUNGE. Still only used within one run and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(pub u32);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Summary of the selected mailbox.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxInfo {
    pub name: String,
    pub exists: u32,
    pub unseen_hint: Option<u32>,
}

/// Operations the ingestion pipeline needs from a mailbox.
///
/// Implementations bound every round trip with a timeout. `close` must be
/// safe to call in any state, including before `connect` and more than once.
#[async_trait]
pub trait MailTransport: Send {
    /// Opens an encrypted session and authenticates.
    async fn connect(&mut self) -> Result<()>;

    /// Opens the inbox read/write so messages can be flagged.
    async fn select_inbox(&mut self) -> Result<MailboxInfo>;

    /// Returns every message that is unread at the time of the call.
    async fn list_unseen(&mut self) -> Result<Vec<MessageId>>;

    /// Retrieves the complete raw message without marking it read.
    async fn fetch_raw(&mut self, id: MessageId) -> Result<Vec<u8>>;

    /// Sets the `\Seen` flag.
    async fn mark_seen(&mut self, id: MessageId) -> Result<()>;

    /// Logs out and releases the connection.
    async fn close(&mut self) -> Result<()>;
}
