//! Scripted in-memory mailbox.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::Duration;

use async_trait::async_trait;

use helpedge::email::error::Result;
use helpedge::email::{MailError, MailTransport, MailboxInfo, MessageId};

/// In-memory [`MailTransport`] with per-operation failure injection.
#[derive(Default)]
pub struct FakeTransport {
    messages: BTreeMap<u32, Vec<u8>>,
    seen: BTreeSet<u32>,
    next_id: u32,
    connected: bool,

    pub fail_connect: bool,
    pub fail_select: bool,
    pub fail_list: bool,
    pub fail_fetch: HashSet<u32>,
    pub fail_mark_seen: HashSet<u32>,
    /// Ids whose fetch expires like an unanswered round trip.
    pub timeout_fetch: HashSet<u32>,
    pub timeout_mark_seen: HashSet<u32>,
    pub panic_on_fetch: bool,
    pub fetch_delay: Option<Duration>,

    pub connect_calls: usize,
    pub close_calls: usize,
    pub fetch_calls: usize,
    pub mark_seen_calls: usize,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Self::default()
        }
    }

    /// Mailbox pre-filled with unread messages.
    pub fn with_messages<I>(messages: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let mut transport = Self::new();
        for raw in messages {
            transport.push(raw);
        }
        transport
    }

    /// Adds an unread message and returns its id.
    pub fn push(&mut self, raw: Vec<u8>) -> MessageId {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        self.messages.insert(id, raw);
        MessageId(id)
    }

    pub fn is_seen(&self, id: u32) -> bool {
        self.seen.contains(&id)
    }

    pub fn unseen_count(&self) -> usize {
        self.messages.len() - self.seen.len()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn require_connection(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(MailError::NotConnected("fake transport not connected"))
        }
    }
}

#[async_trait]
impl MailTransport for FakeTransport {
    async fn connect(&mut self) -> Result<()> {
        self.connect_calls += 1;
        if self.fail_connect {
            return Err(MailError::AuthenticationFailed("bad credentials".to_string()));
        }
        self.connected = true;
        Ok(())
    }

    async fn select_inbox(&mut self) -> Result<MailboxInfo> {
        self.require_connection()?;
        if self.fail_select {
            return Err(MailError::MailboxUnavailable {
                folder: "INBOX".to_string(),
                reason: "no such mailbox".to_string(),
            });
        }
        Ok(MailboxInfo {
            name: "INBOX".to_string(),
            exists: self.messages.len() as u32,
            unseen_hint: None,
        })
    }

    async fn list_unseen(&mut self) -> Result<Vec<MessageId>> {
        self.require_connection()?;
        if self.fail_list {
            return Err(MailError::ProtocolError("SEARCH rejected".to_string()));
        }
        Ok(self
            .messages
            .keys()
            .filter(|id| !self.seen.contains(id))
            .map(|id| MessageId(*id))
            .collect())
    }

    async fn fetch_raw(&mut self, id: MessageId) -> Result<Vec<u8>> {
        self.require_connection()?;
        self.fetch_calls += 1;
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        if self.panic_on_fetch {
            panic!("fetch exploded");
        }
        if self.timeout_fetch.contains(&id.0) {
            return Err(MailError::Timeout {
                operation: "fetch",
                timeout: Duration::from_secs(30),
            });
        }
        if self.fail_fetch.contains(&id.0) {
            return Err(MailError::FetchFailed {
                id,
                reason: "connection reset".to_string(),
            });
        }
        self.messages
            .get(&id.0)
            .cloned()
            .ok_or_else(|| MailError::FetchFailed {
                id,
                reason: "no such message".to_string(),
            })
    }

    async fn mark_seen(&mut self, id: MessageId) -> Result<()> {
        self.require_connection()?;
        self.mark_seen_calls += 1;
        if self.timeout_mark_seen.contains(&id.0) {
            return Err(MailError::Timeout {
                operation: "store",
                timeout: Duration::from_secs(30),
            });
        }
        if self.fail_mark_seen.contains(&id.0) {
            return Err(MailError::FlagFailed {
                id,
                reason: "STORE rejected".to_string(),
            });
        }
        self.seen.insert(id.0);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.close_calls += 1;
        self.connected = false;
        Ok(())
    }
}
