use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::secrets::SecretSource;

/// Top-level configuration for the ingestion job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestConfig {
    /// Mailbox to poll.
    pub mailbox: MailboxConfig,

    /// Seconds between scheduled runs (default: 300 = 5 minutes).
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    /// Wall-clock budget for one run in seconds. A run that exceeds it is
    /// abandoned and its connection force-closed.
    #[serde(default = "default_max_run_duration")]
    pub max_run_duration: u64,

    /// SQLite database file. Defaults to `~/.helpedge/data/helpedge.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,

    /// Identity recorded as the creator of mail-originated tickets and of the
    /// default category.
    #[serde(default = "default_system_user_id")]
    pub system_user_id: String,

    /// Skip messages whose Message-ID already produced a ticket.
    #[serde(default)]
    pub dedupe_by_message_id: bool,
}

impl IngestConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    pub fn max_run_duration(&self) -> Duration {
        Duration::from_secs(self.max_run_duration)
    }

    /// Resolves the database location, falling back to the default path.
    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        self.database_path
            .clone()
            .or_else(crate::db::default_database_path)
    }
}

/// Connection settings for the IMAP mailbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxConfig {
    /// IMAP server hostname (e.g., "imap.gmail.com").
    pub host: String,

    /// IMAP server port (default: 993 for IMAPS).
    #[serde(default = "default_imap_port")]
    pub port: u16,

    /// Whether to use TLS (required).
    #[serde(default = "default_true")]
    pub use_tls: bool,

    /// Login name (typically the mailbox address).
    pub username: String,

    /// Where the password comes from.
    #[serde(default)]
    pub password: SecretSource,

    /// Folder to ingest from (default: "INBOX").
    #[serde(default = "default_inbox")]
    pub folder: String,

    /// Skip certificate validation. Only for servers with self-signed
    /// certificates on a trusted network; logged loudly on every connect.
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// Per-operation time limits.
    #[serde(default)]
    pub timeouts: ImapTimeouts,
}

/// Time limits for individual IMAP round trips, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImapTimeouts {
    pub connect: u64,
    pub auth: u64,
    pub select: u64,
    pub search: u64,
    pub fetch: u64,
    pub store: u64,
    pub logout: u64,
}

impl Default for ImapTimeouts {
    fn default() -> Self {
        Self {
            connect: 30,
            auth: 30,
            select: 30,
            search: 60,
            fetch: 60,
            store: 30,
            logout: 10,
        }
    }
}

impl ImapTimeouts {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect)
    }

    pub fn auth(&self) -> Duration {
        Duration::from_secs(self.auth)
    }

    pub fn select(&self) -> Duration {
        Duration::from_secs(self.select)
    }

    pub fn search(&self) -> Duration {
        Duration::from_secs(self.search)
    }

    pub fn fetch(&self) -> Duration {
        Duration::from_secs(self.fetch)
    }

    pub fn store(&self) -> Duration {
        Duration::from_secs(self.store)
    }

    pub fn logout(&self) -> Duration {
        Duration::from_secs(self.logout)
    }
}

fn default_poll_interval() -> u64 {
    300
}

fn default_max_run_duration() -> u64 {
    240
}

fn default_system_user_id() -> String {
    "system".to_string()
}

fn default_imap_port() -> u16 {
    993
}

fn default_true() -> bool {
    true
}

fn default_inbox() -> String {
    "INBOX".to_string()
}
