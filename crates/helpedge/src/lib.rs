pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod secrets;

pub use config::{load_config, load_config_from_env, IngestConfig, MailboxConfig};
pub use db::{Database, DatabaseError};
pub use email::{EmailParser, ImapClient, MailError, MailTransport, ParsedEmail};
pub use error::{ConfigError, HelpedgeError, Result};
pub use ingest::{IngestError, IngestOrchestrator, IngestScheduler, RunReport};
pub use model::{Category, Ticket, TicketPriority, TicketSource, TicketStatus};
pub use secrets::{SecretError, SecretSource};
