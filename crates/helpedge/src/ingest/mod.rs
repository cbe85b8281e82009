//! Mailbox-to-ticket ingestion pipeline.
//!
//! One run connects to the mailbox, lists unread messages and drives each
//! through fetch, parse, category resolution, ticket creation and
//! acknowledgement. A message is flagged as seen only after its ticket is
//! stored, so a crash mid-run leaves unprocessed mail unread for the next run.

pub mod category;
pub mod error;
pub mod materializer;
pub mod orchestrator;
pub mod report;
pub mod scheduler;

pub use category::CategoryResolver;
pub use error::{IngestError, MessageError};
pub use materializer::{build_ticket, MaterializeError, TicketMaterializer};
pub use orchestrator::{IngestOptions, IngestOrchestrator};
pub use report::{MessageFailure, MessageStage, RunReport};
pub use scheduler::{IngestScheduler, TransportFactory};

/// Category assigned to every mail-originated ticket.
pub const DEFAULT_CATEGORY_NAME: &str = "General";

pub const DEFAULT_CATEGORY_DESCRIPTION: &str = "Default category for unclassified tickets";

/// Neutral gray.
pub const DEFAULT_CATEGORY_COLOR: &str = "#6B7280";

/// Title used for messages without a subject.
pub const NO_SUBJECT: &str = "(No Subject)";
