//! Drives one ingestion run from connect to close.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::IngestConfig;
use crate::db::{ticket_repo, Database};
use crate::email::{EmailParser, MailTransport, MessageId};
use crate::model::{Ticket, MAX_DESCRIPTION_CHARS};

use super::category::CategoryResolver;
use super::error::{IngestError, MessageError};
use super::materializer::{MaterializeError, TicketMaterializer};
use super::report::{MessageFailure, MessageStage, RunReport};

/// Tunables for [`IngestOrchestrator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOptions {
    /// Creator recorded on tickets and on the default category.
    pub system_user_id: String,
    /// Wall-clock budget for a whole run.
    pub max_run_duration: Duration,
    /// Skip messages whose Message-ID already produced a ticket.
    pub dedupe_by_message_id: bool,
    /// Body length kept from each message.
    pub max_body_chars: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            system_user_id: "system".to_string(),
            max_run_duration: Duration::from_secs(240),
            dedupe_by_message_id: false,
            max_body_chars: MAX_DESCRIPTION_CHARS,
        }
    }
}

impl From<&IngestConfig> for IngestOptions {
    fn from(config: &IngestConfig) -> Self {
        Self {
            system_user_id: config.system_user_id.clone(),
            max_run_duration: config.max_run_duration(),
            dedupe_by_message_id: config.dedupe_by_message_id,
            max_body_chars: MAX_DESCRIPTION_CHARS,
        }
    }
}

enum Processed {
    Created(Ticket),
    Duplicate(Ticket),
}

/// Turns the unread messages of a mailbox into tickets.
pub struct IngestOrchestrator {
    db: Database,
    options: IngestOptions,
    parser: EmailParser,
    materializer: TicketMaterializer,
}

impl IngestOrchestrator {
    pub fn new(db: Database, options: IngestOptions) -> Self {
        Self {
            parser: EmailParser::new(options.max_body_chars),
            materializer: TicketMaterializer::new(db.clone(), options.system_user_id.clone()),
            db,
            options,
        }
    }

    pub fn from_config(db: Database, config: &IngestConfig) -> Self {
        Self::new(db, IngestOptions::from(config))
    }

    pub fn options(&self) -> &IngestOptions {
        &self.options
    }

    /// Runs one ingestion pass over `transport`.
    ///
    /// Per-message failures are logged and recorded in the report. The run
    /// fails on connection, mailbox or enumeration errors, on a fetch or
    /// flag error that leaves the session unusable (a timed-out round trip
    /// or a protocol error), on an exceeded run budget and on a panic. The
    /// transport is closed on every path.
    ///
    /// The budget is enforced at await points. Store calls are synchronous
    /// and are bounded by the database busy timeout instead, so a run can
    /// overshoot its budget by at most that much per statement.
    pub async fn run(&self, transport: &mut dyn MailTransport) -> Result<RunReport, IngestError> {
        let span = info_span!("ingest_run");
        async move {
            let started = Instant::now();
            let budget = self.options.max_run_duration;
            let mut report = RunReport::default();

            let outcome = tokio::time::timeout(
                budget,
                AssertUnwindSafe(self.drive(&mut *transport, &mut report)).catch_unwind(),
            )
            .await;

            let result = match outcome {
                Ok(Ok(result)) => result,
                Ok(Err(payload)) => Err(IngestError::Panicked(panic_message(&*payload))),
                Err(_) => {
                    warn!(
                        "Run budget of {:?} exhausted, abandoning remaining messages",
                        budget
                    );
                    Err(IngestError::RunTimeout {
                        budget,
                        tickets_created: report.tickets_created(),
                    })
                }
            };

            if let Err(e) = transport.close().await {
                warn!(error = %e, "Failed to close mailbox connection cleanly");
            }

            match result {
                Ok(()) => {
                    info!(
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Ingestion run finished: {}", report
                    );
                    Ok(report)
                }
                Err(e) => {
                    error!(error = %e, "Ingestion run failed");
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        transport: &mut dyn MailTransport,
        report: &mut RunReport,
    ) -> Result<(), IngestError> {
        transport.connect().await.map_err(IngestError::Connection)?;

        let mailbox = transport.select_inbox().await.map_err(IngestError::Mailbox)?;
        debug!(
            folder = %mailbox.name,
            exists = mailbox.exists,
            "Mailbox selected"
        );

        let ids = transport.list_unseen().await.map_err(IngestError::Enumerate)?;
        report.unseen = ids.len();
        if ids.is_empty() {
            info!("No unread messages");
            return Ok(());
        }
        info!("Processing {} unread messages", ids.len());

        let categories = CategoryResolver::new(self.db.clone(), self.options.system_user_id.clone());

        for id in ids {
            match self.process_message(transport, &categories, id).await {
                Ok(Processed::Created(ticket)) => {
                    info!(
                        uid = %id,
                        ticket_number = %ticket.ticket_number,
                        customer_email = %ticket.customer_email,
                        "Created ticket from email"
                    );
                    report.created.push(ticket.ticket_number);
                    self.acknowledge(transport, id, report).await?;
                }
                Ok(Processed::Duplicate(existing)) => {
                    info!(
                        uid = %id,
                        ticket_number = %existing.ticket_number,
                        "Message already has a ticket, acknowledging only"
                    );
                    report.duplicates += 1;
                    self.acknowledge(transport, id, report).await?;
                }
                Err(e) => {
                    let stage = e.stage();
                    let e = match e.into_session_fatal() {
                        Ok(source) => {
                            return Err(IngestError::SessionLost { id, stage, source });
                        }
                        Err(e) => e,
                    };
                    error!(uid = %id, stage = %stage, error = %e, "Skipping message, it stays unread");
                    report.record_failure(MessageFailure::new(id, stage, &e));
                }
            }
        }

        Ok(())
    }

    async fn process_message(
        &self,
        transport: &mut dyn MailTransport,
        categories: &CategoryResolver,
        id: MessageId,
    ) -> Result<Processed, MessageError> {
        let raw = transport.fetch_raw(id).await.map_err(MessageError::Fetch)?;
        let parsed = self.parser.parse(&raw)?;

        if parsed.has_unknown_sender() {
            warn!(uid = %id, "Message has no usable sender, using placeholder address");
        }

        if self.options.dedupe_by_message_id {
            if let Some(message_id) = &parsed.message_id {
                let existing = ticket_repo::find_by_message_id(&self.db, message_id)
                    .map_err(|e| MessageError::Materialize(MaterializeError::Database(e)))?;
                if let Some(existing) = existing {
                    return Ok(Processed::Duplicate(existing));
                }
            }
        }

        let category = categories
            .resolve_default()
            .map_err(MessageError::Category)?;
        let ticket = self.materializer.materialize(&parsed, &category)?;
        Ok(Processed::Created(ticket))
    }

    /// Flags the message as seen. A failure leaves the ticket in place; the
    /// message is picked up again next run.
    async fn acknowledge(
        &self,
        transport: &mut dyn MailTransport,
        id: MessageId,
        report: &mut RunReport,
    ) -> Result<(), IngestError> {
        if let Err(e) = transport.mark_seen(id).await {
            if e.is_session_fatal() {
                return Err(IngestError::SessionLost {
                    id,
                    stage: MessageStage::Acknowledge,
                    source: e,
                });
            }
            warn!(
                uid = %id,
                stage = %MessageStage::Acknowledge,
                error = %e,
                "Could not mark message as seen, it will be fetched again"
            );
            report.ack_failures += 1;
        }
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
