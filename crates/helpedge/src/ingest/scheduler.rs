//! Periodic ingestion scheduler.
//!
//! Runs the orchestrator on a fixed interval in a background thread and
//! accepts manual triggers through a broadcast channel.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::email::MailTransport;

use super::orchestrator::IngestOrchestrator;

/// Builds a fresh, unconnected transport for each run.
pub type TransportFactory = Arc<dyn Fn() -> Box<dyn MailTransport> + Send + Sync>;

/// Periodic ingestion scheduler.
pub struct IngestScheduler {
    orchestrator: Arc<IngestOrchestrator>,
    transport_factory: TransportFactory,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
    completed_runs: Arc<AtomicU64>,
}

impl IngestScheduler {
    pub fn new(
        orchestrator: Arc<IngestOrchestrator>,
        transport_factory: TransportFactory,
        interval: Duration,
    ) -> Self {
        Self {
            orchestrator,
            transport_factory,
            interval,
            shutdown: Arc::new(AtomicBool::new(false)),
            completed_runs: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start the ingestion loop in a background thread.
    ///
    /// The first run starts immediately. A run that overruns the interval
    /// delays the next one instead of causing a burst of catch-up runs.
    pub fn start(&self, mut trigger_rx: broadcast::Receiver<()>) -> std::io::Result<JoinHandle<()>> {
        let orchestrator = Arc::clone(&self.orchestrator);
        let factory = Arc::clone(&self.transport_factory);
        let shutdown = Arc::clone(&self.shutdown);
        let completed_runs = Arc::clone(&self.completed_runs);
        let interval = self.interval;

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        std::thread::Builder::new()
            .name("helpedge-ingest".to_string())
            .spawn(move || {
                rt.block_on(async {
                    let mut interval_timer = tokio::time::interval(interval);
                    interval_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

                    loop {
                        if shutdown.load(Ordering::Acquire) {
                            break;
                        }

                        tokio::select! {
                            _ = interval_timer.tick() => {},
                            Ok(()) = trigger_rx.recv() => {
                                info!("Manual ingestion run triggered");
                            },
                        }

                        if shutdown.load(Ordering::Acquire) {
                            break;
                        }

                        let mut transport = factory();
                        match orchestrator.run(transport.as_mut()).await {
                            Ok(report) if report.tickets_created() > 0 => {
                                info!("Ingestion created {} tickets", report.tickets_created());
                            }
                            Ok(_) => {}
                            Err(e) => error!("Scheduled ingestion failed: {}", e),
                        }
                        completed_runs.fetch_add(1, Ordering::AcqRel);
                    }

                    info!("Ingestion scheduler stopped");
                });
            })
    }

    /// Signals the scheduler to stop.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// Number of runs finished so far, successful or not.
    pub fn completed_runs(&self) -> u64 {
        self.completed_runs.load(Ordering::Acquire)
    }
}
