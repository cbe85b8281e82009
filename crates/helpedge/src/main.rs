use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{mpsc, Arc};

use clap::Parser;
use tokio::sync::broadcast;
use tracing::{error, info};

use helpedge::config::{load_config, load_config_from_env, IngestConfig};
use helpedge::email::{ImapClient, MailTransport};
use helpedge::error::{ConfigError, HelpedgeError};
use helpedge::ingest::{IngestOrchestrator, IngestScheduler, TransportFactory};
use helpedge::logging::{self, LogFormat};
use helpedge::Database;

#[derive(Parser, Debug)]
#[command(name = "helpedge-ingest", version, about = "Turn unread helpdesk mail into tickets")]
struct Cli {
    /// Run a single ingestion pass and exit
    #[arg(long)]
    once: bool,

    /// JSON config file (environment variables override its values)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging for helpedge
    #[arg(short, long)]
    verbose: bool,

    /// Log output format: text or json
    #[arg(long)]
    log_format: Option<LogFormat>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let format = cli.log_format.unwrap_or_else(LogFormat::from_env);
    if let Err(e) = logging::init(format, cli.verbose) {
        eprintln!("{}", e);
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), HelpedgeError> {
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => load_config_from_env()?,
    };

    let db_path = config
        .resolved_database_path()
        .ok_or_else(|| ConfigError::Validation {
            message: "cannot determine a database path, set HELPEDGE_DATABASE_PATH".to_string(),
        })?;
    let db = Database::open(&db_path)?;
    let orchestrator = Arc::new(IngestOrchestrator::from_config(db, &config));

    if cli.once {
        run_once(&orchestrator, &config)
    } else {
        run_scheduled(orchestrator, &config)
    }
}

fn run_once(orchestrator: &IngestOrchestrator, config: &IngestConfig) -> Result<(), HelpedgeError> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let mut client = ImapClient::new(config.mailbox.clone());
    let report = rt.block_on(orchestrator.run(&mut client))?;

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Failed to serialize run report: {}", e),
    }
    Ok(())
}

fn run_scheduled(
    orchestrator: Arc<IngestOrchestrator>,
    config: &IngestConfig,
) -> Result<(), HelpedgeError> {
    let mailbox = config.mailbox.clone();
    let factory: TransportFactory =
        Arc::new(move || Box::new(ImapClient::new(mailbox.clone())) as Box<dyn MailTransport>);
    let scheduler = IngestScheduler::new(orchestrator, factory, config.poll_interval());

    let (stop_tx, stop_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .map_err(|e| HelpedgeError::Scheduler(format!("cannot install signal handler: {}", e)))?;

    let (trigger_tx, trigger_rx) = broadcast::channel(4);
    let handle = scheduler.start(trigger_rx)?;
    info!(
        "Polling {}@{} every {:?}",
        config.mailbox.folder,
        config.mailbox.host,
        config.poll_interval()
    );

    let _ = stop_rx.recv();
    info!("Shutdown requested, waiting for the current run to finish");
    scheduler.stop();
    let _ = trigger_tx.send(());

    handle
        .join()
        .map_err(|_| HelpedgeError::Scheduler("scheduler thread panicked".to_string()))
}
