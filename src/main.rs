//! meetbear - Meeting transcription exports to Bear.app notes
//!
//! Matches paired summary/transcript PDF exports, composes one note per
//! meeting, and publishes it to Bear exactly once per content version.

use anyhow::Result;
use clap::{Parser, Subcommand};
use meetbear::{
    config::{LoggingConfig, MeetbearConfig},
    extract::PdfTextExtractor,
    pipeline::PipelineRunner,
    publish::BearPublisher,
    state::StateStore,
    watch::WatchScheduler,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "meetbear")]
#[command(version)]
#[command(about = "Publish paired meeting summary/transcript PDFs as Bear notes")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "MEETBEAR_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a default configuration file
    Init {
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Process the watched directories once, or continuously with --watch
    Run {
        /// Keep running and process directory changes as they settle
        #[arg(long, conflicts_with_all = ["summary", "transcript"])]
        watch: bool,

        /// Process exactly this summary file (requires --transcript)
        #[arg(long, requires = "transcript")]
        summary: Option<PathBuf>,

        /// Process exactly this transcript file (requires --summary)
        #[arg(long, requires = "summary")]
        transcript: Option<PathBuf>,
    },

    /// Show the published meetings recorded in the state file
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => {
            init_logging(&LoggingConfig::default(), cli.verbose)?;
            let path = MeetbearConfig::write_default(force)?;
            println!("Wrote default configuration to {}", path.display());
            println!("Edit the watched directories, then run `meetbear run`.");
        }
        Commands::Run {
            watch,
            summary,
            transcript,
        } => {
            let config = MeetbearConfig::load(cli.config.as_deref())?;
            init_logging(&config.logging, cli.verbose)?;
            config.validate()?;

            let runner = build_runner(&config)?;
            match (watch, summary, transcript) {
                (true, _, _) => run_watch(&config, runner).await?,
                (false, Some(summary), Some(transcript)) => {
                    runner.run_pair(&summary, &transcript).await?;
                }
                _ => {
                    runner.run_once().await;
                }
            }
        }
        Commands::List => {
            let config = MeetbearConfig::load(cli.config.as_deref())?;
            init_logging(&config.logging, cli.verbose)?;
            list_published(&config)?;
        }
    }

    Ok(())
}

fn init_logging(logging: &LoggingConfig, verbose: bool) -> Result<()> {
    let level = if verbose {
        "debug"
    } else {
        logging.level.as_str()
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("meetbear={level}").into());

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    match &logging.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Arc::new(file)),
                )
                .init();
        }
        None => registry.init(),
    }
    Ok(())
}

fn build_runner(config: &MeetbearConfig) -> Result<PipelineRunner> {
    let state = StateStore::open(
        config.service.state_file.clone(),
        config.service.backup_count,
    )?;
    Ok(PipelineRunner::new(
        config,
        Arc::new(PdfTextExtractor::new()),
        Arc::new(BearPublisher::new()),
        Arc::new(RwLock::new(state)),
    ))
}

async fn run_watch(config: &MeetbearConfig, runner: PipelineRunner) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested, finishing current pass");
            let _ = shutdown_tx.send(true);
        }
    });

    WatchScheduler::new(config, runner).run(shutdown_rx).await?;
    Ok(())
}

fn list_published(config: &MeetbearConfig) -> Result<()> {
    let state = StateStore::open(
        config.service.state_file.clone(),
        config.service.backup_count,
    )?;

    if state.is_empty() {
        println!("No meetings published yet.");
        return Ok(());
    }

    println!("{} published meeting(s):", state.len());
    for record in state.snapshot() {
        let sides = match (
            record.summary_fingerprint.is_some(),
            record.transcript_fingerprint.is_some(),
        ) {
            (true, true) => "summary+transcript",
            (true, false) => "summary only",
            (false, true) => "transcript only",
            (false, false) => "no content",
        };
        println!(
            "  {}  {:40}  {:20}  note {}  last published {}",
            record.identity.date.format("%Y-%m-%d"),
            record.display_name,
            sides,
            record.note_id.as_deref().unwrap_or("-"),
            record.last_published.format("%Y-%m-%d %H:%M:%S UTC"),
        );
    }
    Ok(())
}
