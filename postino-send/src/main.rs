//! postino-send - Background daemon for scheduled publishing
//!
//! Polls the post queue and hands due posts to the dispatcher, which fans
//! each one out to its target platforms through the publishing service.

use clap::Parser;
use libpostino::{BatchRunner, Config, Database, Dispatcher, LateClient, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "postino-send")]
#[command(version)]
#[command(about = "Background daemon for scheduled publishing")]
#[command(long_about = "\
postino-send - Background daemon for scheduled publishing

DESCRIPTION:
    postino-send is a long-running daemon that monitors the Postino queue
    and publishes scheduled posts when their time arrives.

    It polls the database at regular intervals, selects due posts and
    dispatches each one to the publishing service in a single call that
    covers every target platform. Outcomes are recorded per platform in
    the publication log.

USAGE:
    # Run in foreground (logs to stderr)
    postino-send

    # Run with custom poll interval
    postino-send --poll-interval 30

    # Process due posts once and exit
    postino-send --once

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current batch)

CONFIGURATION:
    Configuration file: ~/.config/postino/config.toml
    (override with the POSTINO_CONFIG environment variable)

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
")]
struct Cli {
    /// Poll interval in seconds
    #[arg(long, value_name = "SECONDS")]
    #[arg(help = "How often to check for due posts (default: 60)")]
    poll_interval: Option<u64>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Run once and exit
    #[arg(long)]
    #[arg(help = "Process due posts once and exit")]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config = Arc::new(Config::load()?);
    let db = Database::new(&config.database.path).await?;
    let client = Arc::new(LateClient::new(&config.api)?);
    let dispatcher = Dispatcher::new(db.clone(), config.clone(), client);
    let runner = BatchRunner::new(db, dispatcher);

    info!("postino-send starting");

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    let poll_interval = cli.poll_interval.unwrap_or(60);

    if cli.once {
        let summary = runner.run().await?;
        println!("{}", summary);
    } else {
        info!("Poll interval: {}s", poll_interval);
        run_daemon_loop(&runner, poll_interval, shutdown).await;
    }

    info!("postino-send stopped");
    Ok(())
}

fn init_logging(verbose: bool) {
    if verbose {
        libpostino::logging::init(libpostino::logging::LogFormat::Text, "debug");
    } else {
        libpostino::logging::init_from_env();
    }
}

fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).map_err(|e| {
        libpostino::PostinoError::InvalidInput(format!("Signal setup failed: {}", e))
    })?;

    std::thread::spawn(move || {
        for sig in signals.forever() {
            match sig {
                SIGTERM | SIGINT => {
                    info!("Received shutdown signal, stopping gracefully...");
                    shutdown.store(true, Ordering::Relaxed);
                    break;
                }
                _ => {}
            }
        }
    });

    Ok(())
}

async fn run_daemon_loop(runner: &BatchRunner, poll_interval: u64, shutdown: Arc<AtomicBool>) {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Shutdown requested, stopping daemon loop");
            break;
        }

        match runner.run().await {
            Ok(summary) if summary.total() > 0 => info!("Batch: {}", summary),
            Ok(_) => {}
            Err(e) => error!("Error processing posts: {}", e),
        }

        // Sleep until next poll, checking for shutdown every second
        for _ in 0..poll_interval {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            sleep(Duration::from_secs(1)).await;
        }
    }
}
