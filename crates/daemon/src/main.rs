//! ueventfwd
//!
//! Forwards udev device events observed in the host network namespace
//! into a target network namespace, re-encoded as libudev monitor
//! messages, so an unmodified udev consumer inside the namespace
//! receives them as ordinary kernel-originated events.
//!
//! Two loops run for the life of the process: the capture loop on the
//! main task receives uevents from the host-side monitor socket, and
//! the sender thread - pinned to the target namespace - drains the
//! hand-off queue and retransmits each event there.

mod cli;
mod config;
mod monitor;
mod queue;
mod sender;

use clap::Parser;
use cli::Cli;
use color_eyre::eyre::{Result, WrapErr, eyre};
use config::Config;
use monitor::{CaptureLoop, UeventMonitor};
use queue::EventQueue;
use std::fs::File;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref())
        .wrap_err("failed to load configuration")?
        .with_log_level(cli.log_level.clone())
        .with_source(cli.source);

    init_logging(&config.daemon.log_level)?;

    run(cli, config).await
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();

    Ok(())
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        netns = %cli.netns.display(),
        source = ?config.monitor.source,
        "Starting ueventfwd"
    );

    let netns = File::open(&cli.netns).wrap_err_with(|| {
        format!(
            "failed to open network namespace handle {}",
            cli.netns.display()
        )
    })?;

    // Opened in the current (host) namespace, before the sender thread
    // exists.
    let monitor = UeventMonitor::open(config.monitor.source.group())
        .wrap_err("failed to open uevent monitor socket")?;

    let queue = Arc::new(EventQueue::new());

    let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel();
    sender::spawn(netns, Arc::clone(&queue), fatal_tx)
        .wrap_err("failed to spawn namespace sender thread")?;

    let capture = CaptureLoop::new(monitor, Arc::clone(&queue))
        .wrap_err("failed to register monitor socket with the runtime")?;

    // Neither loop finishes in normal operation; whichever side fails
    // first takes the whole process down.
    tokio::select! {
        result = capture.run() => result.wrap_err("event capture failed"),
        fatal = fatal_rx.recv() => match fatal {
            Some(err) => Err(err).wrap_err("namespace sender failed"),
            None => Err(eyre!("namespace sender exited unexpectedly")),
        },
        () = shutdown_signal() => {
            tracing::info!(events_captured = queue.pushed(), "Shutting down");
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate()).expect("Failed to set up SIGTERM");
    let mut sigint = signal(SignalKind::interrupt()).expect("Failed to set up SIGINT");

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
        _ = sigint.recv() => tracing::info!("Received SIGINT"),
    }
}
