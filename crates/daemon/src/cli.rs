//! Command-line interface for ueventfwd.

use clap::Parser;
use std::path::PathBuf;

use crate::config::EventSource;

/// ueventfwd - forward udev events into a network namespace
///
/// Captures device uevents in the current network namespace and
/// retransmits them, in the libudev monitor wire format, inside the
/// target namespace so unmodified udev consumers there see them.
#[derive(Debug, Parser)]
#[command(name = "ueventfwd")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the target network namespace handle
    /// (e.g. /run/netns/<name> or /proc/<pid>/ns/net)
    pub netns: PathBuf,

    /// Configuration file path
    #[arg(short, long, env = "UEVENTFWD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "UEVENTFWD_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Multicast group to capture events from
    #[arg(short, long, value_enum)]
    pub source: Option<EventSource>,
}
