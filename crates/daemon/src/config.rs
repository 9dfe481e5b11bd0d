//! Configuration management for ueventfwd.
//!
//! Uses figment to merge configuration from multiple sources:
//! 1. Default values
//! 2. Config file (TOML)
//! 3. Environment variables
//! 4. Command-line arguments

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use ueventfw_protocol::MonitorGroup;

/// Which uevent multicast group to capture from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    /// Processed udev daemon events (monitor wire format).
    Udev,
    /// Raw kernel uevents (text format).
    Kernel,
}

impl EventSource {
    /// The netlink multicast group mask for this source.
    pub fn group(self) -> MonitorGroup {
        match self {
            Self::Udev => MonitorGroup::UDEV,
            Self::Kernel => MonitorGroup::KERNEL,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Daemon configuration
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Monitor configuration
    #[serde(default)]
    pub monitor: MonitorConfig,
}

/// Daemon-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Event capture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Multicast group to capture from
    #[serde(default = "default_source")]
    pub source: EventSource,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_source() -> EventSource {
    EventSource::Udev
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon: DaemonConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
        }
    }
}

impl Config {
    /// Load configuration from all sources
    pub fn load(config_file: Option<&PathBuf>) -> Result<Self, figment::Error> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Add config file if provided
        if let Some(path) = config_file {
            figment = figment.merge(Toml::file(path));
        } else {
            // Try default config locations
            let default_paths = [
                PathBuf::from("/etc/ueventfw/config.toml"),
                dirs::config_dir()
                    .unwrap_or_default()
                    .join("ueventfw/config.toml"),
            ];

            for path in &default_paths {
                if path.exists() {
                    figment = figment.merge(Toml::file(path));
                    break;
                }
            }
        }

        // Environment variables (UEVENTFWD_ prefix)
        figment = figment.merge(Env::prefixed("UEVENTFWD_").split("_"));

        figment.extract()
    }

    /// Override log level from CLI
    pub fn with_log_level(mut self, log_level: Option<String>) -> Self {
        if let Some(level) = log_level {
            self.daemon.log_level = level;
        }
        self
    }

    /// Override event source from CLI
    pub fn with_source(mut self, source: Option<EventSource>) -> Self {
        if let Some(source) = source {
            self.monitor.source = source;
        }
        self
    }
}
