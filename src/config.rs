//! Configuration management for PulseWatch
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all application settings. It uses the `figment`
//! crate to layer built-in defaults, a `pulsewatch.toml` file, environment
//! variables and command-line flags.

use crate::cli::Cli;
use anyhow::{ensure, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration file used when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "pulsewatch.toml";

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    pub core: CoreConfig,
    /// Loop cadence and record queue.
    pub sampling: SamplingConfig,
    /// Location of the classifier artifact.
    pub classifier: ClassifierConfig,
    /// Network path probe.
    pub network: NetworkConfig,
    /// Radio signal probe.
    pub signal: SignalConfig,
    /// Physical sensor link.
    pub sensor_link: SensorLinkConfig,
    /// Host metrics provider.
    pub system: SystemConfig,
    /// Where finished records go.
    pub output: OutputConfig,
    /// Internal metrics exporter.
    pub metrics: MetricsConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CoreConfig {
    /// The logging level for the application.
    pub log_level: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SamplingConfig {
    /// Pause between iterations, in seconds.
    pub interval_seconds: u64,
    /// Records that may wait for the publisher before new ones are dropped.
    pub queue_capacity: usize,
}

impl SamplingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct ClassifierConfig {
    /// Path to the JSON classifier artifact. Required.
    pub artifact_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct NetworkConfig {
    /// Host the echo requests are sent to.
    pub target_host: String,
    /// Number of echo requests per measurement.
    pub ping_count: u32,
    /// Wait for each individual reply, in seconds.
    pub reply_timeout_secs: u64,
    /// Hard deadline for a whole measurement, in milliseconds.
    pub timeout_ms: u64,
    /// The ping executable.
    pub ping_program: String,
}

impl NetworkConfig {
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.reply_timeout_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SignalConfig {
    /// Kernel wireless statistics table.
    pub wireless_path: PathBuf,
    /// Interface to report; the first listed one when unset.
    pub interface: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SensorLinkConfig {
    /// Character device the sensor board writes to.
    pub device_path: PathBuf,
    /// Line speed of the serial port.
    pub baud_rate: u32,
    /// Abort startup when the device cannot be opened.
    pub required: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SystemConfig {
    /// Substring of the temperature component label used as CPU temperature.
    pub thermal_label: String,
}

/// The format for stdout output.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub enum OutputFormat {
    Json,
    PlainText,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "Json"),
            OutputFormat::PlainText => write!(f, "PlainText"),
        }
    }
}

/// Configuration for record outputs.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct OutputConfig {
    /// Print every record to stdout.
    pub stdout: bool,
    /// The format to use for stdout output.
    pub format: OutputFormat,
    /// Remote telemetry store.
    pub http: Option<HttpOutputConfig>,
    /// Local JSON Lines file.
    pub file: Option<FileOutputConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct HttpOutputConfig {
    /// Endpoint receiving one JSON record per POST.
    pub url: String,
    #[serde(default = "default_http_timeout")]
    pub timeout_seconds: u64,
}

fn default_http_timeout() -> u64 {
    10
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FileOutputConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MetricsConfig {
    /// Serve Prometheus metrics.
    pub enabled: bool,
    pub listen_address: SocketAddr,
}

impl Config {
    /// Loads the application configuration, layering defaults, the TOML file,
    /// `PULSEWATCH_` environment variables (`__` separates sections, e.g.
    /// `PULSEWATCH_NETWORK__TARGET_HOST`) and command-line flags.
    pub fn load(cli: &Cli) -> Result<Self> {
        let path = cli
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let config: Config = Self::figment(&path).merge(cli.clone()).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that deserialize but cannot drive the loop.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.sampling.interval_seconds >= 1,
            "sampling.interval_seconds must be at least 1, got {}",
            self.sampling.interval_seconds
        );
        ensure!(self.network.ping_count >= 1, "network.ping_count must be at least 1");
        Ok(())
    }

    /// The layered sources without command-line flags.
    pub fn figment(path: &std::path::Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("PULSEWATCH_").split("__"))
    }
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        Self {
            core: CoreConfig {
                log_level: "info".to_string(),
            },
            sampling: SamplingConfig {
                interval_seconds: 10,
                queue_capacity: 64,
            },
            classifier: ClassifierConfig::default(),
            network: NetworkConfig {
                target_host: "8.8.8.8".to_string(),
                ping_count: 3,
                reply_timeout_secs: 1,
                timeout_ms: 5000,
                ping_program: "ping".to_string(),
            },
            signal: SignalConfig {
                wireless_path: PathBuf::from("/proc/net/wireless"),
                interface: None,
            },
            sensor_link: SensorLinkConfig {
                device_path: PathBuf::from("/dev/ttyACM0"),
                baud_rate: 9600,
                required: true,
            },
            system: SystemConfig {
                thermal_label: "cpu_thermal".to_string(),
            },
            output: OutputConfig {
                stdout: true,
                format: OutputFormat::Json,
                http: None,
                file: None,
            },
            metrics: MetricsConfig {
                enabled: false,
                listen_address: SocketAddr::from(([127, 0, 0, 1], 9898)),
            },
        }
    }
}
