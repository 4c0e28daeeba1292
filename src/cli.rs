//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged with
//! the configuration from the `pulsewatch.toml` file and environment variables.

use clap::Parser;
use figment::{
    value::{Dict, Map, Tag, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// An edge monitoring agent that classifies host, network and sensor telemetry.
#[derive(Parser, Debug, Default, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path to the classifier artifact.
    #[arg(long, value_name = "FILE")]
    pub artifact: Option<PathBuf>,

    /// Seconds between samples.
    #[arg(long, value_name = "SECONDS")]
    pub interval: Option<u64>,

    /// Host the network probe pings.
    #[arg(long, value_name = "HOST")]
    pub target_host: Option<String>,

    /// Sensor link device path.
    #[arg(long, value_name = "PATH")]
    pub sensor_device: Option<PathBuf>,

    /// Run a single iteration, print the record and exit.
    #[arg(long)]
    pub once: bool,

    /// Load and validate the classifier artifact, then exit.
    #[arg(long)]
    pub check_artifact: bool,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(path) = &self.artifact {
            let mut classifier = Dict::new();
            classifier.insert(
                "artifact_path".into(),
                Value::from(path.display().to_string()),
            );
            dict.insert("classifier".into(), section(classifier));
        }

        if let Some(interval) = self.interval {
            let mut sampling = Dict::new();
            sampling.insert("interval_seconds".into(), Value::from(interval));
            dict.insert("sampling".into(), section(sampling));
        }

        if let Some(host) = &self.target_host {
            let mut network = Dict::new();
            network.insert("target_host".into(), Value::from(host.clone()));
            dict.insert("network".into(), section(network));
        }

        if let Some(device) = &self.sensor_device {
            let mut sensor_link = Dict::new();
            sensor_link.insert(
                "device_path".into(),
                Value::from(device.display().to_string()),
            );
            dict.insert("sensor_link".into(), section(sensor_link));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}

// Nested dicts are merged key by key, so only the flags that were set override.
fn section(dict: Dict) -> Value {
    Value::Dict(Tag::Default, dict)
}
