//! Production implementations of the data sources the sampling loop reads.

pub mod ping;
pub mod sensor_link;
pub mod signal;
pub mod system;

use std::time::Duration;
use thiserror::Error;

pub use ping::PingProbe;
pub use sensor_link::{parse_sensor_line, SerialSensorLink};
pub use signal::WirelessSignalProbe;
pub use system::SysinfoMetrics;

/// A data source could not deliver a value.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("unusable probe output: {0}")]
    Output(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// A record from the sensor link could not be used.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorLinkError {
    #[error("malformed sensor record '{line}': {reason}")]
    Parse { line: String, reason: String },

    #[error("sensor link disconnected")]
    Disconnected,
}
