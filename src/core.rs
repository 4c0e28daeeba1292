//! Core domain types and collaborator traits for PulseWatch
//!
//! This module defines the record produced by each sampling iteration and
//! the trait contracts of the data sources and outputs the loop talks to.

use crate::category::Category;
use crate::features::{Feature, FeatureVector, PartialReadings};
use crate::probes::{ProbeError, SensorLinkError};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// The finished result of one sampling iteration, handed to the outputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleRecord {
    /// When the iteration started
    pub timestamp: DateTime<Utc>,
    /// Whether the classifier flagged the vector as an outlier
    pub is_anomaly: bool,
    /// Root-cause label (`Normal` for non-anomalous samples)
    pub category: Category,
    /// The assembled, unscaled feature vector
    #[serde(flatten)]
    pub feature_vector: FeatureVector,
}

impl SampleRecord {
    /// Renders the record in its published JSON form.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Host readings from the system metrics provider.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SystemSample {
    pub cpu_temp: Option<f64>,
    pub cpu_load: f64,
    pub bytes_sent: u64,
    pub bytes_recv: u64,
}

impl SystemSample {
    pub fn to_readings(&self) -> PartialReadings {
        let mut readings = PartialReadings::new();
        readings.set(Feature::CpuTemp, self.cpu_temp);
        readings.set(Feature::CpuLoad, Some(self.cpu_load));
        readings.set(Feature::BytesSent, Some(self.bytes_sent as f64));
        readings.set(Feature::BytesRecv, Some(self.bytes_recv as f64));
        readings
    }
}

/// Result of one network path measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkMeasurement {
    pub avg_latency_ms: Option<f64>,
    pub loss_percent: f64,
    pub jitter_ms: Option<f64>,
}

impl NetworkMeasurement {
    /// The value reported whenever a probe fails or times out.
    pub const fn unreachable() -> Self {
        Self {
            avg_latency_ms: None,
            loss_percent: 100.0,
            jitter_ms: None,
        }
    }

    pub fn to_readings(&self) -> PartialReadings {
        let mut readings = PartialReadings::new();
        readings.set(Feature::PingAvg, self.avg_latency_ms);
        readings.set(Feature::PacketLoss, Some(self.loss_percent));
        readings.set(Feature::PingJitter, self.jitter_ms);
        readings
    }
}

/// One decoded record from the sensor link. Keys missing from the record
/// are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorReading {
    pub ambient_temp: Option<f64>,
    pub humidity: Option<f64>,
    pub motion_level: Option<i64>,
    pub ax: Option<i64>,
    pub ay: Option<i64>,
    pub az: Option<i64>,
    pub gx: Option<i64>,
    pub gy: Option<i64>,
    pub gz: Option<i64>,
}

impl SensorReading {
    pub fn to_readings(&self) -> PartialReadings {
        let int = |v: Option<i64>| v.map(|v| v as f64);
        let mut readings = PartialReadings::new();
        readings.set(Feature::AmbientTemp, self.ambient_temp);
        readings.set(Feature::Humidity, self.humidity);
        readings.set(Feature::MotionLevel, int(self.motion_level));
        readings.set(Feature::Ax, int(self.ax));
        readings.set(Feature::Ay, int(self.ay));
        readings.set(Feature::Az, int(self.az));
        readings.set(Feature::Gx, int(self.gx));
        readings.set(Feature::Gy, int(self.gy));
        readings.set(Feature::Gz, int(self.gz));
        readings
    }
}

// =============================================================================
// Collaborator Traits
// =============================================================================

/// Reads host CPU and network counters.
#[async_trait]
pub trait SystemMetricsProvider: Send {
    /// Takes one snapshot of the host.
    ///
    /// # Returns
    /// * `Ok(SystemSample)`, where `cpu_temp` is `None` if no sensor is found
    /// * `Err` if the host could not be sampled at all
    async fn sample(&mut self) -> Result<SystemSample, ProbeError>;
}

/// Measures latency, jitter and loss towards a host.
#[async_trait]
pub trait NetworkProbe: Send {
    /// Sends `count` echo requests to `host`.
    ///
    /// Never fails: any error or timeout yields
    /// [`NetworkMeasurement::unreachable`].
    async fn measure(&mut self, host: &str, count: u32) -> NetworkMeasurement;
}

/// Reads the radio signal strength.
#[async_trait]
pub trait SignalProbe: Send {
    /// Returns the signal strength in dBm.
    async fn read(&mut self) -> Result<i32, ProbeError>;
}

/// A long-lived handle on the physical sensor link.
#[async_trait]
pub trait SensorLink: Send {
    /// Returns the newest ready record without waiting.
    ///
    /// # Returns
    /// * `Ok(Some(reading))` if a record was ready and decoded
    /// * `Ok(None)` if no record is ready
    /// * `Err` if the record was malformed or the link is gone
    async fn poll(&mut self) -> Result<Option<SensorReading>, SensorLinkError>;
}

/// Sends finished records to an output destination
#[async_trait]
pub trait Output: Send + Sync {
    /// A unique, descriptive name for the output (e.g., "stdout", "http").
    /// Used for logging and metrics.
    fn name(&self) -> &str;

    /// Sends a record to the configured output destination
    ///
    /// # Returns
    /// * `Ok(())` if the record was successfully sent
    /// * `Err` if sending failed (network error, I/O error, etc.)
    async fn send_record(&self, record: &SampleRecord) -> Result<()>;
}
