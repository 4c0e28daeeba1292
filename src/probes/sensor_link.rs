//! The physical sensor link: newline-terminated `KEY:VALUE,...` records
//! arriving on a character device.
//!
//! Reads happen on a dedicated thread so that [`SensorLink::poll`] never
//! waits for a line. The thread stops at end of stream, or on the first
//! line or read timeout after the link handle is dropped.

use crate::core::{SensorLink, SensorReading};
use crate::probes::SensorLinkError;
use async_trait::async_trait;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver};
use tracing::{debug, info, trace};

/// Bounds each blocking read so the reader thread notices a dropped link.
const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Decodes one sensor record.
///
/// Every comma-separated part must be exactly `KEY:VALUE`. Keys are
/// case-insensitive; unknown keys are ignored. Any malformed part rejects the
/// whole record.
pub fn parse_sensor_line(line: &str) -> Result<SensorReading, SensorLinkError> {
    let fail = |reason: String| SensorLinkError::Parse {
        line: line.to_string(),
        reason,
    };

    let mut reading = SensorReading::default();
    for part in line.split(',') {
        let mut kv = part.split(':');
        let (key, value) = match (kv.next(), kv.next(), kv.next()) {
            (Some(k), Some(v), None) => (k.trim().to_uppercase(), v.trim()),
            _ => return Err(fail(format!("'{}' is not a KEY:VALUE pair", part))),
        };

        let float = || {
            value
                .parse::<f64>()
                .map_err(|e| fail(format!("{}: '{}' is not a number ({})", key, value, e)))
        };
        let int = || {
            value
                .parse::<i64>()
                .map_err(|e| fail(format!("{}: '{}' is not an integer ({})", key, value, e)))
        };

        match key.as_str() {
            "T" => reading.ambient_temp = Some(float()?),
            "H" => reading.humidity = Some(float()?),
            "M" => reading.motion_level = Some(int()?),
            "AX" => reading.ax = Some(int()?),
            "AY" => reading.ay = Some(int()?),
            "AZ" => reading.az = Some(int()?),
            "GX" => reading.gx = Some(int()?),
            "GY" => reading.gy = Some(int()?),
            "GZ" => reading.gz = Some(int()?),
            _ => trace!(key = %key, "Ignoring unknown sensor key"),
        }
    }
    Ok(reading)
}

/// A sensor link backed by a reader thread.
pub struct SerialSensorLink {
    name: String,
    lines_rx: UnboundedReceiver<String>,
}

impl SerialSensorLink {
    /// Opens the serial device once, in raw mode at `baud_rate` 8N1.
    /// Failing to open it is a startup error.
    pub fn open(path: &Path, baud_rate: u32) -> std::io::Result<Self> {
        let port = serialport::new(path.to_string_lossy(), baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(READ_TIMEOUT)
            .open()?;
        info!(device = %path.display(), baud_rate, "Sensor link opened");
        Self::from_reader(path.display().to_string(), port)
    }

    /// Wraps any byte stream as a sensor link.
    pub fn from_reader<R>(name: impl Into<String>, reader: R) -> std::io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let name = name.into();
        let (lines_tx, lines_rx) = mpsc::unbounded_channel();
        let thread_name = name.clone();

        std::thread::Builder::new()
            .name("sensor-link".to_string())
            .spawn(move || {
                let mut reader = BufReader::new(reader);
                let mut buf = Vec::new();
                loop {
                    match reader.read_until(b'\n', &mut buf) {
                        Ok(0) => {
                            debug!(device = %thread_name, "Sensor link reached end of stream");
                            break;
                        }
                        Ok(_) => {
                            let line = String::from_utf8_lossy(&buf).trim().to_string();
                            buf.clear();
                            if line.is_empty() {
                                continue;
                            }
                            if lines_tx.send(line).is_err() {
                                break;
                            }
                        }
                        // A partial line stays in `buf` until its terminator arrives.
                        Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                            if lines_tx.is_closed() {
                                break;
                            }
                        }
                        Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                        Err(e) => {
                            debug!(device = %thread_name, error = %e, "Sensor link read failed");
                            break;
                        }
                    }
                }
                trace!(device = %thread_name, "Sensor link reader stopped");
            })?;

        Ok(Self { name, lines_rx })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Takes every queued line, returning the newest and whether the reader
    /// has stopped.
    fn drain(&mut self) -> (Option<String>, bool) {
        let mut latest = None;
        loop {
            match self.lines_rx.try_recv() {
                Ok(line) => latest = Some(line),
                Err(TryRecvError::Empty) => return (latest, false),
                Err(TryRecvError::Disconnected) => return (latest, true),
            }
        }
    }
}

#[async_trait]
impl SensorLink for SerialSensorLink {
    async fn poll(&mut self) -> Result<Option<SensorReading>, SensorLinkError> {
        match self.drain() {
            (Some(line), _) => {
                debug!(device = %self.name, raw = %line, "Sensor record received");
                parse_sensor_line(&line).map(Some)
            }
            (None, true) => Err(SensorLinkError::Disconnected),
            (None, false) => Ok(None),
        }
    }
}
