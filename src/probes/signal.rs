//! Radio signal strength from the kernel's wireless statistics table.

use crate::core::SignalProbe;
use crate::probes::ProbeError;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::trace;

/// One interface row of `/proc/net/wireless`.
#[derive(Debug, Clone, PartialEq)]
pub struct WirelessEntry {
    pub interface: String,
    pub link_quality: f64,
    pub level_dbm: f64,
}

/// Parses the wireless statistics table, skipping its two header lines.
pub fn parse_wireless_table(content: &str) -> Vec<WirelessEntry> {
    content
        .lines()
        .skip(2)
        .filter_map(|line| {
            let (iface, rest) = line.split_once(':')?;
            let mut cols = rest.split_whitespace();
            let _status = cols.next()?;
            let link = parse_column(cols.next()?)?;
            let level = parse_column(cols.next()?)?;
            Some(WirelessEntry {
                interface: iface.trim().to_string(),
                link_quality: link,
                level_dbm: level,
            })
        })
        .collect()
}

// Values carry a trailing '.' when the driver reports them as updated.
fn parse_column(raw: &str) -> Option<f64> {
    raw.trim_end_matches('.').parse().ok()
}

/// Reads the signal level of one wireless interface.
#[derive(Debug, Clone)]
pub struct WirelessSignalProbe {
    path: PathBuf,
    interface: Option<String>,
}

impl WirelessSignalProbe {
    /// `interface = None` selects the first interface in the table.
    pub fn new(path: impl Into<PathBuf>, interface: Option<String>) -> Self {
        Self {
            path: path.into(),
            interface,
        }
    }
}

#[async_trait]
impl SignalProbe for WirelessSignalProbe {
    async fn read(&mut self) -> Result<i32, ProbeError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let entries = parse_wireless_table(&content);
        let entry = match &self.interface {
            Some(name) => entries.iter().find(|e| &e.interface == name),
            None => entries.first(),
        }
        .ok_or_else(|| {
            ProbeError::Unavailable(match &self.interface {
                Some(name) => format!("interface {} not listed in {}", name, self.path.display()),
                None => format!("no wireless interface listed in {}", self.path.display()),
            })
        })?;

        trace!(interface = %entry.interface, level = entry.level_dbm, "Signal level read");
        Ok(entry.level_dbm.round() as i32)
    }
}
