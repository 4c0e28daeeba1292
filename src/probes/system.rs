//! Host metrics via `sysinfo`.

use crate::core::{SystemMetricsProvider, SystemSample};
use crate::probes::ProbeError;
use async_trait::async_trait;
use sysinfo::{Components, Networks, System};
use tracing::trace;

/// Reads CPU usage, CPU temperature and cumulative network byte counters.
///
/// CPU usage is computed by `sysinfo` between two refreshes, so the first
/// sample after start reports the usage since process start.
pub struct SysinfoMetrics {
    system: System,
    components: Components,
    networks: Networks,
    thermal_label: String,
}

impl SysinfoMetrics {
    /// Creates a provider that takes the CPU temperature from the first
    /// component whose label contains `thermal_label`.
    pub fn new(thermal_label: impl Into<String>) -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        Self {
            system,
            components: Components::new_with_refreshed_list(),
            networks: Networks::new_with_refreshed_list(),
            thermal_label: thermal_label.into(),
        }
    }

    fn cpu_temp(&self) -> Option<f64> {
        let wanted = self.thermal_label.to_lowercase();
        self.components
            .iter()
            .find(|c| c.label().to_lowercase().contains(&wanted))
            .map(|c| c.temperature() as f64)
            .filter(|t| t.is_finite())
    }
}

#[async_trait]
impl SystemMetricsProvider for SysinfoMetrics {
    async fn sample(&mut self) -> Result<SystemSample, ProbeError> {
        self.system.refresh_cpu();
        self.components.refresh();
        self.networks.refresh();

        if self.system.cpus().is_empty() {
            return Err(ProbeError::Unavailable("no CPUs reported".to_string()));
        }

        let (bytes_recv, bytes_sent) = self
            .networks
            .iter()
            .fold((0u64, 0u64), |(rx, tx), (_, data)| {
                (
                    rx.saturating_add(data.total_received()),
                    tx.saturating_add(data.total_transmitted()),
                )
            });

        let sample = SystemSample {
            cpu_temp: self.cpu_temp(),
            cpu_load: self.system.global_cpu_info().cpu_usage() as f64,
            bytes_sent,
            bytes_recv,
        };
        trace!(?sample, "System metrics sampled");
        Ok(sample)
    }
}
