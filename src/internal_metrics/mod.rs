//! # Internal Metrics Module
//!
//! Counters and histograms describing the sampling loop itself, recorded
//! through the `metrics` facade.
//!
//! ## Components:
//!
//! - **`MetricsBuilder`**: The entry point for initializing the metrics system.
//!   It installs the Prometheus recorder and prepares the metrics server.
//!
//! - **`Metrics`**: A lightweight, cloneable handle used by the loop and the
//!   publisher to record what happened in each iteration.
//!
//! - **`MetricsServer`**: (Defined in `server.rs`) An `axum`-based web server
//!   that exposes the `/metrics` endpoint for Prometheus to scrape.

use crate::category::Category;
use crate::config::MetricsConfig;
use crate::internal_metrics::server::MetricsServer;
use metrics::{Counter, Histogram, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::error;

pub mod server;

/// The public API for the metrics system.
///
/// This struct holds cloneable handles to the metrics collectors.
#[derive(Clone)]
pub struct Metrics {
    pub samples_total: Counter,
    pub sensor_parse_errors_total: Counter,
    pub records_dropped_total: Counter,
    pub iteration_duration_seconds: Histogram,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Creates a new `Metrics` instance and registers descriptions for all
    /// supported metrics with the global recorder.
    pub fn new() -> Self {
        metrics::describe_counter!("samples_total", Unit::Count, "Total number of completed sampling iterations.");
        metrics::describe_counter!("anomalies_total", Unit::Count, "Samples flagged anomalous, labeled by category.");
        metrics::describe_counter!("probe_failures_total", Unit::Count, "Data source failures, labeled by source.");
        metrics::describe_counter!("sensor_parse_errors_total", Unit::Count, "Malformed records received on the sensor link.");
        metrics::describe_counter!("sink_failures_total", Unit::Count, "Failed record deliveries, labeled by output.");
        metrics::describe_counter!("records_dropped_total", Unit::Count, "Records dropped because the publish queue was full or closed.");
        metrics::describe_histogram!("iteration_duration_seconds", Unit::Seconds, "Time from the start of collection to the hand-off of the record.");

        Self {
            samples_total: metrics::counter!("samples_total"),
            sensor_parse_errors_total: metrics::counter!("sensor_parse_errors_total"),
            records_dropped_total: metrics::counter!("records_dropped_total"),
            iteration_duration_seconds: metrics::histogram!("iteration_duration_seconds"),
        }
    }

    /// Creates a `Metrics` instance that performs no operations.
    /// Used when metrics are disabled in the configuration.
    pub fn disabled() -> Self {
        Self {
            samples_total: Counter::noop(),
            sensor_parse_errors_total: Counter::noop(),
            records_dropped_total: Counter::noop(),
            iteration_duration_seconds: Histogram::noop(),
        }
    }

    /// Counts an anomalous sample under its category.
    pub fn increment_anomaly(&self, category: Category) {
        metrics::counter!("anomalies_total", "category" => category.as_str()).increment(1);
    }

    /// Counts a failed data source read.
    pub fn increment_probe_failure(&self, source: &'static str) {
        metrics::counter!("probe_failures_total", "source" => source).increment(1);
    }

    /// Counts a failed delivery to an output.
    pub fn increment_sink_failure(&self, output: &str) {
        metrics::counter!("sink_failures_total", "output" => output.to_string()).increment(1);
    }

    pub fn record_iteration(&self, elapsed: Duration) {
        self.iteration_duration_seconds.record(elapsed.as_secs_f64());
    }

    /// Creates a `Metrics` instance suitable for testing.
    ///
    /// Without an installed recorder the `metrics` macros are no-ops, so this
    /// needs no backend.
    pub fn new_for_test() -> Self {
        Self::new()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for the metrics system.
///
/// This builder is responsible for initializing the `PrometheusRecorder`,
/// binding the `MetricsServer`, and creating the `Metrics` handle.
pub struct MetricsBuilder {
    config: MetricsConfig,
}

impl MetricsBuilder {
    /// Creates a new `MetricsBuilder` with the given configuration.
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    /// Initializes the metrics system and returns a `Metrics` handle and an
    /// optional `MetricsServer`.
    ///
    /// If metrics are disabled in the configuration, or the exporter cannot
    /// be set up, this returns a disabled `Metrics` instance and `None`.
    pub fn build(
        self,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (Metrics, Option<(MetricsServer, SocketAddr)>) {
        if !self.config.enabled {
            return (Metrics::disabled(), None);
        }

        let recorder = match PrometheusBuilder::new().set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        ) {
            Ok(builder) => builder.build_recorder(),
            Err(e) => {
                error!("Failed to configure Prometheus recorder: {}", e);
                return (Metrics::disabled(), None);
            }
        };
        let handle = recorder.handle();

        // Bind the listener before installing the recorder to ensure we can
        // report the address even if the recorder fails to install.
        let listener = match std::net::TcpListener::bind(self.config.listen_address) {
            Ok(listener) => listener,
            Err(e) => {
                error!(
                    "Failed to bind metrics server to {}: {}",
                    self.config.listen_address, e
                );
                return (Metrics::disabled(), None);
            }
        };

        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                error!("Failed to get local address for metrics server: {}", e);
                return (Metrics::disabled(), None);
            }
        };

        // The listener must be non-blocking to be used with Tokio.
        let listener = match listener
            .set_nonblocking(true)
            .and_then(|_| TcpListener::from_std(listener))
        {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to prepare metrics listener: {}", e);
                return (Metrics::disabled(), None);
            }
        };

        if let Err(e) = metrics::set_global_recorder(recorder) {
            error!("Failed to install Prometheus recorder: {}", e);
            return (Metrics::disabled(), None);
        }

        let metrics = Metrics::new();
        let server = MetricsServer::new(listener, handle, shutdown_rx);

        (metrics, Some((server, addr)))
    }
}
