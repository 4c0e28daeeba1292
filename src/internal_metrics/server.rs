//! # Metrics Server
//!
//! Serves the Prometheus exposition of all recorded metrics on `/metrics`
//! until the shutdown signal flips.

use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::future::Future;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, trace};

/// A server that exposes metrics to a Prometheus scraper.
pub struct MetricsServer {
    listener: TcpListener,
    prom_handle: PrometheusHandle,
    shutdown_rx: watch::Receiver<bool>,
}

impl MetricsServer {
    /// Creates a new `MetricsServer` but does not spawn it.
    ///
    /// # Arguments
    ///
    /// * `listener` - A `TcpListener` that has already been bound to an address.
    /// * `prom_handle` - A `PrometheusHandle` used to render the metrics.
    /// * `shutdown_rx` - A watch channel receiver for graceful shutdown.
    pub fn new(
        listener: TcpListener,
        prom_handle: PrometheusHandle,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            listener,
            prom_handle,
            shutdown_rx,
        }
    }

    /// Returns a future that runs the server until a shutdown signal is received.
    pub fn run(self) -> impl Future<Output = ()> {
        let MetricsServer {
            listener,
            prom_handle,
            mut shutdown_rx,
        } = self;
        let app = Router::new()
            .route("/metrics", get(move || async move { prom_handle.render() }))
            .route("/healthz", get(|| async { "ok" }));

        async move {
            let shutdown = async move {
                let _ = shutdown_rx.wait_for(|stop| *stop).await;
                trace!("Metrics server received shutdown signal.");
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!("Metrics server error: {}", e);
            }
            trace!("Metrics server task finished.");
        }
    }
}
