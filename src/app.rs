//! The main application logic, decoupled from the entry point.

use crate::{
    classifier::{AnomalyClassifier, ClassifierArtifact},
    config::Config,
    core::{NetworkProbe, Output, SampleRecord, SensorLink, SignalProbe, SystemMetricsProvider},
    internal_metrics::{Metrics, MetricsBuilder},
    outputs::OutputManager,
    probes::{PingProbe, SerialSensorLink, SysinfoMetrics, WirelessSignalProbe},
    sampler::{Collectors, Pipeline, SampleLoop},
    task_manager::TaskManager,
};
use anyhow::{Context, Result};
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, warn};

/// A handle to the running application, containing all its task handles.
pub struct App {
    task_manager: TaskManager,
    metrics_addr: Option<SocketAddr>,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_addr
    }

    /// Waits for the shutdown signal and then gracefully shuts down all tasks.
    pub async fn run(self) -> Result<()> {
        let mut shutdown_rx = self.task_manager.get_shutdown_rx();
        // A dropped sender counts as a shutdown request.
        let _ = shutdown_rx.wait_for(|stop| *stop).await;
        info!("Shutdown signal received. Waiting for tasks to complete...");

        self.task_manager.shutdown().await;

        info!("All tasks shut down.");
        Ok(())
    }
}

/// Everything one iteration needs, wired from configuration or overrides.
struct Components {
    collectors: Collectors,
    pipeline: Pipeline,
    output_manager: OutputManager,
    metrics: Metrics,
}

/// Builder for the main application.
///
/// This pattern allows for a clean separation of concerns between constructing
/// the application's components and running the application. It also provides
/// a convenient way to override components for testing purposes.
pub struct AppBuilder {
    config: Config,
    classifier_override: Option<Arc<AnomalyClassifier>>,
    system_override: Option<Box<dyn SystemMetricsProvider>>,
    network_override: Option<Box<dyn NetworkProbe>>,
    signal_override: Option<Box<dyn SignalProbe>>,
    sensor_link_override: Option<Box<dyn SensorLink>>,
    output_override: Option<Vec<Arc<dyn Output>>>,
    metrics_override: Option<Metrics>,
}

impl AppBuilder {
    /// Creates a new `AppBuilder` with the given configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            classifier_override: None,
            system_override: None,
            network_override: None,
            signal_override: None,
            sensor_link_override: None,
            output_override: None,
            metrics_override: None,
        }
    }

    /// Uses an already loaded classifier instead of reading the artifact file.
    pub fn classifier_override(mut self, classifier: Arc<AnomalyClassifier>) -> Self {
        self.classifier_override = Some(classifier);
        self
    }

    /// Overrides the host metrics provider.
    pub fn system_override(mut self, system: Box<dyn SystemMetricsProvider>) -> Self {
        self.system_override = Some(system);
        self
    }

    /// Overrides the network probe.
    pub fn network_override(mut self, network: Box<dyn NetworkProbe>) -> Self {
        self.network_override = Some(network);
        self
    }

    /// Overrides the signal probe.
    pub fn signal_override(mut self, signal: Box<dyn SignalProbe>) -> Self {
        self.signal_override = Some(signal);
        self
    }

    /// Overrides the sensor link instead of opening the configured device.
    pub fn sensor_link_override(mut self, link: Box<dyn SensorLink>) -> Self {
        self.sensor_link_override = Some(link);
        self
    }

    /// Overrides the record outputs.
    pub fn output_override(mut self, outputs: Vec<Arc<dyn Output>>) -> Self {
        self.output_override = Some(outputs);
        self
    }

    /// Overrides the metrics system.
    pub fn metrics_override(mut self, metrics: Metrics) -> Self {
        self.metrics_override = Some(metrics);
        self
    }

    /// Loads the classifier artifact named in the configuration.
    pub fn load_classifier(config: &Config) -> Result<AnomalyClassifier> {
        let path = config
            .classifier
            .artifact_path
            .as_ref()
            .context("classifier.artifact_path is required")?;
        let artifact = ClassifierArtifact::load(path)
            .with_context(|| format!("Failed to load classifier from {}", path.display()))?;
        Ok(AnomalyClassifier::new(artifact))
    }

    fn open_sensor_link(config: &Config) -> Result<Option<Box<dyn SensorLink>>> {
        let path = &config.sensor_link.device_path;
        match SerialSensorLink::open(path, config.sensor_link.baud_rate) {
            Ok(link) => Ok(Some(Box::new(link))),
            Err(e) if config.sensor_link.required => Err(e)
                .with_context(|| format!("Failed to open sensor link {}", path.display())),
            Err(e) => {
                warn!(
                    device = %path.display(),
                    error = %e,
                    "Sensor link unavailable; sensor fields will be absent"
                );
                Ok(None)
            }
        }
    }

    /// Resolves every component. Any error here is fatal: the loop must not start.
    fn components(&mut self, metrics: Metrics) -> Result<Components> {
        let config = &self.config;

        let classifier = match self.classifier_override.take() {
            Some(classifier) => classifier,
            None => Arc::new(Self::load_classifier(config)?),
        };

        let sensor_link = match self.sensor_link_override.take() {
            Some(link) => Some(link),
            None => Self::open_sensor_link(config)?,
        };

        let collectors = Collectors {
            system: self
                .system_override
                .take()
                .unwrap_or_else(|| Box::new(SysinfoMetrics::new(config.system.thermal_label.clone()))),
            network: self.network_override.take().unwrap_or_else(|| {
                Box::new(PingProbe::new(
                    config.network.ping_program.clone(),
                    config.network.reply_timeout(),
                    config.network.timeout(),
                ))
            }),
            signal: self.signal_override.take().unwrap_or_else(|| {
                Box::new(WirelessSignalProbe::new(
                    config.signal.wireless_path.clone(),
                    config.signal.interface.clone(),
                ))
            }),
            sensor_link,
            target_host: config.network.target_host.clone(),
            ping_count: config.network.ping_count,
        };

        let output_manager = match self.output_override.take() {
            Some(outputs) => OutputManager::new(outputs, metrics.clone()),
            None => OutputManager::from_config(config, metrics.clone())?,
        };
        debug!(outputs = ?output_manager.output_names(), "Outputs configured");

        Ok(Components {
            collectors,
            pipeline: Pipeline::new(classifier),
            output_manager,
            metrics,
        })
    }

    /// Runs exactly one iteration and delivers its record to the outputs
    /// before returning it. No background tasks are started.
    pub async fn run_once(mut self) -> Result<SampleRecord> {
        let metrics = self.metrics_override.take().unwrap_or_else(Metrics::disabled);
        let components = self.components(metrics)?;

        let (records_tx, mut records_rx) = mpsc::channel(1);
        let mut sample_loop = SampleLoop::new(
            components.collectors,
            components.pipeline,
            records_tx,
            self.config.sampling.interval(),
            components.metrics,
        );
        let record = sample_loop.run_once().await;
        drop(sample_loop);

        if let Some(queued) = records_rx.recv().await {
            // Delivery failures are already logged per output.
            let _ = components.output_manager.send_record(&queued).await;
        }
        Ok(record)
    }

    /// Builds and initializes all application components, returning a runnable `App`.
    #[instrument(skip_all)]
    pub async fn build(mut self, shutdown_rx: watch::Receiver<bool>) -> Result<App> {
        let task_manager = TaskManager::new(shutdown_rx);

        // =========================================================================
        // 1. Initialize Metrics
        // =========================================================================
        let (metrics, metrics_addr) = match self.metrics_override.take() {
            Some(m) => (m, None),
            None => {
                let (metrics, server_info) =
                    MetricsBuilder::new(self.config.metrics.clone()).build(task_manager.get_shutdown_rx());
                let addr = server_info.map(|(server, addr)| {
                    task_manager.spawn("MetricsServer", server.run());
                    info!(%addr, "Metrics server listening");
                    addr
                });
                (metrics, addr)
            }
        };

        // =========================================================================
        // 2. Startup resources (fatal on failure)
        // =========================================================================
        let components = self.components(metrics)?;

        // =========================================================================
        // 3. Publisher
        // =========================================================================
        let (records_tx, records_rx) =
            mpsc::channel::<SampleRecord>(self.config.sampling.queue_capacity.max(1));
        task_manager.spawn(
            "Publisher",
            publisher_task_logic(records_rx, Arc::new(components.output_manager)),
        );

        // =========================================================================
        // 4. Sampling loop
        // =========================================================================
        let sample_loop = SampleLoop::new(
            components.collectors,
            components.pipeline,
            records_tx,
            self.config.sampling.interval(),
            components.metrics,
        );
        task_manager.spawn("SampleLoop", sample_loop.run(task_manager.get_shutdown_rx()));

        info!("PulseWatch initialized successfully. Sampling...");

        Ok(App {
            task_manager,
            metrics_addr,
        })
    }
}

/// Delivers queued records until the sampling loop drops its sender.
#[instrument(skip_all)]
async fn publisher_task_logic(
    mut records_rx: mpsc::Receiver<SampleRecord>,
    output_manager: Arc<OutputManager>,
) {
    while let Some(record) = records_rx.recv().await {
        debug!(timestamp = %record.timestamp, "Publishing record");
        if let Err(e) = output_manager.send_record(&record).await {
            debug!(error = %e, "Record delivery incomplete");
        }
    }
    info!("Publisher finished.");
}
