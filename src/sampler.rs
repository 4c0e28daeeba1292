//! The sampling loop.
//!
//! Every iteration walks the same five stages in order:
//! `Collect → Assemble → Classify → Categorize → Publish`, then sleeps for
//! the configured interval. A failure inside a stage is logged and degraded
//! locally; nothing that happens during an iteration ends the loop. The
//! shutdown signal is only observed between iterations.

use crate::category::{Category, CategoryEngine};
use crate::classifier::AnomalyClassifier;
use crate::core::{NetworkProbe, SampleRecord, SensorLink, SignalProbe, SystemMetricsProvider};
use crate::features::{Feature, FeatureAssembler, FeatureVector, PartialReadings};
use crate::internal_metrics::Metrics;
use crate::outputs::SinkError;
use crate::probes::SensorLinkError;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

/// The stages of one iteration, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Collect,
    Assemble,
    Classify,
    Categorize,
    Publish,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The four data sources, owned for the lifetime of the loop.
pub struct Collectors {
    pub system: Box<dyn SystemMetricsProvider>,
    pub network: Box<dyn NetworkProbe>,
    pub signal: Box<dyn SignalProbe>,
    /// `None` when the link was optional and could not be opened.
    pub sensor_link: Option<Box<dyn SensorLink>>,
    pub target_host: String,
    pub ping_count: u32,
}

impl Collectors {
    /// Reads every source once. Each source is isolated: a failure leaves
    /// its fields absent and is logged with the source name.
    pub async fn collect(&mut self, timestamp: DateTime<Utc>, metrics: &Metrics) -> PartialReadings {
        let mut readings = PartialReadings::new();

        match self.system.sample().await {
            Ok(sample) => readings.merge(&sample.to_readings()),
            Err(e) => {
                metrics.increment_probe_failure("system");
                warn!(source = "system", %timestamp, error = %e, "System metrics unavailable");
            }
        }

        if let Some(link) = self.sensor_link.as_mut() {
            match link.poll().await {
                Ok(Some(reading)) => readings.merge(&reading.to_readings()),
                Ok(None) => trace!(source = "sensor_link", "No sensor record ready"),
                Err(e @ SensorLinkError::Parse { .. }) => {
                    metrics.sensor_parse_errors_total.increment(1);
                    warn!(source = "sensor_link", %timestamp, error = %e, "Discarding sensor record");
                }
                Err(e) => {
                    metrics.increment_probe_failure("sensor_link");
                    warn!(source = "sensor_link", %timestamp, error = %e, "Sensor link unavailable");
                }
            }
        }

        let network = self.network.measure(&self.target_host, self.ping_count).await;
        if network.avg_latency_ms.is_none() {
            metrics.increment_probe_failure("network");
            warn!(
                source = "network",
                %timestamp,
                host = %self.target_host,
                loss_percent = network.loss_percent,
                "Network path unreachable"
            );
        }
        readings.merge(&network.to_readings());

        match self.signal.read().await {
            Ok(dbm) => readings.set(Feature::WifiStrength, Some(dbm as f64)),
            Err(e) => {
                metrics.increment_probe_failure("signal");
                warn!(source = "signal", %timestamp, error = %e, "Signal strength unavailable");
            }
        }

        readings
    }
}

/// The pure part of an iteration: assembly, classification and
/// categorisation. Shared read-only.
#[derive(Debug, Clone)]
pub struct Pipeline {
    assembler: FeatureAssembler,
    classifier: Arc<AnomalyClassifier>,
    engine: CategoryEngine,
}

impl Pipeline {
    /// Uses the clip ranges carried by the classifier artifact.
    pub fn new(classifier: Arc<AnomalyClassifier>) -> Self {
        let assembler = FeatureAssembler::new(classifier.artifact().clip_ranges().clone());
        Self {
            assembler,
            classifier,
            engine: CategoryEngine::new(),
        }
    }

    pub fn assemble(&self, readings: &PartialReadings) -> FeatureVector {
        self.assembler.assemble(readings)
    }

    pub fn classify(&self, vector: &FeatureVector) -> bool {
        self.classifier.is_anomaly(vector)
    }

    pub fn categorize(&self, vector: &FeatureVector, is_anomaly: bool) -> Category {
        self.engine.categorize(vector, is_anomaly)
    }

    /// Runs the Assemble, Classify and Categorize stages.
    pub fn process(&self, readings: &PartialReadings, timestamp: DateTime<Utc>) -> SampleRecord {
        trace!(stage = %Stage::Assemble, present = readings.present_count());
        let feature_vector = self.assemble(readings);

        trace!(stage = %Stage::Classify);
        let is_anomaly = self.classify(&feature_vector);

        trace!(stage = %Stage::Categorize, is_anomaly);
        let category = self.categorize(&feature_vector, is_anomaly);

        SampleRecord {
            timestamp,
            is_anomaly,
            category,
            feature_vector,
        }
    }
}

/// Drives the iterations and hands records to the publisher.
pub struct SampleLoop {
    collectors: Collectors,
    pipeline: Pipeline,
    records_tx: mpsc::Sender<SampleRecord>,
    interval: Duration,
    metrics: Metrics,
    iteration: u64,
}

impl SampleLoop {
    pub fn new(
        collectors: Collectors,
        pipeline: Pipeline,
        records_tx: mpsc::Sender<SampleRecord>,
        interval: Duration,
        metrics: Metrics,
    ) -> Self {
        Self {
            collectors,
            pipeline,
            records_tx,
            interval,
            metrics,
            iteration: 0,
        }
    }

    /// Number of iterations completed so far.
    pub fn iterations(&self) -> u64 {
        self.iteration
    }

    /// Runs one full iteration and returns the record it produced.
    pub async fn run_once(&mut self) -> SampleRecord {
        let started = Instant::now();
        let timestamp = Utc::now();
        self.iteration += 1;

        trace!(stage = %Stage::Collect, iteration = self.iteration);
        let readings = self.collectors.collect(timestamp, &self.metrics).await;

        let record = self.pipeline.process(&readings, timestamp);

        trace!(stage = %Stage::Publish, iteration = self.iteration);
        match self.publish(&record) {
            Ok(()) => info!(
                iteration = self.iteration,
                is_anomaly = record.is_anomaly,
                category = %record.category,
                "Sample published"
            ),
            Err(e) => warn!(
                iteration = self.iteration,
                %timestamp,
                is_anomaly = record.is_anomaly,
                category = %record.category,
                error = %e,
                "Record not published"
            ),
        }

        self.metrics.samples_total.increment(1);
        if record.is_anomaly {
            self.metrics.increment_anomaly(record.category);
        }
        self.metrics.record_iteration(started.elapsed());
        record
    }

    // Never waits: a full or closed queue drops the record.
    fn publish(&self, record: &SampleRecord) -> Result<(), SinkError> {
        self.records_tx.try_send(record.clone()).map_err(|e| {
            self.metrics.records_dropped_total.increment(1);
            match e {
                mpsc::error::TrySendError::Full(_) => SinkError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => SinkError::QueueClosed,
            }
        })
    }

    /// Loops until `shutdown_rx` turns `true`. The signal is checked before
    /// each iteration and during the sleep, never in the middle of one.
    /// Dropping the loop on return releases the sensor link.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(interval = ?self.interval, "Sampling loop started");
        loop {
            if *shutdown_rx.borrow() {
                break;
            }
            self.run_once().await;

            // A dropped sender also ends the loop.
            let stop = tokio::select! {
                biased;
                _ = shutdown_rx.wait_for(|stop| *stop) => true,
                _ = tokio::time::sleep(self.interval) => false,
            };
            if stop {
                break;
            }
        }
        debug!(iterations = self.iteration, "Sampling loop received shutdown signal");
        info!("Sampling loop finished.");
    }
}
