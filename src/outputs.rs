//! Output destinations and management system
//!
//! This module implements the places a finished [`SampleRecord`] can go
//! (stdout, an HTTP telemetry store, a JSON Lines file) and the manager that
//! fans each record out to all of them.

use crate::config::{Config, OutputFormat};
use crate::core::{Output, SampleRecord};
use crate::formatting::{PlainTextFormatter, TextFormatter};
use crate::internal_metrics::Metrics;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error};

/// A record could not be handed to, or delivered by, the outputs.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("publish queue is full, record dropped")]
    QueueFull,

    #[error("publish queue is closed, record dropped")]
    QueueClosed,

    #[error("{failed} of {total} outputs failed")]
    Delivery { failed: usize, total: usize },
}

/// Dispatches every record to all configured outputs.
pub struct OutputManager {
    outputs: Vec<Arc<dyn Output>>,
    metrics: Metrics,
}

impl OutputManager {
    pub fn new(outputs: Vec<Arc<dyn Output>>, metrics: Metrics) -> Self {
        Self { outputs, metrics }
    }

    /// Builds the outputs named in the configuration.
    pub fn from_config(config: &Config, metrics: Metrics) -> Result<Self> {
        let mut outputs: Vec<Arc<dyn Output>> = Vec::new();
        if config.output.stdout {
            outputs.push(Arc::new(StdoutOutput::new(config.output.format.clone())));
        }
        if let Some(http) = &config.output.http {
            outputs.push(Arc::new(HttpOutput::new(
                http.url.clone(),
                Duration::from_secs(http.timeout_seconds),
            )?));
        }
        if let Some(file) = &config.output.file {
            outputs.push(Arc::new(JsonlFileOutput::new(file.path.clone())));
        }
        Ok(Self::new(outputs, metrics))
    }

    pub fn output_names(&self) -> Vec<&str> {
        self.outputs.iter().map(|o| o.name()).collect()
    }

    /// Sends the record to every output. A failing output is logged and does
    /// not stop delivery to the others.
    pub async fn send_record(&self, record: &SampleRecord) -> Result<(), SinkError> {
        let mut failed = 0;
        for output in &self.outputs {
            if let Err(e) = output.send_record(record).await {
                failed += 1;
                self.metrics.increment_sink_failure(output.name());
                error!(
                    output = output.name(),
                    timestamp = %record.timestamp,
                    error = %e,
                    "Failed to publish record"
                );
            }
        }
        if failed > 0 {
            return Err(SinkError::Delivery {
                failed,
                total: self.outputs.len(),
            });
        }
        Ok(())
    }
}

/// Prints records to stdout.
pub struct StdoutOutput {
    format: OutputFormat,
    formatter: PlainTextFormatter,
}

impl StdoutOutput {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            formatter: PlainTextFormatter,
        }
    }

    pub fn render(&self, record: &SampleRecord) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(record.to_json()?),
            OutputFormat::PlainText => Ok(self.formatter.format_record(record)),
        }
    }
}

#[async_trait]
impl Output for StdoutOutput {
    fn name(&self) -> &str {
        "stdout"
    }

    async fn send_record(&self, record: &SampleRecord) -> Result<()> {
        let line = self.render(record)?;
        println!("{}", line);
        Ok(())
    }
}

/// POSTs each record as JSON to a remote telemetry store.
pub struct HttpOutput {
    client: reqwest::Client,
    url: String,
}

impl HttpOutput {
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl Output for HttpOutput {
    fn name(&self) -> &str {
        "http"
    }

    async fn send_record(&self, record: &SampleRecord) -> Result<()> {
        let response = self.client.post(&self.url).json(record).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("telemetry store returned status {}: {}", status, body);
        }
        debug!(url = %self.url, "Record delivered to telemetry store");
        Ok(())
    }
}

/// Appends each record as one JSON line to a local file.
pub struct JsonlFileOutput {
    path: PathBuf,
    // Serialises appends from concurrent publishers.
    lock: Mutex<()>,
}

impl JsonlFileOutput {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl Output for JsonlFileOutput {
    fn name(&self) -> &str {
        "file"
    }

    async fn send_record(&self, record: &SampleRecord) -> Result<()> {
        let mut line = record.to_json()?;
        line.push('\n');

        let _guard = self.lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
