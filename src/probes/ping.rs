//! Network path quality via the system `ping` utility.
//!
//! The utility runs as a child process under a hard deadline. Its output is
//! parsed for per-reply round-trip times; everything else is ignored.

use crate::core::{NetworkMeasurement, NetworkProbe};
use crate::probes::ProbeError;
use async_trait::async_trait;
use regex::Regex;
use std::future::Future;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

fn reply_time_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"time[=<]\s*([0-9]+(?:\.[0-9]+)?)\s*ms").expect("valid regex"))
}

/// Extracts the round-trip time of every echo reply, in milliseconds.
pub fn parse_reply_times(output: &str) -> Vec<f64> {
    output
        .lines()
        .filter_map(|line| reply_time_regex().captures(line))
        .filter_map(|caps| caps.get(1)?.as_str().parse::<f64>().ok())
        .collect()
}

/// Summarises reply times for `count` requests.
///
/// Average and population standard deviation of the replies; loss is the
/// share of requests without a reply. No replies at all is an error.
pub fn summarize(replies: &[f64], count: u32) -> Result<NetworkMeasurement, ProbeError> {
    if replies.is_empty() || count == 0 {
        return Err(ProbeError::Output("no echo replies".to_string()));
    }
    let n = replies.len() as f64;
    let mean = replies.iter().sum::<f64>() / n;
    let variance = replies.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let loss = (100.0 - n / count as f64 * 100.0).max(0.0);

    Ok(NetworkMeasurement {
        avg_latency_ms: Some(mean),
        loss_percent: loss,
        jitter_ms: Some(variance.sqrt()),
    })
}

/// Awaits a measurement under `deadline`, folding every failure into the
/// unreachable measurement.
pub async fn bounded<F>(host: &str, deadline: Duration, measurement: F) -> NetworkMeasurement
where
    F: Future<Output = Result<NetworkMeasurement, ProbeError>>,
{
    let result = match tokio::time::timeout(deadline, measurement).await {
        Ok(result) => result,
        Err(_) => Err(ProbeError::Timeout(deadline)),
    };
    match result {
        Ok(m) => m,
        Err(e) => {
            debug!(host, error = %e, "Network probe failed");
            NetworkMeasurement::unreachable()
        }
    }
}

/// `ping` sends one request per second.
const REQUEST_SPACING: Duration = Duration::from_secs(1);
/// Allowance for process startup and the summary after the last reply.
const DEADLINE_SLACK: Duration = Duration::from_secs(1);

/// Runs `ping -c <count> -W <reply_timeout> <host>`.
#[derive(Debug, Clone)]
pub struct PingProbe {
    program: String,
    reply_timeout: Duration,
    deadline: Duration,
}

impl PingProbe {
    pub fn new(program: impl Into<String>, reply_timeout: Duration, deadline: Duration) -> Self {
        Self {
            program: program.into(),
            reply_timeout,
            deadline,
        }
    }

    fn wait_secs(&self) -> u64 {
        self.reply_timeout.as_secs().max(1)
    }

    /// The deadline for `count` requests: the configured one, stretched to
    /// the time `ping` needs to send them all and wait for the last reply.
    pub fn deadline_for(&self, count: u32) -> Duration {
        let needed = REQUEST_SPACING * count.saturating_sub(1)
            + Duration::from_secs(self.wait_secs())
            + DEADLINE_SLACK;
        self.deadline.max(needed)
    }

    async fn run(&self, host: &str, count: u32) -> Result<NetworkMeasurement, ProbeError> {
        let wait_secs = self.wait_secs();
        let output = Command::new(&self.program)
            .arg("-c")
            .arg(count.to_string())
            .arg("-W")
            .arg(wait_secs.to_string())
            .arg(host)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ProbeError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // A non-zero exit only means some requests went unanswered.
        let stdout = String::from_utf8_lossy(&output.stdout);
        let replies = parse_reply_times(&stdout);
        debug!(host, replies = replies.len(), status = ?output.status, "Ping finished");
        summarize(&replies, count)
    }
}

impl Default for PingProbe {
    fn default() -> Self {
        Self::new("ping", Duration::from_secs(1), Duration::from_secs(5))
    }
}

#[async_trait]
impl NetworkProbe for PingProbe {
    async fn measure(&mut self, host: &str, count: u32) -> NetworkMeasurement {
        bounded(host, self.deadline_for(count), self.run(host, count)).await
    }
}
