#![allow(dead_code)]
//! Scripted data sources for driving the sampling loop without hardware.

use async_trait::async_trait;
use pulsewatch::core::{
    NetworkMeasurement, NetworkProbe, SensorLink, SensorReading, SignalProbe, SystemMetricsProvider,
    SystemSample,
};
use pulsewatch::probes::{ProbeError, SensorLinkError};
use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

/// Returns the same host sample on every call, or fails when `sample` is `None`.
pub struct StaticSystem {
    pub sample: Option<SystemSample>,
}

impl StaticSystem {
    pub fn new(cpu_temp: f64, cpu_load: f64) -> Self {
        Self {
            sample: Some(SystemSample {
                cpu_temp: Some(cpu_temp),
                cpu_load,
                bytes_sent: 1_000,
                bytes_recv: 2_000,
            }),
        }
    }

    pub fn failing() -> Self {
        Self { sample: None }
    }
}

#[async_trait]
impl SystemMetricsProvider for StaticSystem {
    async fn sample(&mut self) -> Result<SystemSample, ProbeError> {
        self.sample
            .ok_or_else(|| ProbeError::Unavailable("no host metrics in this test".to_string()))
    }
}

/// Replays a list of measurements, then repeats the last one.
pub struct ScriptedNetwork {
    script: VecDeque<NetworkMeasurement>,
    last: NetworkMeasurement,
    pub calls: Arc<AtomicUsize>,
}

impl ScriptedNetwork {
    pub fn new(script: Vec<NetworkMeasurement>) -> Self {
        Self {
            script: script.into(),
            last: NetworkMeasurement::unreachable(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn healthy() -> Self {
        Self::new(vec![measurement(20.0, 0.0, 2.0)])
    }
}

pub fn measurement(avg: f64, loss: f64, jitter: f64) -> NetworkMeasurement {
    NetworkMeasurement {
        avg_latency_ms: Some(avg),
        loss_percent: loss,
        jitter_ms: Some(jitter),
    }
}

#[async_trait]
impl NetworkProbe for ScriptedNetwork {
    async fn measure(&mut self, _host: &str, _count: u32) -> NetworkMeasurement {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(next) = self.script.pop_front() {
            self.last = next;
        }
        self.last
    }
}

/// A fixed signal level; `None` simulates a missing interface.
pub struct StaticSignal(pub Option<i32>);

#[async_trait]
impl SignalProbe for StaticSignal {
    async fn read(&mut self) -> Result<i32, ProbeError> {
        self.0
            .ok_or_else(|| ProbeError::Unavailable("no wireless interface".to_string()))
    }
}

/// Replays poll results, then reports "nothing ready". Records its own drop.
pub struct ScriptedSensorLink {
    polls: VecDeque<Result<Option<SensorReading>, SensorLinkError>>,
    pub dropped: Arc<AtomicBool>,
}

impl ScriptedSensorLink {
    pub fn new(polls: Vec<Result<Option<SensorReading>, SensorLinkError>>) -> Self {
        Self {
            polls: polls.into(),
            dropped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn idle() -> Self {
        Self::new(Vec::new())
    }
}

impl Drop for ScriptedSensorLink {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SensorLink for ScriptedSensorLink {
    async fn poll(&mut self) -> Result<Option<SensorReading>, SensorLinkError> {
        self.polls.pop_front().unwrap_or(Ok(None))
    }
}

pub fn sensor_reading(ambient_temp: f64, motion_level: i64) -> SensorReading {
    SensorReading {
        ambient_temp: Some(ambient_temp),
        humidity: Some(40.0),
        motion_level: Some(motion_level),
        ax: Some(10),
        ay: Some(-5),
        az: Some(16_000),
        gx: Some(1),
        gy: Some(0),
        gz: Some(-1),
    }
}
