/// PulseWatch - an edge telemetry anomaly monitor
///
/// This library provides the sampling loop, the feature assembly and
/// classification pipeline, and the data sources and outputs around it.
pub mod app;
pub mod category;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod core;
pub mod features;
pub mod formatting;
pub mod internal_metrics;
pub mod outputs;
pub mod probes;
pub mod sampler;
pub mod task_manager;

// Re-export core types for convenience
pub use crate::core::*;
