// src/formatting.rs

use crate::core::SampleRecord;
use crate::features::Feature;

/// A trait for rendering a record as a single line of text.
pub trait TextFormatter: Send + Sync {
    fn format_record(&self, record: &SampleRecord) -> String;
}

/// One human-readable line per record: status, category, then the network
/// and thermal readings an operator looks at first.
pub struct PlainTextFormatter;

impl TextFormatter for PlainTextFormatter {
    fn format_record(&self, record: &SampleRecord) -> String {
        let v = &record.feature_vector;
        let status = if record.is_anomaly { "ANOMALY" } else { "ok" };
        format!(
            "[{}] {} category={} ping={:.1}ms jitter={:.1}ms loss={:.0}% wifi={}dBm cpu={:.1}% cpu_temp={:.1}C ambient={:.1}C motion={}",
            record.timestamp.to_rfc3339(),
            status,
            record.category,
            v[Feature::PingAvg],
            v[Feature::PingJitter],
            v[Feature::PacketLoss],
            v[Feature::WifiStrength],
            v[Feature::CpuLoad],
            v[Feature::CpuTemp],
            v[Feature::AmbientTemp],
            v[Feature::MotionLevel],
        )
    }
}
