//! The fixed-shape feature vector fed to the anomaly classifier.
//!
//! Field order is the input contract of the scaler and the model, so it is
//! encoded once in [`Feature::ALL`] and every conversion goes through it.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;

/// Number of features in a [`FeatureVector`].
pub const FEATURE_COUNT: usize = 17;

/// One named slot of the feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    AmbientTemp,
    Ax,
    Ay,
    Az,
    BytesRecv,
    BytesSent,
    CpuLoad,
    CpuTemp,
    Gx,
    Gy,
    Gz,
    Humidity,
    MotionLevel,
    PacketLoss,
    PingAvg,
    PingJitter,
    WifiStrength,
}

impl Feature {
    /// Canonical order. Must never change.
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::AmbientTemp,
        Feature::Ax,
        Feature::Ay,
        Feature::Az,
        Feature::BytesRecv,
        Feature::BytesSent,
        Feature::CpuLoad,
        Feature::CpuTemp,
        Feature::Gx,
        Feature::Gy,
        Feature::Gz,
        Feature::Humidity,
        Feature::MotionLevel,
        Feature::PacketLoss,
        Feature::PingAvg,
        Feature::PingJitter,
        Feature::WifiStrength,
    ];

    /// Position of this feature in the canonical order.
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            Feature::AmbientTemp => "ambient_temp",
            Feature::Ax => "ax",
            Feature::Ay => "ay",
            Feature::Az => "az",
            Feature::BytesRecv => "bytes_recv",
            Feature::BytesSent => "bytes_sent",
            Feature::CpuLoad => "cpu_load",
            Feature::CpuTemp => "cpu_temp",
            Feature::Gx => "gx",
            Feature::Gy => "gy",
            Feature::Gz => "gz",
            Feature::Humidity => "humidity",
            Feature::MotionLevel => "motion_level",
            Feature::PacketLoss => "packet_loss",
            Feature::PingAvg => "ping_avg",
            Feature::PingJitter => "ping_jitter",
            Feature::WifiStrength => "wifi_strength",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.name() == name)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fully populated snapshot, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn from_array(values: [f64; FEATURE_COUNT]) -> Self {
        Self(values)
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.0[feature.index()]
    }

    pub fn set(&mut self, feature: Feature, value: f64) {
        self.0[feature.index()] = value;
    }

    pub fn as_array(&self) -> &[f64; FEATURE_COUNT] {
        &self.0
    }

    /// Iterates `(feature, value)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        Feature::ALL.iter().map(move |f| (*f, self.0[f.index()]))
    }
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self([0.0; FEATURE_COUNT])
    }
}

impl Index<Feature> for FeatureVector {
    type Output = f64;

    fn index(&self, feature: Feature) -> &f64 {
        &self.0[feature.index()]
    }
}

// Serialized as a flat map so the fields can be inlined into the published record.
impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FEATURE_COUNT))?;
        for (feature, value) in self.iter() {
            map.serialize_entry(feature.name(), &value)?;
        }
        map.end()
    }
}

/// Closed interval a feature is clamped into.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipRange {
    pub min: f64,
    pub max: f64,
}

impl ClipRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn clip(&self, value: f64) -> f64 {
        self.min.max(self.max.min(value))
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Per-feature clip ranges taken from the training distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipRanges([ClipRange; FEATURE_COUNT]);

impl ClipRanges {
    pub fn get(&self, feature: Feature) -> ClipRange {
        self.0[feature.index()]
    }

    /// Starts from the training defaults and replaces the given entries.
    pub fn with_overrides(overrides: &BTreeMap<Feature, ClipRange>) -> Self {
        let mut ranges = Self::default();
        for (feature, range) in overrides {
            ranges.0[feature.index()] = *range;
        }
        ranges
    }
}

impl Default for ClipRanges {
    fn default() -> Self {
        const ACCEL: ClipRange = ClipRange::new(-20_000.0, 20_000.0);
        const GYRO: ClipRange = ClipRange::new(-5_000.0, 5_000.0);
        const BYTES: ClipRange = ClipRange::new(0.0, 50_000_000.0);
        const PERCENT: ClipRange = ClipRange::new(0.0, 100.0);

        Self([
            ClipRange::new(15.0, 35.0), // ambient_temp
            ACCEL,
            ACCEL,
            ACCEL,
            BYTES,
            BYTES,
            PERCENT,                    // cpu_load
            ClipRange::new(20.0, 90.0), // cpu_temp
            GYRO,
            GYRO,
            GYRO,
            PERCENT, // humidity
            PERCENT, // motion_level
            PERCENT, // packet_loss
            ClipRange::new(0.0, 2_000.0),
            ClipRange::new(0.0, 200.0),
            ClipRange::new(-100.0, 0.0),
        ])
    }
}

/// Readings merged from all sources for one iteration. `None` means the
/// source did not deliver that value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialReadings([Option<f64>; FEATURE_COUNT]);

impl PartialReadings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, feature: Feature) -> Option<f64> {
        self.0[feature.index()]
    }

    pub fn set(&mut self, feature: Feature, value: Option<f64>) {
        self.0[feature.index()] = value;
    }

    pub fn with(mut self, feature: Feature, value: f64) -> Self {
        self.set(feature, Some(value));
        self
    }

    /// Copies every present value of `other` over this one. Later sources win.
    pub fn merge(&mut self, other: &PartialReadings) {
        for feature in Feature::ALL {
            if let Some(value) = other.get(feature) {
                self.set(feature, Some(value));
            }
        }
    }

    pub fn present_count(&self) -> usize {
        self.0.iter().filter(|v| v.is_some()).count()
    }
}

/// Turns partial readings into a complete, clipped [`FeatureVector`].
#[derive(Debug, Clone, Default)]
pub struct FeatureAssembler {
    ranges: ClipRanges,
}

impl FeatureAssembler {
    pub fn new(ranges: ClipRanges) -> Self {
        Self { ranges }
    }

    pub fn ranges(&self) -> &ClipRanges {
        &self.ranges
    }

    /// Absent values become `0`; measured values are clamped into their
    /// clip range. The zero default is not clamped, so an absent field whose
    /// range excludes zero (e.g. `ambient_temp`) stays at exactly `0`.
    pub fn assemble(&self, readings: &PartialReadings) -> FeatureVector {
        let mut vector = FeatureVector::default();
        for feature in Feature::ALL {
            let value = match readings.get(feature) {
                Some(v) if v.is_nan() => 0.0,
                Some(v) => self.ranges.get(feature).clip(v),
                None => 0.0,
            };
            vector.set(feature, value);
        }
        vector
    }
}
