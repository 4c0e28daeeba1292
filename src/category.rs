//! Root-cause categorisation of anomalous samples.
//!
//! The engine is an ordered list of predicates over the unscaled feature
//! vector. The first rule that holds decides the category; the order is part
//! of the behaviour and must not be rearranged.

use crate::features::{Feature, FeatureVector};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Root-cause label attached to every published sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Normal,
    Thermal,
    #[serde(rename = "Motion-Induced")]
    MotionInduced,
    #[serde(rename = "Weak Signal")]
    WeakSignal,
    #[serde(rename = "Unknown Network Issue")]
    UnknownNetworkIssue,
    #[serde(rename = "System Load")]
    SystemLoad,
}

impl Category {
    pub const fn as_str(self) -> &'static str {
        match self {
            Category::Normal => "Normal",
            Category::Thermal => "Thermal",
            Category::MotionInduced => "Motion-Induced",
            Category::WeakSignal => "Weak Signal",
            Category::UnknownNetworkIssue => "Unknown Network Issue",
            Category::SystemLoad => "System Load",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Guards the jitter ratio against a zero average latency.
const EPSILON: f64 = 1e-6;

const PING_AVG_BAD_MS: f64 = 100.0;
const PACKET_LOSS_BAD: f64 = 0.1;
const JITTER_BAD_MS: f64 = 30.0;
const JITTER_SEVERE_MS: f64 = 40.0;
const CPU_TEMP_HOT: f64 = 65.0;
const CPU_LOAD_HIGH: f64 = 6.0;
const CPU_LOAD_SATURATED: f64 = 8.0;
const WIFI_WEAK_DBM: f64 = -70.0;
const JITTER_RATIO_WEAK: f64 = 0.4;
const JITTER_RATIO_UNEXPLAINED: f64 = 0.6;

/// Terms shared by several rules, computed once per evaluation.
#[derive(Debug, Clone, Copy)]
pub struct Signals<'a> {
    pub vector: &'a FeatureVector,
    pub network_bad: bool,
    pub jitter_ratio: f64,
}

impl<'a> Signals<'a> {
    pub fn derive(vector: &'a FeatureVector) -> Self {
        let ping_avg = vector[Feature::PingAvg];
        let jitter = vector[Feature::PingJitter];
        let network_bad = ping_avg > PING_AVG_BAD_MS
            || vector[Feature::PacketLoss] > PACKET_LOSS_BAD
            || jitter > JITTER_BAD_MS;

        Self {
            vector,
            network_bad,
            jitter_ratio: jitter / (ping_avg + EPSILON),
        }
    }

    fn get(&self, feature: Feature) -> f64 {
        self.vector[feature]
    }
}

/// A single named predicate with the category it assigns.
pub struct CategoryRule {
    pub name: &'static str,
    pub category: Category,
    predicate: fn(&Signals<'_>) -> bool,
}

impl CategoryRule {
    pub fn is_match(&self, signals: &Signals<'_>) -> bool {
        (self.predicate)(signals)
    }
}

impl fmt::Debug for CategoryRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CategoryRule")
            .field("name", &self.name)
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

const RULES: [CategoryRule; 5] = [
    CategoryRule {
        name: "thermal",
        category: Category::Thermal,
        predicate: |s| {
            s.network_bad
                && (s.get(Feature::CpuTemp) > CPU_TEMP_HOT
                    || s.get(Feature::CpuLoad) > CPU_LOAD_HIGH)
        },
    },
    CategoryRule {
        name: "motion_induced",
        category: Category::MotionInduced,
        predicate: |s| s.network_bad && s.get(Feature::MotionLevel) > 0.0,
    },
    CategoryRule {
        name: "weak_signal",
        category: Category::WeakSignal,
        predicate: |s| {
            s.network_bad
                && (s.get(Feature::WifiStrength) < WIFI_WEAK_DBM
                    || s.get(Feature::PingJitter) > JITTER_SEVERE_MS
                    || s.jitter_ratio > JITTER_RATIO_WEAK)
        },
    },
    CategoryRule {
        name: "unknown_network_issue",
        category: Category::UnknownNetworkIssue,
        predicate: |s| {
            (s.get(Feature::PingJitter) > JITTER_SEVERE_MS
                || s.jitter_ratio > JITTER_RATIO_UNEXPLAINED)
                && s.get(Feature::CpuTemp) <= CPU_TEMP_HOT
                && s.get(Feature::WifiStrength) >= WIFI_WEAK_DBM
        },
    },
    CategoryRule {
        name: "system_load",
        category: Category::SystemLoad,
        predicate: |s| s.network_bad && s.get(Feature::CpuLoad) > CPU_LOAD_SATURATED,
    },
];

/// Deterministic, first-match-wins rule engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoryEngine;

impl CategoryEngine {
    pub fn new() -> Self {
        Self
    }

    /// The rules in evaluation order.
    pub fn rules(&self) -> &'static [CategoryRule] {
        &RULES
    }

    /// Categorises a sample. Non-anomalous samples are always `Normal`.
    pub fn categorize(&self, vector: &FeatureVector, is_anomaly: bool) -> Category {
        if !is_anomaly {
            return Category::Normal;
        }
        self.evaluate(vector)
    }

    /// Runs the rule list regardless of the anomaly flag. Falls through to
    /// `Normal` when nothing matches, which can happen for flagged samples.
    pub fn evaluate(&self, vector: &FeatureVector) -> Category {
        let signals = Signals::derive(vector);
        RULES
            .iter()
            .find(|rule| rule.is_match(&signals))
            .map(|rule| rule.category)
            .unwrap_or(Category::Normal)
    }
}
