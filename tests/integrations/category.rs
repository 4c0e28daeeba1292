//! Integration tests for root-cause categorisation.

use pulsewatch::category::{Category, CategoryEngine};
use pulsewatch::features::{Feature, FeatureVector};

fn vector(
    ping_avg: f64,
    packet_loss: f64,
    ping_jitter: f64,
    cpu_temp: f64,
    cpu_load: f64,
    motion_level: f64,
    wifi_strength: f64,
) -> FeatureVector {
    let mut v = FeatureVector::default();
    v.set(Feature::PingAvg, ping_avg);
    v.set(Feature::PacketLoss, packet_loss);
    v.set(Feature::PingJitter, ping_jitter);
    v.set(Feature::CpuTemp, cpu_temp);
    v.set(Feature::CpuLoad, cpu_load);
    v.set(Feature::MotionLevel, motion_level);
    v.set(Feature::WifiStrength, wifi_strength);
    v
}

#[test]
fn test_high_latency_on_hot_cpu_is_thermal() {
    let v = vector(150.0, 0.0, 10.0, 70.0, 5.0, 0.0, -50.0);
    assert_eq!(CategoryEngine::new().categorize(&v, true), Category::Thermal);
}

#[test]
fn test_jitter_with_motion_is_motion_induced() {
    let v = vector(50.0, 0.0, 35.0, 60.0, 2.0, 3.0, -50.0);
    assert_eq!(CategoryEngine::new().categorize(&v, true), Category::MotionInduced);
}

#[test]
fn test_high_latency_on_weak_radio_is_weak_signal() {
    let v = vector(110.0, 0.0, 5.0, 50.0, 1.0, 0.0, -80.0);
    assert_eq!(CategoryEngine::new().categorize(&v, true), Category::WeakSignal);
}

#[test]
fn test_non_anomalous_sample_is_normal() {
    let engine = CategoryEngine::new();
    let v = vector(40.0, 0.0, 3.0, 50.0, 1.0, 0.0, -50.0);
    assert_eq!(engine.categorize(&v, false), Category::Normal);

    // Even a vector that would match a rule stays Normal when not flagged.
    let hot = vector(150.0, 0.0, 10.0, 70.0, 5.0, 0.0, -50.0);
    assert_eq!(engine.categorize(&hot, false), Category::Normal);
}

#[test]
fn test_thermal_takes_priority_over_motion() {
    let v = vector(150.0, 0.0, 10.0, 70.0, 1.0, 5.0, -50.0);
    assert_eq!(CategoryEngine::new().categorize(&v, true), Category::Thermal);
}

#[test]
fn test_high_jitter_ratio_on_healthy_link_is_unknown_network_issue() {
    // network_bad is false (20ms, no loss, 15ms jitter), but 15/20 > 0.6.
    let v = vector(20.0, 0.0, 15.0, 50.0, 1.0, 0.0, -50.0);
    assert_eq!(
        CategoryEngine::new().categorize(&v, true),
        Category::UnknownNetworkIssue
    );
}

#[test]
fn test_unknown_network_issue_needs_cool_cpu_and_strong_signal() {
    let engine = CategoryEngine::new();
    let hot = vector(20.0, 0.0, 15.0, 70.0, 1.0, 0.0, -50.0);
    assert_eq!(engine.categorize(&hot, true), Category::Normal);
    let weak = vector(20.0, 0.0, 15.0, 50.0, 1.0, 0.0, -75.0);
    assert_eq!(engine.categorize(&weak, true), Category::Normal);
}

#[test]
fn test_saturated_cpu_is_reported_as_thermal() {
    // cpu_load > 8 always satisfies the earlier cpu_load > 6 thermal rule.
    let v = vector(150.0, 0.0, 10.0, 50.0, 9.0, 0.0, -50.0);
    assert_eq!(CategoryEngine::new().categorize(&v, true), Category::Thermal);
}

#[test]
fn test_flagged_sample_without_matching_rule_is_normal() {
    let v = vector(40.0, 0.0, 3.0, 50.0, 1.0, 0.0, -50.0);
    assert_eq!(CategoryEngine::new().categorize(&v, true), Category::Normal);
}

#[test]
fn test_categorisation_is_deterministic() {
    let engine = CategoryEngine::new();
    let vectors = [
        vector(150.0, 0.0, 10.0, 70.0, 5.0, 0.0, -50.0),
        vector(50.0, 0.0, 35.0, 60.0, 2.0, 3.0, -50.0),
        vector(110.0, 0.0, 5.0, 50.0, 1.0, 0.0, -80.0),
        vector(0.0, 100.0, 0.0, 0.0, 0.0, 0.0, 0.0),
    ];
    for v in &vectors {
        let first = engine.categorize(v, true);
        for _ in 0..10 {
            assert_eq!(engine.categorize(v, true), first);
        }
    }
}
