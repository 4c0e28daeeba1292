//! Integration tests for application startup, publishing and shutdown.

use anyhow::Result;
use pulsewatch::category::Category;
use pulsewatch::config::Config;
use pulsewatch::core::Output;
use pulsewatch::{app::AppBuilder, internal_metrics::Metrics};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[path = "../helpers/mod.rs"]
mod helpers;

use helpers::artifact::{latency_artifact, write_artifact};
use helpers::mock_output::{CollectingOutput, FailingOutput};
use helpers::mock_probes::{measurement, ScriptedNetwork, ScriptedSensorLink};
use helpers::test_app::TestAppBuilder;

#[tokio::test]
async fn test_app_publishes_records_until_shutdown() -> Result<()> {
    let output = CollectingOutput::new();
    let test_app = TestAppBuilder::new()
        .with_outputs(vec![Arc::new(output.clone())])
        .start()
        .await?;

    output.wait_for_count(2, Duration::from_secs(5)).await;
    test_app.shutdown(Duration::from_secs(5)).await?;

    let records = output.records();
    assert!(records.len() >= 2);
    assert!(records.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    assert!(records.iter().all(|r| !r.is_anomaly && r.category == Category::Normal));
    Ok(())
}

#[tokio::test]
async fn test_anomalies_reach_the_outputs_with_a_category() -> Result<()> {
    let output = CollectingOutput::new();
    let test_app = TestAppBuilder::new()
        .with_network(Box::new(ScriptedNetwork::new(vec![measurement(150.0, 0.0, 10.0)])))
        .with_outputs(vec![Arc::new(output.clone())])
        .start()
        .await?;

    output.wait_for_count(1, Duration::from_secs(5)).await;
    test_app.shutdown(Duration::from_secs(5)).await?;

    // 150ms on a cool, idle host with a strong signal and no motion matches
    // no rule, so the flagged sample falls through to Normal.
    let record = &output.records()[0];
    assert!(record.is_anomaly);
    assert_eq!(record.category, Category::Normal);
    Ok(())
}

#[tokio::test]
async fn test_failing_output_does_not_stop_the_loop() -> Result<()> {
    let failing = FailingOutput::new();
    let healthy = CollectingOutput::new();
    let outputs: Vec<Arc<dyn Output>> = vec![Arc::new(failing.clone()), Arc::new(healthy.clone())];
    let test_app = TestAppBuilder::new().with_outputs(outputs).start().await?;

    healthy.wait_for_count(2, Duration::from_secs(5)).await;
    test_app.shutdown(Duration::from_secs(5)).await?;

    assert!(failing.attempts() >= 2);
    Ok(())
}

#[tokio::test]
async fn test_shutdown_releases_the_sensor_link() -> Result<()> {
    let link = ScriptedSensorLink::idle();
    let dropped = link.dropped.clone();
    let output = CollectingOutput::new();
    let test_app = TestAppBuilder::new()
        .with_sensor_link(Box::new(link))
        .with_outputs(vec![Arc::new(output.clone())])
        .start()
        .await?;

    output.wait_for_count(1, Duration::from_secs(5)).await;
    test_app.shutdown(Duration::from_secs(5)).await?;

    assert!(dropped.load(std::sync::atomic::Ordering::SeqCst));
    Ok(())
}

#[tokio::test]
async fn test_run_once_delivers_a_single_record() -> Result<()> {
    let output = CollectingOutput::new();
    let record = TestAppBuilder::new()
        .with_outputs(vec![Arc::new(output.clone())])
        .app_builder()
        .run_once()
        .await?;

    assert_eq!(output.records(), vec![record]);
    Ok(())
}

#[tokio::test]
async fn test_startup_fails_without_an_artifact_path() {
    let mut config = Config::default();
    config.classifier.artifact_path = None;
    let (_tx, rx) = watch::channel(false);

    let result = AppBuilder::new(config)
        .metrics_override(Metrics::new_for_test())
        .build(rx)
        .await;

    let err = result.err().expect("startup must fail");
    assert!(err.to_string().contains("artifact_path"));
}

#[tokio::test]
async fn test_startup_fails_with_an_invalid_artifact() {
    let mut value = latency_artifact(100.0);
    value["feature_names"][3] = serde_json::json!("pressure");
    let file = write_artifact(&value);

    let mut config = Config::default();
    config.classifier.artifact_path = Some(file.path().to_path_buf());
    let (_tx, rx) = watch::channel(false);

    let result = AppBuilder::new(config)
        .metrics_override(Metrics::new_for_test())
        .build(rx)
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_startup_fails_when_required_sensor_link_is_missing() {
    let file = write_artifact(&latency_artifact(100.0));
    let mut config = Config::default();
    config.classifier.artifact_path = Some(file.path().to_path_buf());
    config.sensor_link.device_path = "/nonexistent/ttyACM9".into();
    config.sensor_link.required = true;
    let (_tx, rx) = watch::channel(false);

    let result = AppBuilder::new(config)
        .metrics_override(Metrics::new_for_test())
        .build(rx)
        .await;

    let err = result.err().expect("startup must fail");
    assert!(format!("{:#}", err).contains("sensor link"));
}

#[tokio::test]
async fn test_optional_sensor_link_degrades_to_absent_fields() -> Result<()> {
    let output = CollectingOutput::new();

    let record = TestAppBuilder::new()
        .with_config_modifier(|config| {
            config.sensor_link.device_path = "/nonexistent/ttyACM9".into();
            config.sensor_link.required = false;
        })
        .with_outputs(vec![Arc::new(output.clone())])
        .with_configured_sensor_link()
        .app_builder()
        .run_once()
        .await?;

    assert_eq!(record.feature_vector[pulsewatch::features::Feature::Humidity], 0.0);
    assert_eq!(output.count(), 1);
    Ok(())
}
