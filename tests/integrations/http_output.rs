//! Integration tests for the HTTP telemetry output.

use chrono::Utc;
use pulsewatch::category::Category;
use pulsewatch::core::{Output, SampleRecord};
use pulsewatch::features::FeatureVector;
use pulsewatch::outputs::HttpOutput;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn record() -> SampleRecord {
    SampleRecord {
        timestamp: Utc::now(),
        is_anomaly: true,
        category: Category::MotionInduced,
        feature_vector: FeatureVector::default(),
    }
}

#[tokio::test]
async fn test_record_is_posted_as_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .and(body_partial_json(serde_json::json!({
            "is_anomaly": true,
            "category": "Motion-Induced",
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let output = HttpOutput::new(format!("{}/ingest", server.uri()), Duration::from_secs(5)).unwrap();
    output.send_record(&record()).await.unwrap();
}

#[tokio::test]
async fn test_server_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let output = HttpOutput::new(format!("{}/ingest", server.uri()), Duration::from_secs(5)).unwrap();
    let err = output.send_record(&record()).await.unwrap_err();
    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn test_slow_store_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let output =
        HttpOutput::new(format!("{}/ingest", server.uri()), Duration::from_millis(200)).unwrap();
    assert!(output.send_record(&record()).await.is_err());
}
