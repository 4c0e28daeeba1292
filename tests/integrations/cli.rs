use anyhow::Result;
use assert_cmd::prelude::*;
use std::process::Command;

#[path = "../helpers/mod.rs"]
mod helpers;

use helpers::artifact::{latency_artifact, write_artifact};

fn pulsewatch_bin() -> Result<Command> {
    let mut cmd = Command::cargo_bin("pulsewatch")?;
    // Keep a stray pulsewatch.toml in the working directory out of the test.
    cmd.arg("--config").arg("/nonexistent/pulsewatch.toml");
    cmd.env_remove("RUST_LOG");
    Ok(cmd)
}

#[test]
fn test_check_artifact_accepts_a_valid_artifact() -> Result<()> {
    let file = write_artifact(&latency_artifact(100.0));

    pulsewatch_bin()?
        .arg("--check-artifact")
        .arg("--artifact")
        .arg(file.path())
        .assert()
        .success()
        .stderr(predicates::str::contains("Classifier artifact is valid"));
    Ok(())
}

#[test]
fn test_check_artifact_rejects_reordered_features() -> Result<()> {
    let mut value = latency_artifact(100.0);
    value["feature_names"][14] = serde_json::json!("ping_jitter");
    value["feature_names"][15] = serde_json::json!("ping_avg");
    let file = write_artifact(&value);

    pulsewatch_bin()?
        .arg("--check-artifact")
        .arg("--artifact")
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicates::str::contains("feature order mismatch"));
    Ok(())
}

#[test]
fn test_startup_fails_without_an_artifact() -> Result<()> {
    pulsewatch_bin()?
        .arg("--once")
        .assert()
        .failure()
        .stderr(predicates::str::contains("artifact_path is required"));
    Ok(())
}

#[test]
fn test_invalid_environment_value_fails_configuration() -> Result<()> {
    pulsewatch_bin()?
        .env("PULSEWATCH_SAMPLING__INTERVAL_SECONDS", "soon")
        .arg("--check-artifact")
        .assert()
        .failure()
        .stderr(predicates::str::contains("Failed to load configuration"));
    Ok(())
}
