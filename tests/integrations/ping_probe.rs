//! Integration tests for the ping probe against stand-in executables.
#![cfg(unix)]

use pulsewatch::core::{NetworkMeasurement, NetworkProbe};
use pulsewatch::probes::PingProbe;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn probe(program: &Path, deadline: Duration) -> PingProbe {
    PingProbe::new(program.display().to_string(), Duration::from_secs(1), deadline)
}

#[tokio::test]
async fn test_replies_are_summarised() {
    let dir = TempDir::new().unwrap();
    let script = write_script(
        dir.path(),
        "fake-ping",
        r#"echo "PING $5 ($5) 56(84) bytes of data."
echo "64 bytes from $5: icmp_seq=1 ttl=64 time=10.0 ms"
echo "64 bytes from $5: icmp_seq=2 ttl=64 time=30.0 ms"
exit 1"#,
    );

    let m = probe(&script, Duration::from_secs(5)).measure("192.0.2.1", 4).await;

    assert_eq!(m.avg_latency_ms, Some(20.0));
    assert_eq!(m.jitter_ms, Some(10.0));
    assert_eq!(m.loss_percent, 50.0);
}

#[tokio::test]
async fn test_hung_probe_is_cut_off_at_the_deadline() {
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "hung-ping", "sleep 10");

    // One request: the deadline is one reply wait plus slack.
    let started = Instant::now();
    let m = probe(&script, Duration::from_millis(200)).measure("192.0.2.1", 1).await;

    assert_eq!(m, NetworkMeasurement::unreachable());
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn test_short_deadline_is_stretched_to_the_request_count() {
    let dir = TempDir::new().unwrap();
    let script = write_script(
        dir.path(),
        "slow-ping",
        r#"sleep 1
echo "64 bytes from $5: icmp_seq=1 ttl=64 time=12.0 ms"
echo "64 bytes from $5: icmp_seq=2 ttl=64 time=12.0 ms"
echo "64 bytes from $5: icmp_seq=3 ttl=64 time=12.0 ms""#,
    );

    let m = probe(&script, Duration::from_millis(200)).measure("192.0.2.1", 3).await;

    assert_eq!(m.avg_latency_ms, Some(12.0));
    assert_eq!(m.loss_percent, 0.0);
}

#[tokio::test]
async fn test_silent_probe_is_unreachable() {
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "silent-ping", "echo 'Request timeout'\nexit 1");

    let m = probe(&script, Duration::from_secs(5)).measure("192.0.2.1", 3).await;
    assert_eq!(m, NetworkMeasurement::unreachable());
}
