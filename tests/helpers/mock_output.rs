#![allow(dead_code)]
use async_trait::async_trait;
use pulsewatch::core::{Output, SampleRecord};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;
use tokio::sync::Notify;

/// A mock Output that keeps every record it has received.
#[derive(Clone, Debug, Default)]
pub struct CollectingOutput {
    pub records: Arc<Mutex<Vec<SampleRecord>>>,
    pub notifier: Arc<Notify>,
}

impl CollectingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn records(&self) -> Vec<SampleRecord> {
        self.records.lock().unwrap().clone()
    }

    pub async fn wait_for_count(&self, target_count: usize, timeout_duration: Duration) {
        let wait_future = async {
            loop {
                let notified = self.notifier.notified();
                if self.count() >= target_count {
                    return;
                }
                notified.await;
            }
        };

        tokio::time::timeout(timeout_duration, wait_future)
            .await
            .expect("Timed out waiting for records");
    }
}

#[async_trait]
impl Output for CollectingOutput {
    fn name(&self) -> &str {
        "collecting_mock"
    }

    async fn send_record(&self, record: &SampleRecord) -> anyhow::Result<()> {
        self.records.lock().unwrap().push(record.clone());
        self.notifier.notify_waiters();
        Ok(())
    }
}

/// A mock Output that rejects every record and counts the attempts.
#[derive(Clone, Debug, Default)]
pub struct FailingOutput {
    pub attempts: Arc<AtomicUsize>,
}

impl FailingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Output for FailingOutput {
    fn name(&self) -> &str {
        "failing_mock"
    }

    async fn send_record(&self, _record: &SampleRecord) -> anyhow::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("telemetry store unreachable")
    }
}
