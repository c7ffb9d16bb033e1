// In-memory collaborators for service tests
use crate::application::error::{FetchError, PersistenceError};
use crate::application::log_store::LogStore;
use crate::application::notifier::Notifier;
use crate::application::sensor::{SensorReader, SensorReading};
use crate::application::snapshot_store::{AggregateStore, AlertStateStore};
use crate::domain::aggregate::BucketEntry;
use crate::domain::alert::AlertState;
use crate::domain::reading::LogRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub subject: String,
    pub body: String,
    pub recipients: Vec<String>,
}

pub struct RecordingNotifier {
    succeed: AtomicBool,
    attempts: AtomicUsize,
    sent: Mutex<Vec<SentMessage>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            succeed: AtomicBool::new(true),
            attempts: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        let notifier = Self::new();
        notifier.set_succeed(false);
        notifier
    }

    pub fn set_succeed(&self, succeed: bool) {
        self.succeed.store(succeed, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, subject: &str, body: &str, recipients: &[String]) -> bool {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if !self.succeed.load(Ordering::SeqCst) {
            return false;
        }
        self.sent.lock().unwrap().push(SentMessage {
            subject: subject.to_string(),
            body: body.to_string(),
            recipients: recipients.to_vec(),
        });
        true
    }

    fn describe(&self) -> String {
        "recording".to_string()
    }
}

/// Replays scripted values; an exhausted script fails the fetch.
#[derive(Default)]
pub struct ScriptedSensor {
    script: Mutex<VecDeque<Result<SensorReading, String>>>,
}

impl ScriptedSensor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, value: f64, timestamp: DateTime<Utc>) {
        self.script
            .lock()
            .unwrap()
            .push_back(Ok(SensorReading { value, timestamp }));
    }

    pub fn push_failure(&self, reason: &str) {
        self.script.lock().unwrap().push_back(Err(reason.to_string()));
    }
}

#[async_trait]
impl SensorReader for ScriptedSensor {
    async fn fetch_reading(&self) -> Result<SensorReading, FetchError> {
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(reading)) => Ok(reading),
            Some(Err(reason)) => Err(FetchError::Payload(reason)),
            None => Err(FetchError::Payload("script exhausted".to_string())),
        }
    }

    fn describe(&self) -> String {
        "https://sensor.test".to_string()
    }
}

/// Never answers, for timeout tests.
pub struct HangingSensor;

#[async_trait]
impl SensorReader for HangingSensor {
    async fn fetch_reading(&self) -> Result<SensorReading, FetchError> {
        std::future::pending().await
    }

    fn describe(&self) -> String {
        "https://hanging.test".to_string()
    }
}

#[derive(Default)]
pub struct MemoryLogStore {
    records: Mutex<Vec<LogRecord>>,
    fail: AtomicBool,
}

impl MemoryLogStore {
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap().clone()
    }
}

fn storage_down() -> PersistenceError {
    PersistenceError::Io(std::io::Error::other("storage unavailable"))
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn append(&self, record: &LogRecord) -> Result<(), PersistenceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(storage_down());
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn read_recent(&self, limit: usize) -> Result<Vec<LogRecord>, PersistenceError> {
        let records = self.records.lock().unwrap();
        let start = records.len().saturating_sub(limit);
        Ok(records[start..].to_vec())
    }

    async fn export(&self) -> Result<Option<String>, PersistenceError> {
        let records = self.records.lock().unwrap();
        if records.is_empty() {
            return Ok(None);
        }
        Ok(Some(records.iter().map(LogRecord::to_line).collect()))
    }
}

#[derive(Default)]
pub struct MemoryStateStore {
    state: Mutex<Option<AlertState>>,
    saves: AtomicUsize,
}

impl MemoryStateStore {
    pub fn with_state(state: AlertState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn stored(&self) -> Option<AlertState> {
        self.state.lock().unwrap().clone()
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AlertStateStore for MemoryStateStore {
    async fn load(&self) -> AlertState {
        self.state.lock().unwrap().clone().unwrap_or_default()
    }

    async fn save(&self, state: &AlertState) -> Result<(), PersistenceError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.state.lock().unwrap() = Some(state.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryAggregateStore {
    entries: Mutex<Vec<BucketEntry>>,
}

impl MemoryAggregateStore {
    pub fn stored(&self) -> Vec<BucketEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl AggregateStore for MemoryAggregateStore {
    async fn load(&self) -> Vec<BucketEntry> {
        self.stored()
    }

    async fn save(&self, entries: &[BucketEntry]) -> Result<(), PersistenceError> {
        *self.entries.lock().unwrap() = entries.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_fakes_start_empty_and_succeed() {
        let notifier = RecordingNotifier::default();
        assert!(notifier.deliver("s", "b", &["ops@example.com".to_string()]).await);
        assert_eq!(notifier.attempts(), 1);

        let sensor = ScriptedSensor::default();
        assert!(sensor.fetch_reading().await.is_err());
    }
}
