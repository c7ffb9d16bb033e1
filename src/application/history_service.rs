// History service - Reading log and hourly aggregates for trend rendering
use crate::application::error::PersistenceError;
use crate::application::log_store::LogStore;
use crate::application::snapshot_store::AggregateStore;
use crate::domain::aggregate::{AggregateCache, BucketEntry, TrendSeries};
use crate::domain::reading::{LogRecord, Reading};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const CSV_HEADER: &str = "Timestamp,Temperature (°C),Status\n";

#[derive(Clone)]
pub struct HistoryService {
    log: Arc<dyn LogStore>,
    aggregates: Arc<Mutex<AggregateCache>>,
    aggregate_store: Arc<dyn AggregateStore>,
}

impl HistoryService {
    pub async fn load(
        log: Arc<dyn LogStore>,
        aggregate_store: Arc<dyn AggregateStore>,
        retention_hours: usize,
    ) -> Self {
        let entries = aggregate_store.load().await;
        let cache = AggregateCache::from_entries(entries, retention_hours);
        if cache.is_empty() {
            tracing::info!("No persisted aggregates, starting with an empty cache");
        } else {
            tracing::debug!(buckets = cache.len(), "Loaded aggregate cache");
        }

        Self {
            log,
            aggregates: Arc::new(Mutex::new(cache)),
            aggregate_store,
        }
    }

    /// Append the reading to the log and fold it into the hourly aggregates.
    ///
    /// The aggregate update happens even if the log append fails; the append
    /// error is returned to the caller.
    pub async fn record(
        &self,
        reading: &Reading,
        source_tag: Option<String>,
    ) -> Result<(), PersistenceError> {
        let record = LogRecord::from_reading(reading, source_tag);
        let (appended, ()) = futures::join!(self.log.append(&record), self.update_aggregates(reading));

        if let Err(e) = &appended {
            tracing::error!(error = %e, value = reading.value, "Failed to append reading to log");
        }
        appended
    }

    async fn update_aggregates(&self, reading: &Reading) {
        let mut cache = self.aggregates.lock().await;
        cache.update(reading.value, reading.status, &reading.timestamp);

        // Saved under the lock so snapshots reach storage in update order
        if let Err(e) = self.aggregate_store.save(&cache.snapshot()).await {
            tracing::warn!(error = %e, "Failed to persist aggregate cache");
        }
    }

    pub async fn recent(&self, limit: usize) -> Result<Vec<LogRecord>, PersistenceError> {
        self.log.read_recent(limit).await
    }

    pub async fn aggregates(&self) -> Vec<BucketEntry> {
        self.aggregates.lock().await.snapshot()
    }

    pub async fn trend(&self) -> TrendSeries {
        let snapshot = self.aggregates().await;
        TrendSeries::from_entries(&snapshot)
    }

    /// CSV export of the full log, `None` when nothing has been logged yet.
    pub async fn export_csv(&self) -> Result<Option<String>, PersistenceError> {
        Ok(self
            .log
            .export()
            .await?
            .map(|lines| format!("{}{}", CSV_HEADER, lines)))
    }
}
