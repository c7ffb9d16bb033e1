// Log store port - Append-only record of accepted readings
use crate::application::error::PersistenceError;
use crate::domain::reading::LogRecord;
use async_trait::async_trait;

#[async_trait]
pub trait LogStore: Send + Sync {
    /// Durably append one record. Concurrent appends never interleave.
    async fn append(&self, record: &LogRecord) -> Result<(), PersistenceError>;

    /// The newest `limit` records, oldest first. Never returns a partially
    /// written record.
    async fn read_recent(&self, limit: usize) -> Result<Vec<LogRecord>, PersistenceError>;

    /// Raw export of the whole log in its line format.
    async fn export(&self) -> Result<Option<String>, PersistenceError>;
}
