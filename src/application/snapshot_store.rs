// Snapshot store ports - Whole-value persistence of alert state and aggregates
use crate::application::error::PersistenceError;
use crate::domain::aggregate::BucketEntry;
use crate::domain::alert::AlertState;
use async_trait::async_trait;

#[async_trait]
pub trait AlertStateStore: Send + Sync {
    /// Absent or unreadable state loads as the default state.
    async fn load(&self) -> AlertState;

    async fn save(&self, state: &AlertState) -> Result<(), PersistenceError>;
}

#[async_trait]
pub trait AggregateStore: Send + Sync {
    /// Absent or unreadable snapshots load as empty.
    async fn load(&self) -> Vec<BucketEntry>;

    async fn save(&self, entries: &[BucketEntry]) -> Result<(), PersistenceError>;
}
