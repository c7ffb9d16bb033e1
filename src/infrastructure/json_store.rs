// JSON snapshot stores - Alert state and hourly aggregates as whole-file JSON
use crate::application::error::PersistenceError;
use crate::application::snapshot_store::{AggregateStore, AlertStateStore};
use crate::domain::aggregate::BucketEntry;
use crate::domain::alert::AlertState;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Missing or unreadable files load as the default value.
async fn load_or_default<T: DeserializeOwned + Default>(path: &Path, what: &str) -> T {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return T::default(),
        Err(e) => {
            tracing::warn!(error = %e, path = %path.display(), "Could not read {}, starting fresh", what);
            return T::default();
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, path = %path.display(), "Corrupt {}, starting fresh", what);
            T::default()
        }
    }
}

/// Replace the file through a sibling temp file so readers never see a torn write.
async fn write_atomically<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    let json = serde_json::to_vec_pretty(value)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, &json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AlertStateStore for JsonStateStore {
    async fn load(&self) -> AlertState {
        load_or_default(&self.path, "alert state").await
    }

    async fn save(&self, state: &AlertState) -> Result<(), PersistenceError> {
        write_atomically(&self.path, state).await
    }
}

pub struct JsonAggregateStore {
    path: PathBuf,
}

impl JsonAggregateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AggregateStore for JsonAggregateStore {
    async fn load(&self) -> Vec<BucketEntry> {
        load_or_default(&self.path, "aggregate cache").await
    }

    async fn save(&self, entries: &[BucketEntry]) -> Result<(), PersistenceError> {
        write_atomically(&self.path, entries).await
    }
}
