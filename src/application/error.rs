// Error taxonomy for the monitoring pipeline
use std::time::Duration;

/// The sensor produced no usable reading this tick.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("sensor fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("sensor request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("sensor returned HTTP {0}")]
    Status(u16),

    #[error("malformed sensor payload: {0}")]
    Payload(String),

    #[error("no temperature sensor reported a value within {min}..={max}")]
    NoValidReading { min: f64, max: f64 },
}

/// Writing or reading durable state failed.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage encoding error: {0}")]
    Json(#[from] serde_json::Error),
}
