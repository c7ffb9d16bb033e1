// Sensor port - Where raw temperature values come from
use crate::application::error::FetchError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait SensorReader: Send + Sync {
    /// Fetch one corrected temperature value.
    async fn fetch_reading(&self) -> Result<SensorReading, FetchError>;

    /// Human-readable identity of the sensor, used in notifications.
    fn describe(&self) -> String;
}
