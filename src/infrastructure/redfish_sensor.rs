// Redfish sensor - Chassis thermal readings from an iDRAC over HTTPS
use crate::application::error::FetchError;
use crate::application::sensor::{SensorReader, SensorReading};
use crate::infrastructure::config::SensorSettings;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::time::Duration;

const USER_AGENT: &str = "iDRAC-Monitor/2.0";

#[derive(Debug, Deserialize)]
struct ThermalResponse {
    #[serde(rename = "Temperatures", default)]
    temperatures: Vec<TemperatureSensor>,
}

#[derive(Debug, Deserialize)]
struct TemperatureSensor {
    #[serde(rename = "ReadingCelsius", default)]
    reading_celsius: Option<f64>,
}

pub struct RedfishSensor {
    client: reqwest::Client,
    url: String,
    username: String,
    password: String,
    correction: f64,
    valid_min: f64,
    valid_max: f64,
}

impl RedfishSensor {
    pub fn new(settings: &SensorSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .build()?;

        Ok(Self {
            client,
            url: format!(
                "{}{}",
                settings.base_url.trim_end_matches('/'),
                settings.thermal_path
            ),
            username: settings.username.clone(),
            password: settings.password.clone(),
            correction: settings.correction,
            valid_min: settings.valid_min,
            valid_max: settings.valid_max,
        })
    }

    /// Host part of the controller URL, used to label notifications.
    pub fn host_label(&self) -> String {
        reqwest::Url::parse(&self.url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| self.url.clone())
    }

    /// First corrected value inside the plausible range, in sensor order.
    fn select_reading(&self, payload: &ThermalResponse) -> Result<f64, FetchError> {
        payload
            .temperatures
            .iter()
            .filter_map(|sensor| sensor.reading_celsius)
            .map(|raw| raw + self.correction)
            .find(|value| value.is_finite() && *value >= self.valid_min && *value <= self.valid_max)
            .ok_or(FetchError::NoValidReading {
                min: self.valid_min,
                max: self.valid_max,
            })
    }
}

#[async_trait]
impl SensorReader for RedfishSensor {
    async fn fetch_reading(&self) -> Result<SensorReading, FetchError> {
        tracing::debug!(url = %self.url, "Fetching thermal data");
        let response = self
            .client
            .get(&self.url)
            .basic_auth(&self.username, Some(&self.password))
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let body = response.bytes().await?;
        let payload: ThermalResponse = serde_json::from_slice(&body)
            .map_err(|e| FetchError::Payload(e.to_string()))?;
        let value = self.select_reading(&payload)?;

        Ok(SensorReading {
            value,
            timestamp: Utc::now(),
        })
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
