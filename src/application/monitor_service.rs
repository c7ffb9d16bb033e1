// Monitor service - One poll: fetch, classify, then record and alert side by side
use crate::application::alert_service::{AlertOutcome, AlertService, DigestOutcome};
use crate::application::error::FetchError;
use crate::application::history_service::HistoryService;
use crate::application::messages::{reading_message, test_message, MessageKind, MonitorIdentity};
use crate::application::notifier::Notifier;
use crate::application::sensor::SensorReader;
use crate::domain::alert::AlertState;
use crate::domain::reading::Reading;
use crate::domain::severity::Thresholds;
use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    pub thresholds: Thresholds,
    pub fetch_timeout: Duration,
    pub utc_offset: FixedOffset,
    /// Whether scheduled polls also send the hourly digest.
    pub hourly_digest: bool,
}

/// Result of processing one accepted reading.
#[derive(Debug, Clone, Serialize)]
pub struct PollReport {
    pub reading: Reading,
    pub logged: bool,
    pub alert: AlertOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<DigestOutcome>,
}

/// A reading that was logged without going through alerting.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RecordedReading {
    pub reading: Reading,
    pub logged: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ReportOutcome {
    pub reading: Reading,
    pub logged: bool,
    pub delivered: bool,
}

#[derive(Clone)]
pub struct MonitorService {
    sensor: Arc<dyn SensorReader>,
    notifier: Arc<dyn Notifier>,
    alerts: AlertService,
    history: HistoryService,
    latest: Arc<RwLock<Option<Reading>>>,
    settings: MonitorSettings,
    identity: Arc<MonitorIdentity>,
}

impl MonitorService {
    pub fn new(
        sensor: Arc<dyn SensorReader>,
        notifier: Arc<dyn Notifier>,
        alerts: AlertService,
        history: HistoryService,
        settings: MonitorSettings,
        identity: MonitorIdentity,
    ) -> Self {
        Self {
            sensor,
            notifier,
            alerts,
            history,
            latest: Arc::new(RwLock::new(None)),
            settings,
            identity: Arc::new(identity),
        }
    }

    /// Fetch and classify a fresh reading, bounded by the fetch timeout.
    pub async fn fetch(&self) -> Result<Reading, FetchError> {
        let raw = tokio::time::timeout(self.settings.fetch_timeout, self.sensor.fetch_reading())
            .await
            .map_err(|_| FetchError::Timeout(self.settings.fetch_timeout))??;

        if !raw.value.is_finite() {
            return Err(FetchError::Payload(format!("non-finite value {}", raw.value)));
        }
        Ok(self.classify(raw.value, raw.timestamp))
    }

    fn classify(&self, value: f64, at: DateTime<Utc>) -> Reading {
        Reading::new(
            at.with_timezone(&self.settings.utc_offset),
            value,
            self.settings.thresholds.classify(value),
        )
    }

    /// Scheduled poll. A failed fetch short-circuits everything else.
    pub async fn poll(&self) -> Result<PollReport, FetchError> {
        let reading = self.fetch().await?;
        Ok(self.process(reading, self.settings.hourly_digest).await)
    }

    /// Poll now and send the hourly digest if it has not gone out this hour.
    pub async fn send_digest_now(&self) -> Result<PollReport, FetchError> {
        let reading = self.fetch().await?;
        Ok(self.process(reading, true).await)
    }

    /// Log a reading pushed by a remote client.
    ///
    /// Pushed values are unauthenticated, so they only reach the log and the
    /// hourly aggregates. Alert state and the latest reading stay owned by polls.
    pub async fn ingest(&self, value: f64, at: DateTime<Utc>, source: Option<String>) -> RecordedReading {
        let reading = self.classify(value, at);
        let logged = self.history.record(&reading, source).await.is_ok();
        RecordedReading { reading, logged }
    }

    async fn process(&self, reading: Reading, digest: bool) -> PollReport {
        *self.latest.write().await = Some(reading);

        // Logging and alerting are independent consumers of the same reading
        let (logged, alert) = futures::join!(
            self.history.record(&reading, None),
            self.alerts.evaluate(&reading)
        );

        let digest = if digest {
            Some(self.alerts.send_hourly_digest(&reading).await)
        } else {
            None
        };

        tracing::debug!(
            value = reading.value,
            status = %reading.status,
            logged = logged.is_ok(),
            "Processed reading"
        );

        PollReport {
            reading,
            logged: logged.is_ok(),
            alert,
            digest,
        }
    }

    /// Ungated report for a fresh reading.
    pub async fn send_report(&self) -> Result<ReportOutcome, FetchError> {
        let reading = self.fetch().await?;
        *self.latest.write().await = Some(reading);

        let message = reading_message(MessageKind::Report, &reading, &self.identity.host);
        // Report readings are still part of the history
        let (logged, delivered) = futures::join!(
            self.history.record(&reading, None),
            self.notifier
                .deliver(&message.subject, &message.body, &self.identity.recipients)
        );
        Ok(ReportOutcome {
            reading,
            logged: logged.is_ok(),
            delivered,
        })
    }

    pub async fn send_test_notification(&self) -> bool {
        let now = Utc::now().with_timezone(&self.settings.utc_offset);
        let message = test_message(&self.identity, &now);
        self.notifier
            .deliver(&message.subject, &message.body, &self.identity.recipients)
            .await
    }

    pub async fn current(&self) -> Option<Reading> {
        *self.latest.read().await
    }

    pub async fn alert_state(&self) -> AlertState {
        self.alerts.snapshot().await
    }

    pub fn history(&self) -> &HistoryService {
        &self.history
    }

    pub fn identity(&self) -> &MonitorIdentity {
        &self.identity
    }
}
