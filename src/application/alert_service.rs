// Alert service - Serialized decide, notify, commit over the persisted alert state
use crate::application::messages::{reading_message, MessageKind};
use crate::application::notifier::Notifier;
use crate::application::snapshot_store::AlertStateStore;
use crate::domain::alert::{decide, digest_decision, AlertDecision, AlertPolicy, AlertState};
use crate::domain::reading::Reading;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// What happened to the alert decision for one reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AlertOutcome {
    pub decision: AlertDecision,
    pub delivered: bool,
}

impl AlertOutcome {
    fn quiet() -> Self {
        Self {
            decision: AlertDecision::None,
            delivered: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DigestOutcome {
    Sent,
    AlreadySentThisHour,
    DeliveryFailed,
}

#[derive(Clone)]
pub struct AlertService {
    state: Arc<Mutex<AlertState>>,
    store: Arc<dyn AlertStateStore>,
    notifier: Arc<dyn Notifier>,
    recipients: Arc<Vec<String>>,
    host: String,
    policy: AlertPolicy,
}

impl AlertService {
    pub async fn load(
        store: Arc<dyn AlertStateStore>,
        notifier: Arc<dyn Notifier>,
        recipients: Vec<String>,
        host: String,
        policy: AlertPolicy,
    ) -> Self {
        let state = store.load().await;
        tracing::debug!(?state, "Loaded alert state");
        Self {
            state: Arc::new(Mutex::new(state)),
            store,
            notifier,
            recipients: Arc::new(recipients),
            host,
            policy,
        }
    }

    /// Run the alert state machine for one classified reading.
    ///
    /// The state lock is held across decide, delivery and commit so that
    /// overlapping polls cannot both fire the same transition.
    pub async fn evaluate(&self, reading: &Reading) -> AlertOutcome {
        let mut state = self.state.lock().await;
        let (mut next, decision) = decide(&state, reading.status, reading.timestamp, &self.policy);

        let outcome = match decision {
            AlertDecision::SendAlert { kind, status } => {
                let held_for = self.policy.persistent_after;
                let message = reading_message(MessageKind::Alert { kind, held_for }, reading, &self.host);
                let delivered = self
                    .notifier
                    .deliver(&message.subject, &message.body, &self.recipients)
                    .await;

                if delivered {
                    next.commit(&decision, reading.timestamp);
                    tracing::info!(%kind, %status, value = reading.value, "Alert sent");
                } else {
                    // Left uncommitted so the next poll retries
                    tracing::warn!(%kind, %status, value = reading.value, "Alert delivery failed");
                }
                AlertOutcome { decision, delivered }
            }
            _ => AlertOutcome::quiet(),
        };

        *state = next;
        self.persist(&state).await;
        outcome
    }

    /// Send the hourly digest for a freshly fetched reading, at most once per clock hour.
    pub async fn send_hourly_digest(&self, reading: &Reading) -> DigestOutcome {
        let mut state = self.state.lock().await;
        let decision = digest_decision(&state, &reading.timestamp);
        if decision == AlertDecision::None {
            return DigestOutcome::AlreadySentThisHour;
        }

        let message = reading_message(MessageKind::HourlyReport, reading, &self.host);
        if !self
            .notifier
            .deliver(&message.subject, &message.body, &self.recipients)
            .await
        {
            tracing::warn!("Hourly digest delivery failed");
            return DigestOutcome::DeliveryFailed;
        }

        state.commit(&decision, reading.timestamp);
        self.persist(&state).await;
        tracing::info!(hour = ?state.last_hourly_digest_hour, "Hourly digest sent");
        DigestOutcome::Sent
    }

    pub async fn snapshot(&self) -> AlertState {
        self.state.lock().await.clone()
    }

    async fn persist(&self, state: &AlertState) {
        if let Err(e) = self.store.save(state).await {
            // In-memory state stays authoritative; the next save catches up
            tracing::error!(error = %e, "Failed to persist alert state");
        }
    }
}
