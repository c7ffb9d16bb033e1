// Alert domain model - Deduplicating alert state machine
//
// `decide` is a pure transition over (state, status, now). Callers deliver the
// resulting notification and only then `commit` the delivery fields.
use super::reading::Timestamp;
use super::severity::Severity;
use chrono::{TimeDelta, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timing policy for persistent alerts.
///
/// A persistent alert fires once per entry into a severity, on the first
/// reading taken at least `persistent_after` after the entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertPolicy {
    pub persistent_after: TimeDelta,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            persistent_after: TimeDelta::seconds(300),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    StatusChange,
    PersistentWarning,
    PersistentCritical,
}

impl AlertKind {
    pub fn is_persistent(&self) -> bool {
        !matches!(self, AlertKind::StatusChange)
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AlertKind::StatusChange => "STATUS_CHANGE",
            AlertKind::PersistentWarning => "PERSISTENT_WARNING",
            AlertKind::PersistentCritical => "PERSISTENT_CRITICAL",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AlertDecision {
    None,
    SendAlert { kind: AlertKind, status: Severity },
    SendHourlyDigest,
}

/// Process-wide alert bookkeeping, persisted between runs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertState {
    /// `None` until the first reading; stored as `"UNKNOWN"`.
    #[serde(with = "observed_status")]
    pub last_status: Option<Severity>,
    pub last_alert_status: Option<Severity>,
    pub last_alert_time: Option<Timestamp>,
    pub warning_entered_at: Option<Timestamp>,
    pub critical_entered_at: Option<Timestamp>,
    /// Entry timestamp whose status-change alert was delivered.
    pub alerted_entry: Option<Timestamp>,
    /// Entry timestamp whose persistent alert was delivered.
    pub persistent_alerted_entry: Option<Timestamp>,
    pub last_hourly_digest_hour: Option<u32>,
}

impl AlertState {
    pub fn entered_at(&self, status: Severity) -> Option<Timestamp> {
        match status {
            Severity::Normal => None,
            Severity::Warning => self.warning_entered_at,
            Severity::Critical => self.critical_entered_at,
        }
    }

    fn entered_at_mut(&mut self, status: Severity) -> Option<&mut Option<Timestamp>> {
        match status {
            Severity::Normal => None,
            Severity::Warning => Some(&mut self.warning_entered_at),
            Severity::Critical => Some(&mut self.critical_entered_at),
        }
    }

    /// Record a successful delivery of `decision`.
    pub fn commit(&mut self, decision: &AlertDecision, now: Timestamp) {
        match decision {
            AlertDecision::None => {}
            AlertDecision::SendAlert { kind, status } => {
                self.last_alert_status = Some(*status);
                self.last_alert_time = Some(now);
                if kind.is_persistent() {
                    self.persistent_alerted_entry = self.entered_at(*status);
                } else {
                    self.alerted_entry = self.entered_at(*status);
                }
            }
            AlertDecision::SendHourlyDigest => {
                self.last_hourly_digest_hour = Some(hour_of(&now));
            }
        }
    }
}

/// Pure alert transition. Returns the next state (without delivery fields,
/// see [`AlertState::commit`]) and at most one alert to send.
pub fn decide(
    state: &AlertState,
    status: Severity,
    now: Timestamp,
    policy: &AlertPolicy,
) -> (AlertState, AlertDecision) {
    let mut next = state.clone();
    let mut decision = AlertDecision::None;

    let entering = state.last_status != Some(status);
    if let Some(entered_at) = next.entered_at_mut(status) {
        if entering || entered_at.is_none() {
            *entered_at = Some(now);
        }
    }

    // Each entry into a severity owes one delivered status-change alert
    let unannounced = next.alerted_entry != next.entered_at(status);
    if status.is_abnormal() && (state.last_alert_status != Some(status) || unannounced) {
        decision = AlertDecision::SendAlert {
            kind: AlertKind::StatusChange,
            status,
        };
    } else if let Some(entered) = next.entered_at(status) {
        let held = now - entered;
        if held >= policy.persistent_after && next.persistent_alerted_entry != Some(entered) {
            let kind = if status == Severity::Warning {
                AlertKind::PersistentWarning
            } else {
                AlertKind::PersistentCritical
            };
            decision = AlertDecision::SendAlert { kind, status };
        }
    }

    if status == Severity::Normal {
        next.warning_entered_at = None;
        next.critical_entered_at = None;
    }

    next.last_status = Some(status);
    (next, decision)
}

/// Local hour-of-day (0-23) of an instant.
pub fn hour_of(at: &Timestamp) -> u32 {
    at.hour()
}

/// At most one digest per local clock hour.
pub fn should_send_hourly_digest(state: &AlertState, now: &Timestamp) -> bool {
    state.last_hourly_digest_hour != Some(hour_of(now))
}

pub fn digest_decision(state: &AlertState, now: &Timestamp) -> AlertDecision {
    if should_send_hourly_digest(state, now) {
        AlertDecision::SendHourlyDigest
    } else {
        AlertDecision::None
    }
}

mod observed_status {
    use super::Severity;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    const UNKNOWN: &str = "UNKNOWN";

    pub fn serialize<S: Serializer>(value: &Option<Severity>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(status) => status.serialize(serializer),
            None => serializer.serialize_str(UNKNOWN),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Severity>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.and_then(|s| s.parse().ok()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::severity::Thresholds;
    use chrono::{Duration, FixedOffset, TimeZone};

    fn t0() -> Timestamp {
        FixedOffset::east_opt(8 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 1, 10, 0, 0)
            .unwrap()
    }

    /// Feed a status and commit every alert as if delivery succeeded.
    fn step(state: &mut AlertState, status: Severity, now: Timestamp) -> AlertDecision {
        let (mut next, decision) = decide(state, status, now, &AlertPolicy::default());
        next.commit(&decision, now);
        *state = next;
        decision
    }

    fn status_change(status: Severity) -> AlertDecision {
        AlertDecision::SendAlert {
            kind: AlertKind::StatusChange,
            status,
        }
    }

    #[test]
    fn test_worked_example() {
        let thresholds = Thresholds::new(25.0, 30.0);
        let mut state = AlertState::default();
        let start = t0();

        let d = step(&mut state, thresholds.classify(24.9), start);
        assert_eq!(d, AlertDecision::None);

        let entered = start + Duration::seconds(10);
        let d = step(&mut state, thresholds.classify(25.0), entered);
        assert_eq!(d, status_change(Severity::Warning));
        assert_eq!(state.warning_entered_at, Some(entered));

        let d = step(&mut state, thresholds.classify(25.0), entered + Duration::seconds(30));
        assert_eq!(d, AlertDecision::None);
        assert_eq!(state.last_alert_status, Some(Severity::Warning));

        let d = step(&mut state, thresholds.classify(25.0), entered + Duration::seconds(310));
        assert_eq!(
            d,
            AlertDecision::SendAlert {
                kind: AlertKind::PersistentWarning,
                status: Severity::Warning
            }
        );

        let d = step(&mut state, thresholds.classify(24.0), entered + Duration::seconds(400));
        assert_eq!(d, AlertDecision::None);
        assert_eq!(state.warning_entered_at, None);
        assert_eq!(state.last_status, Some(Severity::Normal));
    }

    #[test]
    fn test_one_status_change_per_run() {
        use Severity::*;
        let sequence = [
            Normal, Warning, Warning, Warning, Critical, Critical, Warning, Warning, Normal,
            Normal, Critical, Critical, Normal, Warning,
        ];
        let mut state = AlertState::default();
        let mut fired = Vec::new();

        for (i, status) in sequence.iter().enumerate() {
            // 10s apart, never reaches the persistent band
            let now = t0() + Duration::seconds(10 * i as i64);
            if let AlertDecision::SendAlert { kind: AlertKind::StatusChange, status } =
                step(&mut state, *status, now)
            {
                fired.push((i, status));
            }
        }

        assert_eq!(
            fired,
            vec![(1, Warning), (4, Critical), (6, Warning), (10, Critical), (13, Warning)]
        );
    }

    #[test]
    fn test_warning_rearms_after_normal() {
        let mut state = AlertState::default();
        let start = t0();
        let mut status_changes = 0;
        let mut persistent = 0;

        let mut record = |d: AlertDecision| match d {
            AlertDecision::SendAlert { kind: AlertKind::StatusChange, status: Severity::Warning } => {
                status_changes += 1
            }
            AlertDecision::SendAlert { kind: AlertKind::PersistentWarning, .. } => persistent += 1,
            _ => {}
        };

        record(step(&mut state, Severity::Normal, start));
        // WARNING held for 400s, polled every 30s
        for s in (30..=430).step_by(30) {
            record(step(&mut state, Severity::Warning, start + Duration::seconds(s)));
        }
        record(step(&mut state, Severity::Normal, start + Duration::seconds(460)));
        record(step(&mut state, Severity::Warning, start + Duration::seconds(490)));

        assert_eq!(status_changes, 2);
        assert_eq!(persistent, 1);
    }

    #[test]
    fn test_persistent_alert_fires_once_per_entry() {
        let entered = t0();
        let mut state = AlertState {
            last_status: Some(Severity::Critical),
            last_alert_status: Some(Severity::Critical),
            critical_entered_at: Some(entered),
            alerted_entry: Some(entered),
            ..AlertState::default()
        };

        assert_eq!(step(&mut state, Severity::Critical, entered + Duration::seconds(299)), AlertDecision::None);
        assert_eq!(
            step(&mut state, Severity::Critical, entered + Duration::seconds(300)),
            AlertDecision::SendAlert {
                kind: AlertKind::PersistentCritical,
                status: Severity::Critical
            }
        );
        assert_eq!(state.persistent_alerted_entry, Some(entered));
        assert_eq!(step(&mut state, Severity::Critical, entered + Duration::seconds(330)), AlertDecision::None);
        assert_eq!(step(&mut state, Severity::Critical, entered + Duration::seconds(3600)), AlertDecision::None);
    }

    #[test]
    fn test_persistent_alert_survives_slow_polling() {
        let mut state = AlertState::default();
        let start = t0();

        // Two-minute poll interval never lands inside a one-minute band
        assert_eq!(step(&mut state, Severity::Warning, start), status_change(Severity::Warning));
        assert_eq!(step(&mut state, Severity::Warning, start + Duration::seconds(120)), AlertDecision::None);
        assert_eq!(step(&mut state, Severity::Warning, start + Duration::seconds(240)), AlertDecision::None);
        assert_eq!(
            step(&mut state, Severity::Warning, start + Duration::seconds(360)),
            AlertDecision::SendAlert {
                kind: AlertKind::PersistentWarning,
                status: Severity::Warning
            }
        );
        assert_eq!(step(&mut state, Severity::Warning, start + Duration::seconds(480)), AlertDecision::None);
    }

    #[test]
    fn test_undelivered_persistent_alert_is_retried() {
        let policy = AlertPolicy::default();
        let entered = t0();
        let state = AlertState {
            last_status: Some(Severity::Warning),
            last_alert_status: Some(Severity::Warning),
            warning_entered_at: Some(entered),
            alerted_entry: Some(entered),
            ..AlertState::default()
        };

        let (state, first) = decide(&state, Severity::Warning, entered + Duration::seconds(310), &policy);
        assert!(matches!(first, AlertDecision::SendAlert { kind: AlertKind::PersistentWarning, .. }));
        let (_, retry) = decide(&state, Severity::Warning, entered + Duration::seconds(370), &policy);
        assert_eq!(retry, first);
    }

    #[test]
    fn test_failed_delivery_retries_without_resetting_entry() {
        let policy = AlertPolicy::default();
        let start = t0();
        let state = AlertState::default();

        // Delivery failed: the decision is not committed
        let (state, first) = decide(&state, Severity::Warning, start, &policy);
        assert_eq!(first, status_change(Severity::Warning));
        assert_eq!(state.last_alert_status, None);

        let later = start + Duration::seconds(60);
        let (state, retry) = decide(&state, Severity::Warning, later, &policy);
        assert_eq!(retry, status_change(Severity::Warning));
        assert_eq!(state.warning_entered_at, Some(start));
    }

    #[test]
    fn test_failed_reentry_alert_is_retried() {
        let policy = AlertPolicy::default();
        let start = t0();
        let mut state = AlertState::default();

        assert_eq!(step(&mut state, Severity::Warning, start), status_change(Severity::Warning));
        assert_eq!(step(&mut state, Severity::Normal, start + Duration::seconds(30)), AlertDecision::None);

        // Re-entry alert is decided but its delivery fails
        let reentry = start + Duration::seconds(60);
        let (state, first) = decide(&state, Severity::Warning, reentry, &policy);
        assert_eq!(first, status_change(Severity::Warning));
        assert_eq!(state.last_alert_status, Some(Severity::Warning));

        let (mut state, retry) = decide(&state, Severity::Warning, reentry + Duration::seconds(30), &policy);
        assert_eq!(retry, status_change(Severity::Warning));
        assert_eq!(state.warning_entered_at, Some(reentry));

        state.commit(&retry, reentry + Duration::seconds(30));
        assert_eq!(state.alerted_entry, Some(reentry));
        let (_, after) = decide(&state, Severity::Warning, reentry + Duration::seconds(60), &policy);
        assert_eq!(after, AlertDecision::None);
    }

    #[test]
    fn test_normal_never_alerts_and_clears_entries() {
        let state = AlertState {
            last_status: Some(Severity::Critical),
            last_alert_status: Some(Severity::Critical),
            warning_entered_at: Some(t0()),
            critical_entered_at: Some(t0()),
            ..AlertState::default()
        };
        let (next, decision) = decide(&state, Severity::Normal, t0(), &AlertPolicy::default());
        assert_eq!(decision, AlertDecision::None);
        assert_eq!(next.warning_entered_at, None);
        assert_eq!(next.critical_entered_at, None);
        assert_eq!(next.last_alert_status, Some(Severity::Critical));
    }

    #[test]
    fn test_commit_only_touches_delivery_fields() {
        let mut state = AlertState::default();
        let (mut next, decision) = decide(&state, Severity::Critical, t0(), &AlertPolicy::default());
        assert_eq!(next.last_alert_time, None);

        next.commit(&decision, t0());
        assert_eq!(next.last_alert_status, Some(Severity::Critical));
        assert_eq!(next.last_alert_time, Some(t0()));
        assert_eq!(next.last_hourly_digest_hour, None);

        state.commit(&AlertDecision::None, t0());
        assert_eq!(state, AlertState::default());
    }

    #[test]
    fn test_hourly_digest_gate() {
        let mut state = AlertState::default();
        let now = t0() + Duration::minutes(5);
        assert!(should_send_hourly_digest(&state, &now));
        assert_eq!(digest_decision(&state, &now), AlertDecision::SendHourlyDigest);

        state.commit(&AlertDecision::SendHourlyDigest, now);
        assert_eq!(state.last_hourly_digest_hour, Some(10));
        assert!(!should_send_hourly_digest(&state, &(now + Duration::minutes(20))));
        assert!(should_send_hourly_digest(&state, &(now + Duration::minutes(60))));
    }

    #[test]
    fn test_state_persisted_form() {
        let json = serde_json::to_value(AlertState::default()).unwrap();
        assert_eq!(json["last_status"], "UNKNOWN");
        assert!(json["last_alert_status"].is_null());

        let state = AlertState {
            last_status: Some(Severity::Warning),
            last_alert_status: Some(Severity::Warning),
            warning_entered_at: Some(t0()),
            last_hourly_digest_hour: Some(7),
            ..AlertState::default()
        };
        let text = serde_json::to_string(&state).unwrap();
        let back: AlertState = serde_json::from_str(&text).unwrap();
        assert_eq!(back, state);

        // Missing keys fall back to defaults
        let partial: AlertState = serde_json::from_str(r#"{"last_status":"CRITICAL"}"#).unwrap();
        assert_eq!(partial.last_status, Some(Severity::Critical));
        assert_eq!(partial.last_hourly_digest_hour, None);
    }
}
