// Notification content - Subjects and bodies for operator emails
use crate::domain::alert::AlertKind;
use crate::domain::reading::{Reading, Timestamp, LOG_TIME_FORMAT};
use crate::domain::severity::Severity;
use chrono::TimeDelta;

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub subject: String,
    pub body: String,
}

/// What a message reports on, which drives its title and extra lines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MessageKind {
    Alert { kind: AlertKind, held_for: TimeDelta },
    HourlyReport,
    Report,
}

impl MessageKind {
    fn label(&self) -> &'static str {
        match self {
            MessageKind::Alert { .. } => "Alert",
            MessageKind::HourlyReport => "Hourly Report",
            MessageKind::Report => "Report",
        }
    }
}

/// Details about the monitor itself, used for the connectivity test message.
#[derive(Debug, Clone, Default)]
pub struct MonitorIdentity {
    pub host: String,
    pub sensor_url: String,
    pub transport: String,
    pub from: String,
    pub recipients: Vec<String>,
}

pub fn reading_message(kind: MessageKind, reading: &Reading, host: &str) -> Message {
    let prefix = match kind {
        MessageKind::Alert { kind: AlertKind::PersistentWarning, .. } => "[Persistent Warning] ",
        MessageKind::Alert { kind: AlertKind::PersistentCritical, .. } => "[Persistent Critical] ",
        _ => "",
    };
    let subject = format!(
        "{}[iDRAC {}] {} - {:.1}°C - {}",
        prefix,
        kind.label(),
        reading.status,
        reading.value,
        host
    );

    let mut lines = vec![
        format!("iDRAC Temperature {}", kind.label()),
        format!("Host: {}", host),
        format!("Status: {}", reading.status),
        format!("Temperature: {:.1}°C", reading.value),
        format!("Time: {}", reading.formatted_time()),
    ];

    if let MessageKind::Alert { kind: alert_kind, held_for } = kind {
        if alert_kind.is_persistent() {
            lines.push(format!("Duration: {}", describe_duration(held_for)));
        }
        match reading.status {
            Severity::Critical => lines.push(
                "Action: Immediate attention recommended (check cooling, workloads, iDRAC).".to_string(),
            ),
            Severity::Warning => {
                lines.push("Action: Monitor closely; investigate airflow and load.".to_string())
            }
            Severity::Normal => {}
        }
    }

    Message {
        subject,
        body: lines.join("\n"),
    }
}

pub fn test_message(identity: &MonitorIdentity, now: &Timestamp) -> Message {
    let body = format!(
        "This is a test email from iDRAC Monitor.\n\
         Time: {}\n\
         iDRAC: {}\n\
         Transport: {}\n\
         From: {}\n\
         To: {}\n\n\
         If you receive this, email configuration is working correctly!",
        now.format(LOG_TIME_FORMAT),
        identity.sensor_url,
        identity.transport,
        identity.from,
        identity.recipients.join(", ")
    );

    Message {
        subject: "[iDRAC Test] Email Connectivity".to_string(),
        body,
    }
}

// "5+ minutes", "90+ seconds"
fn describe_duration(held_for: TimeDelta) -> String {
    let secs = held_for.num_seconds().max(0);
    if secs >= 60 && secs % 60 == 0 {
        let minutes = secs / 60;
        format!("{}+ minute{}", minutes, if minutes == 1 { "" } else { "s" })
    } else {
        format!("{}+ seconds", secs)
    }
}
