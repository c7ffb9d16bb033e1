// Reading domain models - Classified samples and their log line form
use super::severity::Severity;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use serde::Serialize;

/// Instants are kept in the monitor's configured local offset so that
/// hour-of-day and hour buckets follow local wall-clock time.
pub type Timestamp = DateTime<FixedOffset>;

pub const LOG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    pub timestamp: Timestamp,
    pub value: f64,
    pub status: Severity,
}

impl Reading {
    pub fn new(timestamp: Timestamp, value: f64, status: Severity) -> Self {
        Self {
            timestamp,
            value,
            status,
        }
    }

    pub fn formatted_time(&self) -> String {
        self.timestamp.format(LOG_TIME_FORMAT).to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub timestamp: Timestamp,
    pub value: f64,
    pub status: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_tag: Option<String>,
}

impl LogRecord {
    pub fn from_reading(reading: &Reading, source_tag: Option<String>) -> Self {
        Self {
            timestamp: reading.timestamp,
            value: reading.value,
            status: reading.status,
            source_tag: source_tag.map(|tag| sanitize_tag(&tag)),
        }
    }

    /// Render as a single newline-terminated line:
    /// `YYYY-MM-DD HH:MM:SS,<value>,<STATUS>[,<tag>]`
    pub fn to_line(&self) -> String {
        let mut line = format!(
            "{},{:.1},{}",
            self.timestamp.format(LOG_TIME_FORMAT),
            self.value,
            self.status
        );
        if let Some(tag) = &self.source_tag {
            line.push(',');
            line.push_str(tag);
        }
        line.push('\n');
        line
    }

    /// Parse one line (without its terminator). Returns `None` for anything
    /// that does not have 3 or 4 well-formed fields.
    pub fn parse_line(line: &str, offset: &FixedOffset) -> Option<Self> {
        let mut parts = line.trim_end_matches('\r').splitn(4, ',');
        let time = parts.next()?;
        let value = parts.next()?;
        let status = parts.next()?;
        let source_tag = parts.next().map(str::to_string).filter(|t| !t.is_empty());

        let naive = NaiveDateTime::parse_from_str(time, LOG_TIME_FORMAT).ok()?;
        let timestamp = offset.from_local_datetime(&naive).single()?;
        let value = value.trim().parse::<f64>().ok()?;
        let status = status.parse::<Severity>().ok()?;

        Some(Self {
            timestamp,
            value,
            status,
            source_tag,
        })
    }
}

// Tags share the line with comma-separated fields
fn sanitize_tag(tag: &str) -> String {
    tag.chars()
        .map(|c| if c == ',' || c.is_control() { '_' } else { c })
        .collect()
}
