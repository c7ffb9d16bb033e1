// Aggregate domain model - Hour-bucketed rollups backing the trend graph
use super::reading::Timestamp;
use super::severity::Severity;
use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::VecDeque;
use std::fmt;

/// Three days of hourly buckets
pub const DEFAULT_RETENTION_HOURS: usize = 72;

const HOUR_KEY_FORMAT: &str = "%Y-%m-%d %H";

/// Local wall-clock hour a reading falls into, rendered as `YYYY-MM-DD HH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HourKey(NaiveDateTime);

impl HourKey {
    pub fn of(at: &Timestamp) -> Self {
        let local = at.naive_local();
        let truncated = local
            .with_minute(0)
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(local);
        Self(truncated)
    }

    pub fn parse(s: &str) -> Option<Self> {
        NaiveDateTime::parse_from_str(&format!("{}:00", s.trim()), "%Y-%m-%d %H:%M")
            .ok()
            .map(Self)
    }

    /// Short label used on graph axes, e.g. `Mar 01 09:00`.
    pub fn label(&self) -> String {
        self.0.format("%b %d %H:00").to_string()
    }
}

impl fmt::Display for HourKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(HOUR_KEY_FORMAT))
    }
}

impl Serialize for HourKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HourKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        HourKey::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid hour key '{}'", raw)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateBucket {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub count: u64,
    #[serde(rename = "status")]
    pub last_status: Severity,
}

impl AggregateBucket {
    fn seeded(value: f64, status: Severity) -> Self {
        Self {
            min: value,
            max: value,
            mean: value,
            count: 1,
            last_status: status,
        }
    }

    fn absorb(&mut self, value: f64, status: Severity) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.mean = (self.mean * self.count as f64 + value) / (self.count + 1) as f64;
        self.count += 1;
        self.last_status = status;
    }
}

/// Persisted / snapshot form of one bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketEntry {
    pub hour: HourKey,
    #[serde(flatten)]
    pub bucket: AggregateBucket,
}

/// Series handed to the graph renderer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrendSeries {
    pub labels: Vec<String>,
    pub temperatures: Vec<f64>,
    pub statuses: Vec<Severity>,
}

/// Insertion-ordered hourly buckets, bounded to `retention` entries.
#[derive(Debug, Clone)]
pub struct AggregateCache {
    buckets: VecDeque<BucketEntry>,
    retention: usize,
}

impl AggregateCache {
    pub fn new(retention: usize) -> Self {
        Self {
            buckets: VecDeque::with_capacity(retention + 1),
            retention: retention.max(1),
        }
    }

    /// Rebuild from a persisted snapshot, keeping only the newest `retention` entries.
    pub fn from_entries(entries: Vec<BucketEntry>, retention: usize) -> Self {
        let mut cache = Self::new(retention);
        cache.buckets.extend(entries);
        cache.evict();
        cache
    }

    pub fn update(&mut self, value: f64, status: Severity, at: &Timestamp) {
        let hour = HourKey::of(at);

        // The current hour is almost always the newest bucket
        match self.buckets.iter_mut().rev().find(|e| e.hour == hour) {
            Some(entry) => entry.bucket.absorb(value, status),
            None => self.buckets.push_back(BucketEntry {
                hour,
                bucket: AggregateBucket::seeded(value, status),
            }),
        }

        self.evict();
    }

    fn evict(&mut self) {
        while self.buckets.len() > self.retention {
            self.buckets.pop_front();
        }
    }

    /// Point-in-time copy in insertion order.
    pub fn snapshot(&self) -> Vec<BucketEntry> {
        self.buckets.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

impl TrendSeries {
    pub fn from_entries(entries: &[BucketEntry]) -> Self {
        let mut series = TrendSeries::default();
        for entry in entries {
            series.labels.push(entry.hour.label());
            series
                .temperatures
                .push((entry.bucket.mean * 10.0).round() / 10.0);
            series.statuses.push(entry.bucket.last_status);
        }
        series
    }
}
