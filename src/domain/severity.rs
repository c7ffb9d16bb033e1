// Severity domain model - Threshold classification of a temperature reading
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordered classification of a reading: `Normal < Warning < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Normal,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Normal => "NORMAL",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        }
    }

    pub fn is_abnormal(&self) -> bool {
        *self != Severity::Normal
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown severity '{0}'")]
pub struct UnknownSeverity(pub String);

impl FromStr for Severity {
    type Err = UnknownSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "NORMAL" => Ok(Severity::Normal),
            "WARNING" => Ok(Severity::Warning),
            "CRITICAL" => Ok(Severity::Critical),
            other => Err(UnknownSeverity(other.to_string())),
        }
    }
}

/// Map a value onto a severity given two ascending thresholds.
/// Both bounds are inclusive: a value equal to a threshold is at that level.
pub fn classify(value: f64, warning_threshold: f64, critical_threshold: f64) -> Severity {
    if value >= critical_threshold {
        Severity::Critical
    } else if value >= warning_threshold {
        Severity::Warning
    } else {
        Severity::Normal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Thresholds {
    pub warning: f64,
    pub critical: f64,
}

impl Thresholds {
    pub fn new(warning: f64, critical: f64) -> Self {
        Self { warning, critical }
    }

    pub fn classify(&self, value: f64) -> Severity {
        classify(value, self.warning, self.critical)
    }
}
