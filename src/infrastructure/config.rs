use crate::domain::aggregate::DEFAULT_RETENTION_HOURS;
use crate::domain::severity::Thresholds;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    #[serde(default)]
    pub server: ServerSettings,
    pub sensor: SensorSettings,
    pub thresholds: Thresholds,
    #[serde(default)]
    pub alerts: AlertSettings,
    #[serde(default)]
    pub schedule: ScheduleSettings,
    pub email: EmailSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SensorSettings {
    pub base_url: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_thermal_path")]
    pub thermal_path: String,
    /// Added to every raw `ReadingCelsius` value.
    #[serde(default = "default_correction")]
    pub correction: f64,
    #[serde(default)]
    pub valid_min: f64,
    #[serde(default = "default_valid_max")]
    pub valid_max: f64,
    #[serde(default = "default_sensor_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AlertSettings {
    pub persistent_after_secs: i64,
    pub hourly_digest: bool,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            persistent_after_secs: 300,
            hourly_digest: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScheduleSettings {
    pub check_interval_secs: u64,
    /// Local time offset used for hour buckets, digests and log timestamps.
    pub utc_offset_minutes: i32,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            check_interval_secs: 60,
            utc_offset_minutes: 8 * 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmailSettings {
    pub from: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
    #[serde(default)]
    pub recipients: Vec<String>,
    pub smtp: SmtpSettings,
    #[serde(default)]
    pub fallback_smtp: Option<SmtpSettings>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SmtpEncryption {
    #[default]
    None,
    Starttls,
    Tls,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SmtpSettings {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub encryption: SmtpEncryption,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_smtp_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageSettings {
    pub log_file: PathBuf,
    pub state_file: PathBuf,
    pub aggregate_file: PathBuf,
    pub retention_hours: usize,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("storage/temperature.log"),
            state_file: PathBuf::from("storage/alert_state.json"),
            aggregate_file: PathBuf::from("storage/graph_cache.json"),
            retention_hours: DEFAULT_RETENTION_HOURS,
        }
    }
}

fn default_thermal_path() -> String {
    "/redfish/v1/Chassis/System.Embedded.1/Thermal".to_string()
}

fn default_correction() -> f64 {
    -62.0
}

fn default_valid_max() -> f64 {
    100.0
}

fn default_sensor_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_from_name() -> String {
    "iDRAC Monitor".to_string()
}

fn default_smtp_port() -> u16 {
    25
}

fn default_smtp_timeout() -> u64 {
    20
}

impl MonitorConfig {
    /// Reject settings the monitor cannot run with and warn about risky ones.
    pub fn validate(&self) -> anyhow::Result<()> {
        let t = &self.thresholds;
        if !(t.warning.is_finite() && t.critical.is_finite()) || t.warning >= t.critical {
            anyhow::bail!(
                "thresholds must be finite and ascending (warning {} < critical {})",
                t.warning,
                t.critical
            );
        }
        if self.schedule.check_interval_secs == 0 {
            anyhow::bail!("schedule.check_interval_secs must be greater than zero");
        }
        if self.storage.retention_hours == 0 {
            anyhow::bail!("storage.retention_hours must be greater than zero");
        }
        if self.alerts.persistent_after_secs <= 0 {
            anyhow::bail!("alerts.persistent_after_secs must be greater than zero");
        }
        if self.schedule.utc_offset_minutes.abs() >= 24 * 60 {
            anyhow::bail!("schedule.utc_offset_minutes must be within one day");
        }
        if self.email.recipients.is_empty() {
            tracing::warn!("No email recipients configured; every notification will fail");
        }
        if self.schedule.check_interval_secs as i64 >= self.alerts.persistent_after_secs {
            tracing::warn!(
                interval = self.schedule.check_interval_secs,
                persistent_after = self.alerts.persistent_after_secs,
                "Poll interval is not shorter than the persistent alert delay; persistent alerts will lag"
            );
        }
        Ok(())
    }
}

/// Load `<dir>/monitor.*` and apply `IDRAC__SECTION__KEY` environment overrides.
pub fn load_monitor_config(dir: &str) -> anyhow::Result<MonitorConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name(&format!("{}/monitor", dir)))
        .add_source(
            config::Environment::with_prefix("IDRAC")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("email.recipients")
                .try_parsing(true),
        )
        .build()?;

    let config: MonitorConfig = settings.try_deserialize()?;
    config.validate()?;
    Ok(config)
}
