// Main entry point - Dependency injection, poll loop and server setup
mod domain;
mod application;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc, time::Duration};
use axum::{routing::{get, post}, Router};
use chrono::{FixedOffset, TimeDelta};
use tower_http::{compression::CompressionLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use crate::application::alert_service::AlertService;
use crate::application::history_service::HistoryService;
use crate::application::messages::MonitorIdentity;
use crate::application::monitor_service::{MonitorService, MonitorSettings};
use crate::application::notifier::{FallbackNotifier, Notifier};
use crate::application::sensor::SensorReader;
use crate::domain::alert::AlertPolicy;
use crate::infrastructure::config::{load_monitor_config, MonitorConfig};
use crate::infrastructure::file_log_store::FileLogStore;
use crate::infrastructure::json_store::{JsonAggregateStore, JsonStateStore};
use crate::infrastructure::redfish_sensor::RedfishSensor;
use crate::infrastructure::smtp_notifier::SmtpNotifier;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    alert_state, current_reading, download_logs, graph_data, health_check, poll_now, push_reading,
    recent_logs, send_digest, send_report, send_test_email,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = load_monitor_config("config")?;
    let monitor = build_monitor(&config).await?;

    // Background poll loop
    tokio::spawn(run_poll_loop(
        monitor.clone(),
        Duration::from_secs(config.schedule.check_interval_secs),
    ));

    let state = Arc::new(AppState { monitor });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/api/poll", post(poll_now))
        .route("/api/current", get(current_reading))
        .route("/api/logs", get(recent_logs))
        .route("/api/logs/download", get(download_logs))
        .route("/api/graph", get(graph_data))
        .route("/api/state", get(alert_state))
        .route("/api/digest", post(send_digest))
        .route("/api/report", post(send_report))
        .route("/api/test-email", post(send_test_email))
        .route("/api/readings", post(push_reading))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config.server.bind.parse()?;
    tracing::info!(%addr, "Starting idrac-monitor service");

    axum::serve(
        tokio::net::TcpListener::bind(addr).await?,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn build_monitor(config: &MonitorConfig) -> anyhow::Result<MonitorService> {
    let offset = FixedOffset::east_opt(config.schedule.utc_offset_minutes * 60)
        .ok_or_else(|| anyhow::anyhow!("invalid utc offset {}", config.schedule.utc_offset_minutes))?;

    // Create adapters (infrastructure layer)
    let sensor = Arc::new(RedfishSensor::new(&config.sensor)?);
    let host = sensor.host_label();

    let email = &config.email;
    let mut transports: Vec<Arc<dyn Notifier>> = vec![Arc::new(SmtpNotifier::new(
        &email.smtp,
        &email.from,
        &email.from_name,
    )?)];
    if let Some(fallback) = &email.fallback_smtp {
        transports.push(Arc::new(SmtpNotifier::new(fallback, &email.from, &email.from_name)?));
    }
    let notifier: Arc<dyn Notifier> = Arc::new(FallbackNotifier::new(transports));

    let storage = &config.storage;
    let log = Arc::new(FileLogStore::new(&storage.log_file, offset));
    let state_store = Arc::new(JsonStateStore::new(&storage.state_file));
    let aggregate_store = Arc::new(JsonAggregateStore::new(&storage.aggregate_file));

    // Create services (application layer)
    let policy = AlertPolicy {
        persistent_after: TimeDelta::seconds(config.alerts.persistent_after_secs),
    };
    let alerts = AlertService::load(
        state_store,
        notifier.clone(),
        email.recipients.clone(),
        host.clone(),
        policy,
    )
    .await;
    let history = HistoryService::load(log, aggregate_store, storage.retention_hours).await;

    let identity = MonitorIdentity {
        host,
        sensor_url: sensor.describe(),
        transport: notifier.describe(),
        from: email.from.clone(),
        recipients: email.recipients.clone(),
    };
    let settings = MonitorSettings {
        thresholds: config.thresholds,
        // Outer bound above the client request timeout
        fetch_timeout: Duration::from_secs(config.sensor.timeout_secs + 5),
        utc_offset: offset,
        hourly_digest: config.alerts.hourly_digest,
    };

    tracing::info!(
        sensor = %identity.sensor_url,
        transport = %identity.transport,
        warning = config.thresholds.warning,
        critical = config.thresholds.critical,
        "Monitor configured"
    );

    Ok(MonitorService::new(sensor, notifier, alerts, history, settings, identity))
}

/// Poll forever; a failed tick is logged and the next one runs on schedule.
async fn run_poll_loop(monitor: MonitorService, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match monitor.poll().await {
            Ok(report) => tracing::info!(
                value = report.reading.value,
                status = %report.reading.status,
                logged = report.logged,
                alert = ?report.alert.decision,
                delivered = report.alert.delivered,
                digest = ?report.digest,
                "Poll complete"
            ),
            Err(e) => tracing::warn!(error = %e, "Poll skipped"),
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
