// HTTP request handlers
use crate::application::error::FetchError;
use crate::presentation::app_state::AppState;
use axum::{
    Json,
    body::Body,
    extract::{ConnectInfo, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;

pub const DEFAULT_LOG_LIMIT: usize = 100;
pub const MAX_LOG_LIMIT: usize = 1000;

#[derive(Deserialize)]
pub struct LogsQuery {
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct PushedReading {
    pub temp: f64,
}

/// `{"success": true, ...}` with the payload's fields merged in.
fn success(data: impl Serialize) -> Response {
    let mut body = match serde_json::to_value(data) {
        Ok(Value::Object(map)) => Value::Object(map),
        Ok(other) => json!({ "data": other }),
        Err(e) => return failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    body["success"] = Value::Bool(true);
    Json(body).into_response()
}

fn failure(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(json!({ "success": false, "error": error.into() }))).into_response()
}

fn fetch_failure(e: FetchError) -> Response {
    tracing::warn!(error = %e, "Sensor fetch failed");
    let status = match e {
        FetchError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::BAD_GATEWAY,
    };
    failure(status, e.to_string())
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Run one poll now
pub async fn poll_now(State(state): State<Arc<AppState>>) -> Response {
    match state.monitor.poll().await {
        Ok(report) => success(report),
        Err(e) => fetch_failure(e),
    }
}

/// Latest accepted reading
pub async fn current_reading(State(state): State<Arc<AppState>>) -> Response {
    match state.monitor.current().await {
        Some(reading) => success(json!({
            "reading": reading,
            "time": reading.formatted_time(),
        })),
        None => failure(StatusCode::NOT_FOUND, "no reading yet"),
    }
}

pub async fn recent_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogsQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT).min(MAX_LOG_LIMIT);
    match state.monitor.history().recent(limit).await {
        Ok(records) => success(json!({ "count": records.len(), "records": records })),
        Err(e) => {
            tracing::error!(error = %e, "Failed to read log");
            failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Full log as CSV
pub async fn download_logs(State(state): State<Arc<AppState>>) -> Response {
    match state.monitor.history().export_csv().await {
        Ok(Some(csv)) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/csv; charset=utf-8")
            .header(
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"temperature_log.csv\"",
            )
            .body(Body::from(csv))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
        Ok(None) => failure(StatusCode::NOT_FOUND, "no log data yet"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to export log");
            failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Hourly trend for graphs
pub async fn graph_data(State(state): State<Arc<AppState>>) -> Response {
    success(state.monitor.history().trend().await)
}

pub async fn alert_state(State(state): State<Arc<AppState>>) -> Response {
    success(state.monitor.alert_state().await)
}

/// Poll and send the hourly digest if it is still due this hour
pub async fn send_digest(State(state): State<Arc<AppState>>) -> Response {
    match state.monitor.send_digest_now().await {
        Ok(report) => success(report),
        Err(e) => fetch_failure(e),
    }
}

pub async fn send_report(State(state): State<Arc<AppState>>) -> Response {
    match state.monitor.send_report().await {
        Ok(outcome) if outcome.delivered => success(outcome),
        Ok(outcome) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "success": false,
                "reading": outcome.reading,
                "logged": outcome.logged,
                "delivered": false,
                "error": "delivery failed",
            })),
        )
            .into_response(),
        Err(e) => fetch_failure(e),
    }
}

pub async fn send_test_email(State(state): State<Arc<AppState>>) -> Response {
    let identity = state.monitor.identity();
    let delivered = state.monitor.send_test_notification().await;
    let body = json!({
        "success": delivered,
        "transport": identity.transport,
        "recipients": identity.recipients,
    });
    let status = if delivered {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    (status, Json(body)).into_response()
}

/// Reading pushed by a remote client, logged with the caller's address.
/// Pushed values never drive alerts.
pub async fn push_reading(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<PushedReading>,
) -> Response {
    if !payload.temp.is_finite() {
        return failure(StatusCode::UNPROCESSABLE_ENTITY, "temp must be a finite number");
    }

    let recorded = state
        .monitor
        .ingest(payload.temp, Utc::now(), Some(addr.ip().to_string()))
        .await;
    tracing::info!(
        value = recorded.reading.value,
        source = %addr.ip(),
        logged = recorded.logged,
        "Accepted pushed reading"
    );
    success(recorded)
}
