use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::config::{BreakerConfig, RetryConfig};
use crate::error::CallError;
use crate::http::server::AppState;
use crate::resilience::circuit_breaker::BreakerSnapshot;
use crate::resilience::transport::{Request, Transport};

#[derive(Serialize)]
pub struct RootMessage {
    pub message: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct EffectiveConfig {
    pub breaker: BreakerConfig,
    pub retry: RetryConfig,
    pub attempt_timeout_ms: u64,
    pub backend_url: String,
}

#[derive(Serialize)]
pub struct HealthReport {
    pub breaker_state: String,
    pub breaker: BreakerSnapshot,
    pub config: EffectiveConfig,
}

#[derive(Serialize)]
pub struct CallReport {
    pub state: &'static str,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
}

pub async fn root() -> Json<RootMessage> {
    Json(RootMessage {
        message: "Client resilience service running",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn health<T: Transport + 'static>(State(state): State<AppState<T>>) -> Json<HealthReport> {
    let breaker = state.client.breaker().snapshot();
    Json(HealthReport {
        breaker_state: breaker.state.to_string(),
        breaker,
        config: EffectiveConfig {
            breaker: state.client.breaker().config().clone(),
            retry: state.config.retry.clone(),
            attempt_timeout_ms: state.config.client.attempt_timeout_ms,
            backend_url: state.config.client.backend_url.clone(),
        },
    })
}

/// Make one call through the resilience layer and report how it ended.
pub async fn call_backend<T: Transport + 'static>(State(state): State<AppState<T>>) -> impl IntoResponse {
    let start = Instant::now();
    let result = state.client.call(&Request::default()).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(response) => (
            StatusCode::OK,
            Json(CallReport {
                state: "success",
                latency_ms,
                result: Some(response.json().unwrap_or_else(|_| response.text().into())),
                error: None,
                kind: None,
            }),
        ),
        Err(e) => (
            status_for(&e),
            Json(CallReport {
                state: "failed",
                latency_ms,
                result: None,
                error: Some(e.to_string()),
                kind: Some(e.kind().as_str()),
            }),
        ),
    }
}

fn status_for(e: &CallError) -> StatusCode {
    match e {
        CallError::CircuitOpen => StatusCode::SERVICE_UNAVAILABLE,
        CallError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        CallError::Remote { .. } | CallError::Connection { .. } => StatusCode::BAD_GATEWAY,
        CallError::ProtocolViolation(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
