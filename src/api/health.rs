//! Health check endpoints for Kubernetes probes

use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use futures::future::join_all;
use serde::Serialize;

use crate::api::types::Json;
use crate::domain::ProviderSource;

use super::state::AppState;

/// Detailed health response with component status
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checks: Option<Vec<HealthCheck>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Health of one configured provider
#[derive(Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

/// Returns 200 while the process is up
pub async fn health_check() -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: None,
        latency_ms: None,
    };

    (StatusCode::OK, Json(response))
}

/// Readiness check: lists the stores of every configured provider
///
/// Degraded while at least one provider answers, unhealthy when none does.
pub async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();
    let providers = state.knowledge_base.configured_providers();

    let checks = join_all(
        providers
            .iter()
            .map(|source| check_provider(&state, *source)),
    )
    .await;

    let healthy = checks
        .iter()
        .filter(|c| c.status == HealthStatus::Healthy)
        .count();
    let overall_status = overall_status(healthy, checks.len());

    let response = HealthResponse {
        status: overall_status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: Some(checks),
        latency_ms: Some(start.elapsed().as_millis() as u64),
    };

    let status_code = match overall_status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(response))
}

/// Liveness check - simple check to verify the service is running
pub async fn live_check() -> impl IntoResponse {
    StatusCode::OK
}

fn overall_status(healthy: usize, total: usize) -> HealthStatus {
    if total == 0 || healthy == 0 {
        HealthStatus::Unhealthy
    } else if healthy < total {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}

async fn check_provider(state: &AppState, source: ProviderSource) -> HealthCheck {
    let start = Instant::now();
    let result = state.knowledge_base.list_stores(Some(source)).await;
    let latency_ms = Some(start.elapsed().as_millis() as u64);

    match result {
        Ok(stores) => HealthCheck {
            name: source.to_string(),
            status: HealthStatus::Healthy,
            message: Some(format!("{} stores", stores.len())),
            latency_ms,
        },
        Err(e) => HealthCheck {
            name: source.to_string(),
            status: HealthStatus::Unhealthy,
            message: Some(e.to_string()),
            latency_ms,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status_serialization() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Degraded).unwrap(),
            "\"degraded\""
        );
    }

    #[test]
    fn test_overall_status() {
        assert_eq!(overall_status(0, 0), HealthStatus::Unhealthy);
        assert_eq!(overall_status(0, 2), HealthStatus::Unhealthy);
        assert_eq!(overall_status(1, 2), HealthStatus::Degraded);
        assert_eq!(overall_status(3, 3), HealthStatus::Healthy);
    }

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: HealthStatus::Healthy,
            version: "1.0.0".to_string(),
            checks: None,
            latency_ms: None,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"healthy\""));
        assert!(!json.contains("checks"));
    }
}
