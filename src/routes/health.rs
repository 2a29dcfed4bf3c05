/**
 * Health Routes
 * Endpoints for checking backend health status
 */
use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::StoreError;
use crate::state::AppState;

/// Single service check result
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCheck {
    pub status: String,
    /// Which content store answered (`postgres` or `memory`)
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Ready check response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub uptime: u64,
    pub database: ServiceCheck,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Simple health response
#[derive(Debug, Serialize, Deserialize)]
pub struct SimpleHealthResponse {
    pub status: String,
}

async fn ping_store(state: &AppState) -> Result<Duration, StoreError> {
    match state.config.backend_timeout {
        Some(limit) => tokio::time::timeout(limit, state.store.ping())
            .await
            .map_err(|_| StoreError::Timeout)?,
        None => state.store.ping().await,
    }
}

async fn check_store(state: &AppState) -> ServiceCheck {
    let backend = state.store.name().to_string();
    match ping_store(state).await {
        Ok(duration) => ServiceCheck {
            status: "healthy".to_string(),
            backend,
            response_time: Some(duration.as_millis() as u64),
            error: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, "store health check failed");
            ServiceCheck {
                status: "unhealthy".to_string(),
                backend,
                response_time: None,
                error: Some(e.to_string()),
            }
        }
    }
}

/// GET /health - Simple health ping
pub async fn health_ping() -> Json<SimpleHealthResponse> {
    Json(SimpleHealthResponse {
        status: "ok".to_string(),
    })
}

/// GET /health/database
pub async fn health_database(State(state): State<AppState>) -> Json<ServiceCheck> {
    Json(check_store(&state).await)
}

/// GET /health/ready - `503` while the content store is unreachable
pub async fn health_ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let database = check_store(&state).await;
    let is_ready = database.status == "healthy";

    let response = ReadyResponse {
        status: if is_ready { "ready" } else { "not ready" }.to_string(),
        timestamp: Utc::now(),
        uptime: state.started_at.elapsed().as_secs(),
        database,
        reason: (!is_ready).then(|| "Content store is not healthy".to_string()),
    };

    let status = if is_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing;
    use axum::routing::get;
    use axum::Router;

    fn test_router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(health_ping))
            .route("/health/database", get(health_database))
            .route("/health/ready", get(health_ready))
            .with_state(state)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(app: Router, uri: &str) -> (StatusCode, T) {
        let (status, body) = testing::send(app, testing::empty_request("GET", uri, None)).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health_ping_returns_ok() {
        let state = testing::state().await;
        let (status, body) = get_json::<SimpleHealthResponse>(test_router(state), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ok");
    }

    #[tokio::test]
    async fn test_health_database_reports_backend() {
        let state = testing::state().await;
        let (status, body) =
            get_json::<ServiceCheck>(test_router(state), "/health/database").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "healthy");
        assert_eq!(body.backend, "memory");
        assert!(body.response_time.is_some());
    }

    #[tokio::test]
    async fn test_health_ready_returns_ready() {
        let state = testing::state().await;
        let (status, body) = get_json::<ReadyResponse>(test_router(state), "/health/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ready");
        assert!(body.reason.is_none());
    }
}
