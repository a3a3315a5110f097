// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Simple health check response for liveness probes.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Readiness response with individual component status.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Overall status ("ok" or "degraded").
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthChecks {
    /// Whether the service process is running.
    pub service: String,
    /// Companion auth service ("ok" or "unavailable").
    pub auth_service: String,
    /// `local` or `remote`.
    pub verification_mode: String,
}

fn ok() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Auth process health; also used as the startup barrier.
pub async fn auth_health() -> Json<HealthResponse> {
    ok()
}

/// Liveness probe handler.
///
/// Always returns 200 if the process is running.
/// Does not check dependencies - use readiness for that.
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn liveness() -> Json<HealthResponse> {
    ok()
}

/// Readiness probe handler.
///
/// Returns 503 while the auth service cannot be reached.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready", body = ReadyResponse),
        (status = 503, description = "Auth service unreachable", body = ReadyResponse)
    )
)]
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let client = state.auth_client();
    let auth_ok = client.ready().await;

    let response = ReadyResponse {
        status: if auth_ok { "ok" } else { "degraded" }.to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            auth_service: if auth_ok { "ok" } else { "unavailable" }.to_string(),
            verification_mode: client.mode().to_string(),
        },
    };

    let status = if auth_ok {
        StatusCode::OK
    } else {
        tracing::warn!(mode = client.mode(), "auth service not ready");
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::auth::{AuthClient, PermissionPolicy, RemoteAuthClient};
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn local_mode_is_ready() {
        let (status, Json(body)) = readiness(State(AppState::for_tests())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.checks.verification_mode, "local");
    }

    #[tokio::test]
    async fn unreachable_auth_service_is_not_ready() {
        // Bind then drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let remote = RemoteAuthClient::new(&format!("http://{addr}"), Duration::from_millis(500)).unwrap();
        let state = AppState::new(
            InMemoryStore::new(),
            AuthClient::Remote(remote),
            PermissionPolicy::default(),
        );

        let (status, Json(body)) = readiness(State(state)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.status, "degraded");
        assert_eq!(body.checks.auth_service, "unavailable");
    }

    #[tokio::test]
    async fn liveness_is_always_ok() {
        let Json(body) = liveness().await;
        assert_eq!(body.status, "ok");
    }
}
