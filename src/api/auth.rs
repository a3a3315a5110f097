// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Auth endpoints.
//!
//! The auth process serves login, verify, refresh and logout. The main
//! process only serves `POST /auth/login`, which it hands to its
//! [`crate::auth::AuthClient`].

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::{AuthError, LoginRequest, LoginResponse, RefreshResponse, Verdict},
    state::{AppState, AuthState},
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RefreshQuery {
    /// Refresh token issued at login.
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LogoutRequest {
    #[serde(rename = "refreshToken", default)]
    pub refresh_token: String,
}

fn decode<T: DeserializeOwned>(body: &Bytes) -> Result<T, AuthError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "undecodable request body");
        AuthError::BadRequest("Invalid request payload".to_string())
    })
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    tag = "Auth",
    responses(
        (status = 200, body = LoginResponse),
        (status = 400, description = "Malformed body or missing fields"),
        (status = 401, description = "Invalid credentials"),
        (status = 422, description = "Password too short")
    )
)]
pub async fn login(
    State(state): State<AuthState>,
    body: Bytes,
) -> Result<Json<LoginResponse>, AuthError> {
    let request: LoginRequest = decode(&body)?;
    let response = state.service.login(&request).await?;
    Ok(Json(response))
}

/// Verdict for a token, operation name and route parameters.
///
/// Every query parameter other than `token` and `routeName` is treated as a
/// route parameter.
#[utoipa::path(
    get,
    path = "/auth/verify",
    params(
        ("token" = String, Query, description = "Access token"),
        ("routeName" = String, Query, description = "Operation name of the protected route")
    ),
    tag = "Auth",
    responses(
        (status = 200, body = Verdict),
        (status = 400, description = "routeName missing"),
        (status = 401, description = "Token missing, malformed, forged or expired")
    )
)]
pub async fn verify(
    State(state): State<AuthState>,
    Query(mut params): Query<HashMap<String, String>>,
) -> Result<Json<Verdict>, AuthError> {
    let token = params.remove("token").unwrap_or_default();
    let route_name = params.remove("routeName").unwrap_or_default();

    if token.is_empty() {
        return Err(AuthError::Authentication("missing token".to_string()));
    }
    if route_name.is_empty() {
        return Err(AuthError::BadRequest("routeName is required".to_string()));
    }

    let verdict = state.service.verify(&token, &route_name, &params)?;
    Ok(Json(verdict))
}

#[utoipa::path(
    get,
    path = "/auth/refresh",
    params(RefreshQuery),
    tag = "Auth",
    responses(
        (status = 200, body = RefreshResponse),
        (status = 401, description = "Refresh token unknown, revoked or expired")
    )
)]
pub async fn refresh(
    State(state): State<AuthState>,
    Query(query): Query<RefreshQuery>,
) -> Result<Json<RefreshResponse>, AuthError> {
    let token = query.token.unwrap_or_default();
    Ok(Json(state.service.refresh(&token).await?))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    request_body = LogoutRequest,
    tag = "Auth",
    responses((status = 204, description = "Refresh token revoked"))
)]
pub async fn logout(State(state): State<AuthState>, body: Bytes) -> Result<StatusCode, AuthError> {
    let request: LogoutRequest = decode(&body)?;
    state.service.logout(&request.refresh_token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Login as served by the main process.
pub async fn proxy_login(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<LoginResponse>, AuthError> {
    let request: LoginRequest = decode(&body)?;
    let response = state.auth_client().login(&request).await?;
    Ok(Json(response))
}
