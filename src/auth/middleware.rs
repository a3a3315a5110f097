// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authorization middleware for Axum.
//!
//! Every protected route carries its [`Operation`] as a request extension and
//! runs [`authorize`] as a route layer:
//!
//! ```rust,ignore
//! let route = protect(get(get_customer), Operation::GetCustomer, authz.clone());
//! ```
//!
//! ## Request flow
//!
//! 1. resolve the operation (none → 404)
//! 2. public operations pass straight through
//! 3. read `Authorization: Bearer <token>` (missing/empty → 401)
//! 4. obtain a verdict from the auth service, forwarding route and query
//!    parameters (ownership is decided there)
//! 5. negative verdict → 403
//! 6. re-check the verdict's role against the local policy → 403
//! 7. attach [`AuthenticatedCaller`] and run the handler

use std::collections::HashMap;

use axum::{
    extract::{FromRequestParts, RawPathParams, Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::{from_fn_with_state, Next},
    response::{IntoResponse, Response},
    routing::MethodRouter,
    Extension,
};

use super::client::AuthClient;
use super::error::AuthError;
use super::permissions::PermissionPolicy;
use super::roles::Operation;

/// Everything the middleware needs; cheap to clone.
#[derive(Clone)]
pub struct AuthorizationState {
    pub client: AuthClient,
    pub policy: PermissionPolicy,
}

impl AuthorizationState {
    pub fn new(client: AuthClient, policy: PermissionPolicy) -> Self {
        Self { client, policy }
    }
}

/// Caller context available to handlers after authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedCaller {
    pub role: String,
    pub operation: Operation,
}

/// Attach `operation` to `route` and guard it with [`authorize`].
pub fn protect<S>(
    route: MethodRouter<S>,
    operation: Operation,
    authz: AuthorizationState,
) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    route
        .route_layer(from_fn_with_state(authz, authorize))
        .layer(Extension(operation))
}

/// Extract a bearer token. `None` when the header is missing, not valid
/// UTF-8, not a Bearer credential, or empty.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Query parameters merged with path parameters; path values win.
async fn request_params(request: Request) -> (Request, HashMap<String, String>) {
    let mut params: HashMap<String, String> = request
        .uri()
        .query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let (mut parts, body) = request.into_parts();
    if let Ok(path_params) = RawPathParams::from_request_parts(&mut parts, &()).await {
        for (key, value) in &path_params {
            params.insert(key.to_string(), value.to_string());
        }
    }
    (Request::from_parts(parts, body), params)
}

pub async fn authorize(
    State(authz): State<AuthorizationState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(operation) = request.extensions().get::<Operation>().copied() else {
        tracing::warn!(path = %request.uri().path(), "request reached authorization without a route name");
        return AuthError::NotFound("Route not found".to_string()).into_response();
    };

    if operation.is_public() {
        return next.run(request).await;
    }

    let Some(token) = bearer_token(request.headers()).map(str::to_string) else {
        tracing::debug!(route_name = %operation, "missing bearer token");
        return AuthError::Authentication("missing token".to_string()).into_response();
    };

    let (mut request, params) = request_params(request).await;

    let verdict = match authz.client.verify(&token, operation.as_str(), &params).await {
        Ok(verdict) => verdict,
        Err(e) => {
            tracing::info!(route_name = %operation, status = e.status_code().as_u16(), "verification failed");
            return e.into_response();
        }
    };

    if !verdict.is_authorized {
        tracing::info!(route_name = %operation, role = %verdict.role, "request denied");
        return AuthError::Forbidden("Unauthorized".to_string()).into_response();
    }

    if !authz.policy.is_authorized_for(&verdict.role, operation.as_str()) {
        tracing::warn!(route_name = %operation, role = %verdict.role, "role lacks permission");
        return AuthError::insufficient_permissions().into_response();
    }

    request.extensions_mut().insert(AuthenticatedCaller {
        role: verdict.role,
        operation,
    });
    next.run(request).await
}
