// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP routers of both processes.
//!
//! - [`main_router`]: customer/account API, every route guarded by
//!   [`crate::auth::authorize`] under its [`Operation`] name
//! - [`auth_router`]: token issuance and verification

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{protect, AuthError, LoginRequest, LoginResponse, Operation, RefreshResponse, Verdict},
    models::{
        Account, AccountType, Customer, CustomerStatus, NewAccountRequest, NewAccountResponse,
        PermissionsResponse, TransactionRequest, TransactionResponse, TransactionType,
    },
    state::{AppState, AuthState},
};

pub mod accounts;
pub mod auth;
pub mod customers;
pub mod health;
pub mod permissions;

async fn route_not_found() -> AuthError {
    AuthError::NotFound("Route not found".to_string())
}

/// `x-request-id` is assigned before tracing and echoed on the response.
fn with_request_ids(router: Router) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id()),
    )
}

/// Router of the main API process.
pub fn main_router(state: AppState) -> Router {
    let authz = state.authz.clone();

    let api = Router::new()
        .route(
            "/auth/login",
            protect(post(auth::proxy_login), Operation::AuthLogin, authz.clone()),
        )
        .route(
            "/customers",
            protect(get(customers::list_customers), Operation::GetAllCustomers, authz.clone()),
        )
        .route(
            "/customers/{customer_id}",
            protect(get(customers::get_customer), Operation::GetCustomer, authz.clone()),
        )
        .route(
            "/customers/{customer_id}/account",
            protect(post(accounts::open_account), Operation::NewAccount, authz.clone()),
        )
        .route(
            "/customers/{customer_id}/account/{account_id}",
            protect(post(accounts::make_transaction), Operation::NewTransaction, authz.clone()),
        )
        .route(
            "/permissions",
            protect(get(permissions::get_role_permissions), Operation::GetRolePermissions, authz),
        )
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .fallback(route_not_found)
        .with_state(state);

    with_request_ids(
        api.merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
            .layer(CorsLayer::permissive()),
    )
}

/// Router of the auth service process.
pub fn auth_router(state: AuthState) -> Router {
    let api = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/verify", get(auth::verify))
        .route("/auth/refresh", get(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/health", get(health::auth_health))
        .fallback(route_not_found)
        .with_state(state);

    with_request_ids(api)
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::login,
        auth::verify,
        auth::refresh,
        auth::logout,
        customers::list_customers,
        customers::get_customer,
        accounts::open_account,
        accounts::make_transaction,
        permissions::get_role_permissions,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            LoginRequest,
            LoginResponse,
            RefreshResponse,
            auth::LogoutRequest,
            Verdict,
            Customer,
            CustomerStatus,
            Account,
            AccountType,
            NewAccountRequest,
            NewAccountResponse,
            TransactionRequest,
            TransactionResponse,
            TransactionType,
            PermissionsResponse,
            health::HealthResponse,
            health::ReadyResponse
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Auth", description = "Login, verification, refresh and logout"),
        (name = "Customers", description = "Customer records"),
        (name = "Accounts", description = "Account opening and transactions"),
        (name = "Permissions", description = "Permission table"),
        (name = "Health", description = "Liveness and readiness")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get_req(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn admin_token(state: &AppState) -> String {
        let crate::auth::AuthClient::Local(service) = state.auth_client() else {
            unreachable!("test state is local");
        };
        service
            .tokens()
            .issue_access_token(&crate::auth::UserIdentity::new("root", "admin", None))
            .unwrap()
    }

    #[tokio::test]
    async fn health_routes_skip_authorization() {
        let app = main_router(AppState::for_tests());
        let (status, body) = send(app.clone(), get_req("/health/live", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, _) = send(app, get_req("/health/ready", None)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_routes_need_a_token() {
        let app = main_router(AppState::for_tests());
        for uri in ["/customers", "/customers/42", "/permissions"] {
            let (status, body) = send(app.clone(), get_req(uri, None)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(body["error"], "missing token");
        }
    }

    #[tokio::test]
    async fn admin_reaches_every_resource() {
        let state = AppState::for_tests();
        let token = admin_token(&state);
        let app = main_router(state);

        let (status, body) = send(app.clone(), get_req("/customers?status=inactive", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(1));

        let (status, body) = send(app.clone(), get_req("/permissions", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["permissions"].as_array().map(Vec::len), Some(5));

        let request = Request::builder()
            .method("POST")
            .uri("/customers/43/account")
            .header("Authorization", format!("Bearer {token}"))
            .header("Content-Type", "application/json")
            .body(Body::from(r#"{"account_type":"saving","amount":5000}"#))
            .unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["account_id"].is_string());
    }

    #[tokio::test]
    async fn login_is_public_and_unknown_paths_are_404() {
        let app = main_router(AppState::for_tests());

        let request = Request::builder()
            .method("POST")
            .uri("/auth/login")
            .body(Body::from("not json"))
            .unwrap();
        let (status, body) = send(app.clone(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid request payload");

        let (status, body) = send(app, get_req("/nowhere", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Route not found");
    }

    #[tokio::test]
    async fn responses_carry_a_request_id() {
        let app = main_router(AppState::for_tests());
        let response = app.oneshot(get_req("/health/live", None)).await.unwrap();
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn auth_router_serves_health() {
        let state = AppState::for_tests();
        let crate::auth::AuthClient::Local(service) = state.auth_client().clone() else {
            unreachable!("test state is local");
        };
        let app = auth_router(AuthState::new(service));
        let (status, body) = send(app, get_req("/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[test]
    fn openapi_lists_protected_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/customers",
            "/customers/{customer_id}",
            "/customers/{customer_id}/account",
            "/customers/{customer_id}/account/{account_id}",
            "/permissions",
            "/auth/login",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path}");
        }
    }
}
