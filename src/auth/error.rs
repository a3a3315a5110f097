// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication and authorization errors.
//!
//! Every variant carries the short, client-safe message that ends up in the
//! response body. Underlying causes are logged where the error is created and
//! never stored here.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Error taxonomy shared by the auth service, the verification client and
/// the authorization middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Malformed request payload or missing required fields (400)
    BadRequest(String),
    /// Input present but failing validation rules (422)
    Validation(String),
    /// Bad credentials, missing/invalid/expired token (401)
    Authentication(String),
    /// Authenticated but not allowed (403)
    Forbidden(String),
    /// No such route or resource (404)
    NotFound(String),
    /// Internal, transport or protocol failure (500)
    Unexpected(String),
    /// Companion auth service unreachable (503)
    ServiceUnavailable(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: &'static str,
}

impl AuthError {
    pub fn unauthorized() -> Self {
        AuthError::Authentication("Unauthorized".to_string())
    }

    pub fn invalid_credentials() -> Self {
        AuthError::Authentication("Invalid credentials".to_string())
    }

    pub fn insufficient_permissions() -> Self {
        AuthError::Forbidden("Insufficient permissions".to_string())
    }

    pub fn internal() -> Self {
        AuthError::Unexpected("Internal server error".to_string())
    }

    /// Rebuild an error from a status code and message relayed by the remote
    /// auth service. Unknown statuses collapse into `Unexpected`.
    pub fn from_status(status: StatusCode, message: String) -> Self {
        match status {
            StatusCode::BAD_REQUEST => AuthError::BadRequest(message),
            StatusCode::UNPROCESSABLE_ENTITY => AuthError::Validation(message),
            StatusCode::UNAUTHORIZED => AuthError::Authentication(message),
            StatusCode::FORBIDDEN => AuthError::Forbidden(message),
            StatusCode::NOT_FOUND => AuthError::NotFound(message),
            StatusCode::SERVICE_UNAVAILABLE => AuthError::ServiceUnavailable(message),
            _ => AuthError::Unexpected(message),
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::BadRequest(_) => "bad_request",
            AuthError::Validation(_) => "validation_error",
            AuthError::Authentication(_) => "authentication_error",
            AuthError::Forbidden(_) => "forbidden",
            AuthError::NotFound(_) => "not_found",
            AuthError::Unexpected(_) => "unexpected_error",
            AuthError::ServiceUnavailable(_) => "service_unavailable",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AuthError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
            AuthError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AuthError::BadRequest(msg)
            | AuthError::Validation(msg)
            | AuthError::Authentication(msg)
            | AuthError::Forbidden(msg)
            | AuthError::NotFound(msg)
            | AuthError::Unexpected(msg)
            | AuthError::ServiceUnavailable(msg) => msg,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error_code: self.error_code(),
            error: match self {
                AuthError::BadRequest(msg)
                | AuthError::Validation(msg)
                | AuthError::Authentication(msg)
                | AuthError::Forbidden(msg)
                | AuthError::NotFound(msg)
                | AuthError::Unexpected(msg)
                | AuthError::ServiceUnavailable(msg) => msg,
            },
        });
        (status, body).into_response()
    }
}
