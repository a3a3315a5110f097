// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verification strategies used by the main API.
//!
//! ## Protocol
//!
//! `GET {auth}/auth/verify?token=..&routeName=..&<params>` answers `200` with
//! `{"isAuthorized": bool, "role": string}` whenever the verification itself
//! ran. The main API maps:
//!
//! - transport timeout or other transport failure → 500
//! - connection refused → 503
//! - any non-200 status → 401
//! - a 200 body that is not a verdict → 500 ("Invalid response format")
//!
//! The in-process strategy reproduces the same externally visible outcomes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use super::claims::Verdict;
use super::error::AuthError;
use super::service::{AuthService, LoginRequest, LoginResponse};

/// Query keys owned by the protocol; route parameters with these names are
/// not forwarded.
pub const RESERVED_PARAMS: &[&str] = &["token", "routeName"];

const VERIFY_FAILED: &str = "Error verifying token";

#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    #[error("invalid auth service url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("failed to build http client: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Deserialize)]
struct RemoteErrorBody {
    error: String,
}

/// HTTP client for the auth server.
#[derive(Clone, Debug)]
pub struct RemoteAuthClient {
    base_url: Url,
    http: reqwest::Client,
}

impl RemoteAuthClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientBuildError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        self.base_url.join(path).map_err(|e| {
            tracing::error!(error = %e, path, "failed to build auth service url");
            AuthError::internal()
        })
    }

    /// Map a transport failure without leaking its cause. `message` is the
    /// generic 500 body for the calling operation.
    fn transport_error(err: reqwest::Error, message: &str) -> AuthError {
        if err.is_connect() {
            tracing::error!(error = %err, "auth service unreachable");
            AuthError::ServiceUnavailable("Authentication service unavailable".to_string())
        } else {
            tracing::error!(error = %err, timeout = err.is_timeout(), "auth service request failed");
            AuthError::Unexpected(message.to_string())
        }
    }

    /// Ask the auth server for a verdict. Not retried.
    pub async fn verify(
        &self,
        token: &str,
        route_name: &str,
        params: &HashMap<String, String>,
    ) -> Result<Verdict, AuthError> {
        let mut url = self.endpoint("auth/verify")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("token", token);
            query.append_pair("routeName", route_name);
            for (key, value) in params {
                if !RESERVED_PARAMS.contains(&key.as_str()) {
                    query.append_pair(key, value);
                }
            }
        }

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Self::transport_error(e, VERIFY_FAILED))?;

        let status = response.status();
        if status != StatusCode::OK {
            tracing::debug!(%status, route_name, "verification refused");
            return Err(AuthError::unauthorized());
        }

        response.json::<Verdict>().await.map_err(|e| {
            if e.is_timeout() {
                Self::transport_error(e, VERIFY_FAILED)
            } else {
                tracing::error!(error = %e, "auth service returned malformed verdict");
                AuthError::Unexpected("Invalid response format".to_string())
            }
        })
    }

    /// Forward a login to the auth server, relaying its status and message.
    pub async fn login(&self, req: &LoginRequest) -> Result<LoginResponse, AuthError> {
        let url = self.endpoint("auth/login")?;
        let response = self
            .http
            .post(url)
            .json(req)
            .send()
            .await
            .map_err(|e| Self::transport_error(e, "Internal server error"))?;

        let status = response.status();
        if status == StatusCode::OK {
            return response.json::<LoginResponse>().await.map_err(|e| {
                tracing::error!(error = %e, "auth service returned malformed login response");
                AuthError::Unexpected("Invalid response format".to_string())
            });
        }

        let message = match response.json::<RemoteErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status.canonical_reason().unwrap_or("Unknown error").to_string(),
        };
        Err(AuthError::from_status(status, message))
    }

    /// Whether the auth server answers its health probe.
    pub async fn ping(&self) -> bool {
        let Ok(url) = self.endpoint("health") else {
            return false;
        };
        match self.http.get(url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "auth service health probe failed");
                false
            }
        }
    }
}

/// How the main API reaches the auth service.
#[derive(Clone)]
pub enum AuthClient {
    /// Same process: call the service directly.
    Local(Arc<AuthService>),
    /// Separate process: call the auth server over HTTP.
    Remote(RemoteAuthClient),
}

impl AuthClient {
    pub fn mode(&self) -> &'static str {
        match self {
            AuthClient::Local(_) => "local",
            AuthClient::Remote(_) => "remote",
        }
    }

    pub async fn verify(
        &self,
        token: &str,
        route_name: &str,
        params: &HashMap<String, String>,
    ) -> Result<Verdict, AuthError> {
        match self {
            // The remote endpoint answers 401 for every failed verification;
            // collapse local failures the same way.
            AuthClient::Local(service) => service
                .verify(token, route_name, params)
                .map_err(|_| AuthError::unauthorized()),
            AuthClient::Remote(remote) => remote.verify(token, route_name, params).await,
        }
    }

    pub async fn login(&self, req: &LoginRequest) -> Result<LoginResponse, AuthError> {
        match self {
            AuthClient::Local(service) => service.login(req).await,
            AuthClient::Remote(remote) => remote.login(req).await,
        }
    }

    /// Readiness of the companion auth service.
    pub async fn ready(&self) -> bool {
        match self {
            AuthClient::Local(_) => true,
            AuthClient::Remote(remote) => remote.ping().await,
        }
    }
}
