// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Login, refresh, verification and logout.
//!
//! `AuthService` is the only component that holds the signing secret. The
//! main API reaches it either in-process or through the auth server's HTTP
//! endpoints (see [`super::client`]).

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::claims::Verdict;
use super::error::AuthError;
use super::ownership::{verify_customer_access, CUSTOMER_ID_PARAM};
use super::password::MIN_PASSWORD_LENGTH;
use super::permissions::PermissionPolicy;
use super::store::{CredentialStore, StoreError};
use super::token::{TokenError, TokenService};

/// Upper bound on any single credential store round-trip.
pub const STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Login request body. Missing fields decode as empty strings so they are
/// reported as validation failures rather than decode failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RefreshResponse {
    pub token: String,
}

pub struct AuthService {
    tokens: TokenService,
    policy: PermissionPolicy,
    store: Arc<dyn CredentialStore>,
    store_timeout: Duration,
}

impl AuthService {
    pub fn new(tokens: TokenService, policy: PermissionPolicy, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            tokens,
            policy,
            store,
            store_timeout: STORE_TIMEOUT,
        }
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Await a store call under the store timeout, logging the cause of any
    /// failure and reducing it to a generic internal error.
    async fn store_call<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, AuthError> {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                tracing::error!(op, error = %e, "credential store failure");
                Err(AuthError::internal())
            }
            Err(_) => {
                tracing::error!(op, timeout_ms = self.store_timeout.as_millis() as u64, "credential store timed out");
                Err(AuthError::internal())
            }
        }
    }

    /// Authenticate a username/password pair and mint both tokens.
    pub async fn login(&self, req: &LoginRequest) -> Result<LoginResponse, AuthError> {
        if req.username.is_empty() || req.password.is_empty() {
            return Err(AuthError::BadRequest(
                "Username and password are required".to_string(),
            ));
        }
        if req.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::Validation(format!(
                "Insufficient password length, minimum {MIN_PASSWORD_LENGTH} characters required"
            )));
        }

        let identity = self
            .store_call("find_user", self.store.find_user(&req.username, &req.password))
            .await?
            .ok_or_else(|| {
                tracing::info!(username = %req.username, "login rejected");
                AuthError::invalid_credentials()
            })?;

        let token = self.tokens.issue_access_token(&identity)?;
        let refresh = self.tokens.issue_refresh_token(&identity.username)?;

        self.store_call(
            "save_refresh_token",
            self.store
                .save_refresh_token(&identity.username, &refresh.token, refresh.expires_at),
        )
        .await?;

        tracing::info!(username = %identity.username, role = %identity.role, "login succeeded");
        Ok(LoginResponse {
            token,
            refresh_token: refresh.token,
        })
    }

    /// Exchange a stored, unexpired refresh token for a new access token.
    ///
    /// Role and customer id come from a fresh store lookup, never from the
    /// refresh token itself.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, AuthError> {
        let invalid = || AuthError::Authentication("invalid refresh token".to_string());

        if refresh_token.is_empty() {
            return Err(invalid());
        }

        let exists = self
            .store_call("refresh_token_exists", self.store.refresh_token_exists(refresh_token))
            .await?;
        if !exists {
            return Err(invalid());
        }

        let claims = match self.tokens.parse_refresh(refresh_token) {
            Ok(claims) => claims,
            Err(TokenError::Expired) => {
                self.store_call(
                    "delete_refresh_token",
                    self.store.delete_refresh_token(refresh_token),
                )
                .await?;
                tracing::debug!("expired refresh token dropped");
                return Err(AuthError::Authentication("refresh token expired".to_string()));
            }
            Err(_) => return Err(invalid()),
        };

        let identity = self
            .store_call("find_identity", self.store.find_identity(&claims.username))
            .await?
            .ok_or_else(|| {
                tracing::warn!(username = %claims.username, "refresh for unknown user");
                invalid()
            })?;

        let token = self.tokens.issue_access_token(&identity)?;
        tracing::debug!(username = %identity.username, "access token refreshed");
        Ok(RefreshResponse { token })
    }

    /// Decide whether `token` may perform `route_name` with the given route
    /// and query parameters.
    ///
    /// An invalid token is an error; an authenticated caller lacking the role
    /// or ownership yields a negative verdict.
    pub fn verify(
        &self,
        token: &str,
        route_name: &str,
        params: &HashMap<String, String>,
    ) -> Result<Verdict, AuthError> {
        let claims = self.tokens.parse_access(token).map_err(|e| {
            tracing::debug!(error = %e, route_name, "token rejected");
            AuthError::from(e)
        })?;

        if !self.policy.is_authorized_for(&claims.role, route_name) {
            tracing::info!(username = %claims.username, role = %claims.role, route_name, "role not permitted");
            return Ok(Verdict::deny(claims.role));
        }

        if self.policy.requires_ownership(route_name) {
            let requested = params.get(CUSTOMER_ID_PARAM).map(String::as_str);
            if let Err(e) = verify_customer_access(&claims, requested) {
                tracing::info!(username = %claims.username, route_name, reason = %e, "ownership check failed");
                return Ok(Verdict::deny(claims.role));
            }
        }

        Ok(Verdict::allow(claims.role))
    }

    /// Revoke a refresh token. Unknown tokens are not an error.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        if refresh_token.is_empty() {
            return Ok(());
        }
        let existed = self
            .store_call("delete_refresh_token", self.store.delete_refresh_token(refresh_token))
            .await?;
        tracing::debug!(existed, "refresh token revoked");
        Ok(())
    }

    /// Delete every refresh record whose token has expired.
    pub async fn purge_expired(&self) -> Result<usize, AuthError> {
        let now = Utc::now().timestamp();
        let purged = self
            .store_call(
                "purge_expired_refresh_tokens",
                self.store.purge_expired_refresh_tokens(now),
            )
            .await?;
        if purged > 0 {
            tracing::info!(purged, "expired refresh tokens purged");
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::{InMemoryCredentialStore, NewUser};
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;

    use crate::auth::claims::{RefreshClaims, UserIdentity};

    async fn service() -> AuthService {
        let store = InMemoryCredentialStore::new();
        store
            .upsert_user(NewUser::new("alice", "secret1", "user", Some("42".into())))
            .await
            .unwrap();
        store
            .upsert_user(NewUser::new("root", "rootpass", "admin", None))
            .await
            .unwrap();
        let tokens =
            TokenService::new("service-test-secret", ChronoDuration::hours(24), ChronoDuration::days(30))
                .unwrap();
        AuthService::new(tokens, PermissionPolicy::with_defaults(true), Arc::new(store))
    }

    fn login_req(username: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username: username.into(),
            password: password.into(),
        }
    }

    fn params(customer_id: &str) -> HashMap<String, String> {
        HashMap::from([(CUSTOMER_ID_PARAM.to_string(), customer_id.to_string())])
    }

    #[tokio::test]
    async fn login_issues_tokens_with_identity() {
        let svc = service().await;
        let resp = svc.login(&login_req("alice", "secret1")).await.unwrap();

        let claims = svc.tokens().parse_access(&resp.token).unwrap();
        assert_eq!(claims.role, "user");
        assert_eq!(claims.customer_id.as_deref(), Some("42"));
        assert!(svc.store().refresh_token_exists(&resp.refresh_token).await.unwrap());
    }

    #[tokio::test]
    async fn login_validation_errors() {
        let svc = service().await;
        assert!(matches!(
            svc.login(&login_req("", "secret1")).await,
            Err(AuthError::BadRequest(_))
        ));
        assert!(matches!(
            svc.login(&login_req("alice", "")).await,
            Err(AuthError::BadRequest(_))
        ));
        assert!(matches!(
            svc.login(&login_req("alice", "short")).await,
            Err(AuthError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn credential_errors_are_uniform() {
        let svc = service().await;
        let unknown = svc.login(&login_req("nobody", "secret1")).await.unwrap_err();
        let wrong = svc.login(&login_req("alice", "secret2")).await.unwrap_err();
        assert_eq!(unknown, wrong);
        assert_eq!(unknown, AuthError::invalid_credentials());
    }

    #[tokio::test]
    async fn refresh_mints_new_access_token() {
        let svc = service().await;
        let login = svc.login(&login_req("alice", "secret1")).await.unwrap();
        let refreshed = svc.refresh(&login.refresh_token).await.unwrap();
        let claims = svc.tokens().parse_access(&refreshed.token).unwrap();
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.customer_id.as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn revoked_refresh_token_is_rejected() {
        let svc = service().await;
        let login = svc.login(&login_req("alice", "secret1")).await.unwrap();
        svc.logout(&login.refresh_token).await.unwrap();

        assert_eq!(
            svc.refresh(&login.refresh_token).await,
            Err(AuthError::Authentication("invalid refresh token".into()))
        );
    }

    #[tokio::test]
    async fn unstored_refresh_token_is_rejected_even_if_signed() {
        let svc = service().await;
        let token = svc.tokens().issue_refresh_token("alice").unwrap().token;
        assert_eq!(
            svc.refresh(&token).await,
            Err(AuthError::Authentication("invalid refresh token".into()))
        );
    }

    #[tokio::test]
    async fn expired_refresh_token_is_rejected_and_forgotten() {
        let svc = service().await;
        let exp = Utc::now().timestamp() - 5;
        let expired = svc
            .tokens()
            .sign_refresh(&RefreshClaims::new("alice", exp))
            .unwrap();
        svc.store().save_refresh_token("alice", &expired, exp).await.unwrap();

        assert_eq!(
            svc.refresh(&expired).await,
            Err(AuthError::Authentication("refresh token expired".into()))
        );
        assert!(!svc.store().refresh_token_exists(&expired).await.unwrap());
    }

    #[tokio::test]
    async fn purge_expired_keeps_live_sessions() {
        let svc = service().await;
        let live = svc.login(&login_req("alice", "secret1")).await.unwrap();
        let exp = Utc::now().timestamp() - 60;
        let stale = svc
            .tokens()
            .sign_refresh(&RefreshClaims::new("alice", exp))
            .unwrap();
        svc.store().save_refresh_token("alice", &stale, exp).await.unwrap();

        assert_eq!(svc.purge_expired().await.unwrap(), 1);
        assert!(!svc.store().refresh_token_exists(&stale).await.unwrap());
        assert!(svc.refresh(&live.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn concurrent_sessions_are_revoked_independently() {
        let svc = service().await;
        let first = svc.login(&login_req("alice", "secret1")).await.unwrap();
        let second = svc.login(&login_req("alice", "secret1")).await.unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);

        svc.logout(&first.refresh_token).await.unwrap();

        assert_eq!(
            svc.refresh(&first.refresh_token).await,
            Err(AuthError::Authentication("invalid refresh token".into()))
        );
        let refreshed = svc.refresh(&second.refresh_token).await.unwrap();
        assert_eq!(svc.tokens().parse_access(&refreshed.token).unwrap().username, "alice");
    }

    #[tokio::test]
    async fn refresh_rederives_role_from_store() {
        let svc = service().await;
        let login = svc.login(&login_req("alice", "secret1")).await.unwrap();
        svc.store()
            .upsert_user(NewUser::new("alice", "secret1", "user", Some("77".into())))
            .await
            .unwrap();

        let refreshed = svc.refresh(&login.refresh_token).await.unwrap();
        let claims = svc.tokens().parse_access(&refreshed.token).unwrap();
        assert_eq!(claims.customer_id.as_deref(), Some("77"));
    }

    #[tokio::test]
    async fn verify_applies_role_and_ownership() {
        let svc = service().await;
        let user = svc.login(&login_req("alice", "secret1")).await.unwrap().token;
        let admin = svc.login(&login_req("root", "rootpass")).await.unwrap().token;

        assert_eq!(svc.verify(&user, "GetCustomer", &params("42")), Ok(Verdict::allow("user")));
        assert_eq!(svc.verify(&user, "GetCustomer", &params("43")), Ok(Verdict::deny("user")));
        assert_eq!(svc.verify(&user, "GetAllCustomers", &HashMap::new()), Ok(Verdict::deny("user")));
        assert_eq!(svc.verify(&user, "GetCustomer", &HashMap::new()), Ok(Verdict::deny("user")));

        assert_eq!(svc.verify(&admin, "GetCustomer", &params("43")), Ok(Verdict::allow("admin")));
        assert_eq!(svc.verify(&admin, "GetAllCustomers", &HashMap::new()), Ok(Verdict::allow("admin")));
    }

    #[tokio::test]
    async fn verify_rejects_bad_token() {
        let svc = service().await;
        let err = svc.verify("not-a-token", "GetCustomer", &params("42")).unwrap_err();
        assert_eq!(err.status_code().as_u16(), 401);
    }

    struct FailingStore;

    #[async_trait]
    impl CredentialStore for FailingStore {
        async fn find_user(&self, _: &str, _: &str) -> Result<Option<UserIdentity>, StoreError> {
            Ok(Some(UserIdentity::new("alice", "user", Some("42".into()))))
        }
        async fn find_identity(&self, _: &str) -> Result<Option<UserIdentity>, StoreError> {
            Err(StoreError::Database("connection reset".into()))
        }
        async fn save_refresh_token(&self, _: &str, _: &str, _: i64) -> Result<(), StoreError> {
            Err(StoreError::Database("disk full".into()))
        }
        async fn refresh_token_exists(&self, _: &str) -> Result<bool, StoreError> {
            std::future::pending().await
        }
        async fn delete_refresh_token(&self, _: &str) -> Result<bool, StoreError> {
            Ok(false)
        }
        async fn purge_expired_refresh_tokens(&self, _: i64) -> Result<usize, StoreError> {
            Err(StoreError::Database("table locked".into()))
        }
        async fn upsert_user(&self, _: NewUser) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn failing_service() -> AuthService {
        let tokens =
            TokenService::new("service-test-secret", ChronoDuration::hours(24), ChronoDuration::days(30))
                .unwrap();
        AuthService::new(tokens, PermissionPolicy::default(), Arc::new(FailingStore))
            .with_store_timeout(Duration::from_millis(50))
    }

    #[tokio::test]
    async fn failed_refresh_save_fails_login() {
        let err = failing_service()
            .login(&login_req("alice", "secret1"))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::internal());
        assert!(!err.message().contains("disk full"));
    }

    #[tokio::test]
    async fn hanging_store_times_out() {
        let started = std::time::Instant::now();
        let err = failing_service().refresh("anything").await.unwrap_err();
        assert_eq!(err, AuthError::internal());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn purge_failure_is_internal() {
        let err = failing_service().purge_expired().await.unwrap_err();
        assert_eq!(err, AuthError::internal());
    }

    #[tokio::test]
    async fn logout_of_unknown_token_succeeds() {
        assert!(failing_service().logout("never-issued").await.is_ok());
    }
}
