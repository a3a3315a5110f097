// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token claims, user identity and the verification verdict.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Who a caller is, as loaded from the credential store at login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub username: String,
    pub role: String,
    /// Absent for staff accounts that are not tied to a customer record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
}

impl UserIdentity {
    pub fn new(
        username: impl Into<String>,
        role: impl Into<String>,
        customer_id: Option<String>,
    ) -> Self {
        Self {
            username: username.into(),
            role: role.into(),
            customer_id,
        }
    }
}

/// Discriminates access tokens from refresh tokens signed with the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Payload of an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub username: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiration (unix seconds)
    pub exp: i64,
    #[serde(rename = "type")]
    pub token_type: TokenType,
}

impl AccessClaims {
    pub fn new(identity: &UserIdentity, iat: i64, exp: i64) -> Self {
        Self {
            username: identity.username.clone(),
            role: identity.role.clone(),
            customer_id: identity.customer_id.clone(),
            iat,
            exp,
            token_type: TokenType::Access,
        }
    }

    pub fn identity(&self) -> UserIdentity {
        UserIdentity::new(&self.username, &self.role, self.customer_id.clone())
    }
}

/// Payload of a refresh token. Carries no role so a refresh can never replay
/// stale privileges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub username: String,
    pub exp: i64,
    /// Unique per issued token, so two logins in the same second still get
    /// separate revocation records.
    pub jti: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
}

impl RefreshClaims {
    pub fn new(username: impl Into<String>, exp: i64) -> Self {
        Self {
            username: username.into(),
            exp,
            jti: Uuid::new_v4().to_string(),
            token_type: TokenType::Refresh,
        }
    }
}

/// Result of a verification call; the only state that crosses the process
/// boundary between the main API and the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Verdict {
    #[serde(rename = "isAuthorized")]
    pub is_authorized: bool,
    pub role: String,
}

impl Verdict {
    pub fn allow(role: impl Into<String>) -> Self {
        Self {
            is_authorized: true,
            role: role.into(),
        }
    }

    pub fn deny(role: impl Into<String>) -> Self {
        Self {
            is_authorized: false,
            role: role.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_claims_omit_missing_customer_id() {
        let admin = UserIdentity::new("root", "admin", None);
        let json = serde_json::to_value(AccessClaims::new(&admin, 1, 2)).unwrap();
        assert!(json.get("customer_id").is_none());
        assert_eq!(json["type"], "access");
    }

    #[test]
    fn refresh_claims_wire_shape() {
        let claims = RefreshClaims::new("alice", 10);
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"username": "alice", "exp": 10, "jti": claims.jti, "type": "refresh"})
        );
        assert!(json.get("role").is_none());
    }

    #[test]
    fn refresh_claims_get_distinct_ids() {
        let a = RefreshClaims::new("alice", 10);
        let b = RefreshClaims::new("alice", 10);
        assert_ne!(a.jti, b.jti);
        assert!(Uuid::parse_str(&a.jti).is_ok());
    }

    #[test]
    fn verdict_uses_camel_case_flag() {
        let json = serde_json::to_string(&Verdict::allow("user")).unwrap();
        assert_eq!(json, r#"{"isAuthorized":true,"role":"user"}"#);
    }

    #[test]
    fn verdict_rejects_wrong_types() {
        assert!(serde_json::from_str::<Verdict>(r#"{"isAuthorized":"yes","role":"user"}"#).is_err());
        assert!(serde_json::from_str::<Verdict>(r#"{"role":"user"}"#).is_err());
        assert!(serde_json::from_str::<Verdict>(r#"{"isAuthorized":true}"#).is_err());
    }
}
