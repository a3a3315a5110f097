// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access and refresh token issuance and validation.
//!
//! Both token kinds are HS256 JWTs signed with the process secret. Validation
//! pins the algorithm, so tokens declaring any other `alg` (including `none`)
//! are rejected before their claims are trusted. Expiry is checked with zero
//! leeway: a token is still valid during the second named by its `exp` and
//! expired from the next one.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use super::claims::{AccessClaims, RefreshClaims, TokenType, UserIdentity};
use super::error::AuthError;

/// Shortest refresh token lifetime accepted at startup.
pub const MIN_REFRESH_TTL_DAYS: i64 = 7;
/// Longest refresh token lifetime accepted at startup.
pub const MAX_REFRESH_TTL_DAYS: i64 = 30;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token has expired")]
    Expired,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token algorithm is not accepted")]
    InvalidAlgorithm,

    #[error("token type does not match")]
    WrongType,

    #[error("failed to sign token: {0}")]
    Signing(String),

    #[error("invalid token configuration: {0}")]
    Config(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                TokenError::InvalidAlgorithm
            }
            _ => TokenError::Malformed,
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AuthError::Authentication("Token has expired".to_string()),
            TokenError::Signing(_) | TokenError::Config(_) => {
                tracing::error!(error = %err, "token service failure");
                AuthError::internal()
            }
            _ => AuthError::Authentication("Invalid token".to_string()),
        }
    }
}

/// A freshly minted refresh token and the expiry its store record carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedRefreshToken {
    pub token: String,
    pub expires_at: i64,
}

/// Mints and validates signed tokens. Immutable after construction and cheap
/// to share behind an `Arc`.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::Config("signing secret must not be empty".to_string()));
        }
        if access_ttl <= Duration::zero() {
            return Err(TokenError::Config("access token ttl must be positive".to_string()));
        }
        if refresh_ttl < Duration::days(MIN_REFRESH_TTL_DAYS)
            || refresh_ttl > Duration::days(MAX_REFRESH_TTL_DAYS)
        {
            return Err(TokenError::Config(format!(
                "refresh token ttl must be between {MIN_REFRESH_TTL_DAYS} and {MAX_REFRESH_TTL_DAYS} days"
            )));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            access_ttl,
            refresh_ttl,
        })
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Mint an access token for `identity`, expiring `access_ttl` from now.
    pub fn issue_access_token(&self, identity: &UserIdentity) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = AccessClaims::new(
            identity,
            now.timestamp(),
            (now + self.access_ttl).timestamp(),
        );
        self.sign_access(&claims)
    }

    /// Mint a refresh token for `username`, expiring `refresh_ttl` from now.
    pub fn issue_refresh_token(&self, username: &str) -> Result<IssuedRefreshToken, TokenError> {
        let expires_at = (Utc::now() + self.refresh_ttl).timestamp();
        let token = self.sign_refresh(&RefreshClaims::new(username, expires_at))?;
        Ok(IssuedRefreshToken { token, expires_at })
    }

    pub fn sign_access(&self, claims: &AccessClaims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn sign_refresh(&self, claims: &RefreshClaims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify signature, algorithm and expiry of an access token.
    pub fn parse_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let claims = decode::<AccessClaims>(token, &self.decoding_key, &self.validation)?.claims;
        if claims.token_type != TokenType::Access {
            return Err(TokenError::WrongType);
        }
        Ok(claims)
    }

    /// Verify signature, algorithm and expiry of a refresh token.
    pub fn parse_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        let claims = decode::<RefreshClaims>(token, &self.decoding_key, &self.validation)?.claims;
        if claims.token_type != TokenType::Refresh {
            return Err(TokenError::WrongType);
        }
        Ok(claims)
    }
}
