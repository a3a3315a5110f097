// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential storage capability and its in-memory implementation.
//!
//! The auth service only talks to [`CredentialStore`]; the redb-backed
//! implementation lives in [`super::database`]. Refresh tokens are stored
//! by SHA-256 digest, never in the clear, together with their expiry so
//! expired records can be purged.

use std::collections::HashMap;

use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::RwLock;

use super::claims::UserIdentity;
use super::password;
use super::roles::normalize_role;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("background task failed: {0}")]
    Task(String),

    #[error("invalid user record: {0}")]
    InvalidRecord(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        StoreError::Task(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for StoreError {
    fn from(err: argon2::password_hash::Error) -> Self {
        StoreError::Hashing(err.to_string())
    }
}

/// User record as persisted by credential stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredUser {
    pub password_hash: String,
    pub role: String,
    #[serde(default)]
    pub customer_id: Option<String>,
}

impl StoredUser {
    pub fn identity(&self, username: &str) -> UserIdentity {
        UserIdentity::new(username, &self.role, self.customer_id.clone())
    }
}

/// Server-side record of an issued refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshRecord {
    pub username: String,
    /// Unix seconds, copied from the token's `exp`.
    pub expires_at: i64,
}

impl RefreshRecord {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at < now
    }
}

/// A user to create or replace (seeding, tests).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub role: String,
    pub customer_id: Option<String>,
}

impl NewUser {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        role: impl Into<String>,
        customer_id: Option<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            role: role.into(),
            customer_id,
        }
    }

    /// Parse a `username:password:role[:customer_id]` seed entry.
    pub fn parse_seed(entry: &str) -> Option<Self> {
        let mut parts = entry.trim().splitn(4, ':');
        let username = parts.next().filter(|s| !s.is_empty())?;
        let password = parts.next().filter(|s| !s.is_empty())?;
        let role = parts.next().filter(|s| !s.trim().is_empty())?;
        let customer_id = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
        Some(Self::new(username, password, role, customer_id))
    }

    /// Hash the password and normalize the role (runs argon2, call off the
    /// async executor).
    pub fn into_stored(self) -> Result<(String, StoredUser), StoreError> {
        let password_hash = password::hash_password(&self.password)?;
        Ok((
            self.username,
            StoredUser {
                password_hash,
                role: normalize_role(&self.role),
                customer_id: self.customer_id,
            },
        ))
    }
}

/// Key under which a refresh token is recorded.
pub fn token_digest(token: &str) -> String {
    Base64UrlUnpadded::encode_string(&Sha256::digest(token.as_bytes()))
}

/// Check a password against an optional stored user on the blocking pool.
///
/// Unknown users still pay for one hash verification.
pub(crate) async fn authenticate(
    username: &str,
    user: Option<StoredUser>,
    password: &str,
) -> Result<Option<UserIdentity>, StoreError> {
    let username = username.to_string();
    let password = password.to_string();
    let identity = tokio::task::spawn_blocking(move || match user {
        Some(user) if password::verify_password(&password, &user.password_hash) => {
            Some(user.identity(&username))
        }
        Some(_) => None,
        None => {
            password::verify_dummy(&password);
            None
        }
    })
    .await?;
    Ok(identity)
}

/// Credential lookup and refresh-token revocation storage.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up a user by username and password. `None` for an unknown user or
    /// a wrong password; callers cannot tell the two apart.
    async fn find_user(&self, username: &str, password: &str)
        -> Result<Option<UserIdentity>, StoreError>;

    /// Current identity for `username`, without a password check.
    async fn find_identity(&self, username: &str) -> Result<Option<UserIdentity>, StoreError>;

    async fn save_refresh_token(
        &self,
        username: &str,
        token: &str,
        expires_at: i64,
    ) -> Result<(), StoreError>;

    async fn refresh_token_exists(&self, token: &str) -> Result<bool, StoreError>;

    /// Remove a refresh token record. Returns whether a record existed.
    async fn delete_refresh_token(&self, token: &str) -> Result<bool, StoreError>;

    /// Drop every record that expired before `now`. Returns how many went.
    async fn purge_expired_refresh_tokens(&self, now: i64) -> Result<usize, StoreError>;

    async fn upsert_user(&self, user: NewUser) -> Result<(), StoreError>;
}

/// Process-local credential store.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    users: RwLock<HashMap<String, StoredUser>>,
    refresh_tokens: RwLock<HashMap<String, RefreshRecord>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_user(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserIdentity>, StoreError> {
        let user = self.users.read().await.get(username).cloned();
        authenticate(username, user, password).await
    }

    async fn find_identity(&self, username: &str) -> Result<Option<UserIdentity>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .get(username)
            .map(|user| user.identity(username)))
    }

    async fn save_refresh_token(
        &self,
        username: &str,
        token: &str,
        expires_at: i64,
    ) -> Result<(), StoreError> {
        let record = RefreshRecord {
            username: username.to_string(),
            expires_at,
        };
        self.refresh_tokens
            .write()
            .await
            .insert(token_digest(token), record);
        Ok(())
    }

    async fn refresh_token_exists(&self, token: &str) -> Result<bool, StoreError> {
        Ok(self.refresh_tokens.read().await.contains_key(&token_digest(token)))
    }

    async fn delete_refresh_token(&self, token: &str) -> Result<bool, StoreError> {
        Ok(self
            .refresh_tokens
            .write()
            .await
            .remove(&token_digest(token))
            .is_some())
    }

    async fn purge_expired_refresh_tokens(&self, now: i64) -> Result<usize, StoreError> {
        let mut tokens = self.refresh_tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, record| !record.is_expired(now));
        Ok(before - tokens.len())
    }

    async fn upsert_user(&self, user: NewUser) -> Result<(), StoreError> {
        let (username, stored) = tokio::task::spawn_blocking(move || user.into_stored()).await??;
        self.users.write().await.insert(username, stored);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> InMemoryCredentialStore {
        let store = InMemoryCredentialStore::new();
        store
            .upsert_user(NewUser::new("alice", "secret1", "User", Some("42".into())))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn finds_user_with_correct_password() {
        let store = seeded().await;
        let identity = store.find_user("alice", "secret1").await.unwrap().unwrap();
        assert_eq!(identity, UserIdentity::new("alice", "user", Some("42".into())));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_look_the_same() {
        let store = seeded().await;
        assert_eq!(store.find_user("alice", "wrong-pass").await.unwrap(), None);
        assert_eq!(store.find_user("bob", "secret1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn refresh_token_lifecycle() {
        let store = seeded().await;
        assert!(!store.refresh_token_exists("tok").await.unwrap());

        store.save_refresh_token("alice", "tok", i64::MAX).await.unwrap();
        assert!(store.refresh_token_exists("tok").await.unwrap());

        assert!(store.delete_refresh_token("tok").await.unwrap());
        assert!(!store.refresh_token_exists("tok").await.unwrap());
        assert!(!store.delete_refresh_token("tok").await.unwrap());
    }

    #[tokio::test]
    async fn purge_drops_only_expired_records() {
        let store = seeded().await;
        store.save_refresh_token("alice", "old", 99).await.unwrap();
        store.save_refresh_token("alice", "edge", 100).await.unwrap();
        store.save_refresh_token("alice", "new", 200).await.unwrap();

        assert_eq!(store.purge_expired_refresh_tokens(100).await.unwrap(), 1);
        assert!(!store.refresh_token_exists("old").await.unwrap());
        assert!(store.refresh_token_exists("edge").await.unwrap());
        assert!(store.refresh_token_exists("new").await.unwrap());
        assert_eq!(store.purge_expired_refresh_tokens(100).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn find_identity_reflects_updates() {
        let store = seeded().await;
        store
            .upsert_user(NewUser::new("alice", "secret1", "admin", None))
            .await
            .unwrap();
        let identity = store.find_identity("alice").await.unwrap().unwrap();
        assert_eq!(identity.role, "admin");
        assert_eq!(identity.customer_id, None);
    }

    #[test]
    fn parse_seed_entries() {
        assert_eq!(
            NewUser::parse_seed("alice:secret1:user:42"),
            Some(NewUser::new("alice", "secret1", "user", Some("42".into())))
        );
        assert_eq!(
            NewUser::parse_seed(" root:toor99:admin "),
            Some(NewUser::new("root", "toor99", "admin", None))
        );
        assert_eq!(NewUser::parse_seed("alice:secret1"), None);
        assert_eq!(NewUser::parse_seed("::user"), None);
    }

    #[test]
    fn digest_is_stable_and_opaque() {
        let digest = token_digest("abc");
        assert_eq!(digest, token_digest("abc"));
        assert_ne!(digest, "abc");
        assert_eq!(digest.len(), 43);
    }
}
