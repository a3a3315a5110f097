// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Persistent credential store backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: username → serialized [`StoredUser`] (JSON bytes)
//! - `refresh_token_records`: SHA-256 digest of the token → serialized
//!   [`RefreshRecord`] (JSON bytes)
//!
//! Every write is a single redb write transaction, so saving or deleting a
//! refresh token is atomic for that token.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, TableDefinition};

use super::claims::UserIdentity;
use super::store::{
    authenticate, token_digest, CredentialStore, NewUser, RefreshRecord, StoreError, StoredUser,
};

// =============================================================================
// Table Definitions
// =============================================================================

const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

const REFRESH_TOKENS: TableDefinition<&str, &[u8]> = TableDefinition::new("refresh_token_records");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CredentialDbError {
    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CredentialDbResult<T> = Result<T, CredentialDbError>;

impl From<CredentialDbError> for StoreError {
    fn from(err: CredentialDbError) -> Self {
        StoreError::Database(err.to_string())
    }
}

// =============================================================================
// CredentialDatabase
// =============================================================================

/// redb-backed [`CredentialStore`]. Cloning shares the same database handle.
#[derive(Clone)]
pub struct CredentialDatabase {
    db: Arc<Database>,
}

impl CredentialDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> CredentialDbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(REFRESH_TOKENS)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    pub fn get_user(&self, username: &str) -> CredentialDbResult<Option<StoredUser>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        match table.get(username)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn put_user(&self, username: &str, user: &StoredUser) -> CredentialDbResult<()> {
        let json = serde_json::to_vec(user)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(USERS)?;
            table.insert(username, json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn insert_refresh_token(&self, token: &str, record: &RefreshRecord) -> CredentialDbResult<()> {
        let digest = token_digest(token);
        let json = serde_json::to_vec(record)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(REFRESH_TOKENS)?;
            table.insert(digest.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn contains_refresh_token(&self, token: &str) -> CredentialDbResult<bool> {
        let digest = token_digest(token);
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(REFRESH_TOKENS)?;
        Ok(table.get(digest.as_str())?.is_some())
    }

    pub fn remove_refresh_token(&self, token: &str) -> CredentialDbResult<bool> {
        let digest = token_digest(token);
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(REFRESH_TOKENS)?;
            let removed = table.remove(digest.as_str())?;
            removed.is_some()
        };
        write_txn.commit()?;
        Ok(existed)
    }

    /// Delete records that expired before `now`. Unreadable records are kept.
    pub fn purge_expired(&self, now: i64) -> CredentialDbResult<usize> {
        let mut purged = 0;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(REFRESH_TOKENS)?;
            table.retain(|_, value| {
                let expired = serde_json::from_slice::<RefreshRecord>(value)
                    .map(|record| record.is_expired(now))
                    .unwrap_or(false);
                if expired {
                    purged += 1;
                }
                !expired
            })?;
        }
        write_txn.commit()?;
        Ok(purged)
    }

    /// Run a synchronous database call on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&CredentialDatabase) -> CredentialDbResult<T> + Send + 'static,
    {
        let db = self.clone();
        Ok(tokio::task::spawn_blocking(move || f(&db)).await??)
    }
}

#[async_trait]
impl CredentialStore for CredentialDatabase {
    async fn find_user(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserIdentity>, StoreError> {
        let key = username.to_string();
        let user = self.blocking(move |db| db.get_user(&key)).await?;
        authenticate(username, user, password).await
    }

    async fn find_identity(&self, username: &str) -> Result<Option<UserIdentity>, StoreError> {
        let key = username.to_string();
        let user = self.blocking(move |db| db.get_user(&key)).await?;
        Ok(user.map(|u| u.identity(username)))
    }

    async fn save_refresh_token(
        &self,
        username: &str,
        token: &str,
        expires_at: i64,
    ) -> Result<(), StoreError> {
        let token = token.to_string();
        let record = RefreshRecord {
            username: username.to_string(),
            expires_at,
        };
        self.blocking(move |db| db.insert_refresh_token(&token, &record))
            .await
    }

    async fn refresh_token_exists(&self, token: &str) -> Result<bool, StoreError> {
        let token = token.to_string();
        self.blocking(move |db| db.contains_refresh_token(&token)).await
    }

    async fn delete_refresh_token(&self, token: &str) -> Result<bool, StoreError> {
        let token = token.to_string();
        self.blocking(move |db| db.remove_refresh_token(&token)).await
    }

    async fn purge_expired_refresh_tokens(&self, now: i64) -> Result<usize, StoreError> {
        self.blocking(move |db| db.purge_expired(now)).await
    }

    async fn upsert_user(&self, user: NewUser) -> Result<(), StoreError> {
        let (username, stored) = tokio::task::spawn_blocking(move || user.into_stored()).await??;
        self.blocking(move |db| db.put_user(&username, &stored)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_db() -> (CredentialDatabase, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = CredentialDatabase::open(&dir.path().join("credentials.redb")).unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn user_round_trip_with_password_check() {
        let (db, _dir) = temp_db();
        db.upsert_user(NewUser::new("alice", "secret1", "user", Some("42".into())))
            .await
            .unwrap();

        let identity = db.find_user("alice", "secret1").await.unwrap().unwrap();
        assert_eq!(identity, UserIdentity::new("alice", "user", Some("42".into())));
        assert_eq!(db.find_user("alice", "nope-nope").await.unwrap(), None);
        assert_eq!(db.find_user("mallory", "secret1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn stored_hash_is_not_plaintext() {
        let (db, _dir) = temp_db();
        db.upsert_user(NewUser::new("alice", "secret1", "user", None))
            .await
            .unwrap();
        let stored = db.get_user("alice").unwrap().unwrap();
        assert!(!stored.password_hash.contains("secret1"));
    }

    #[tokio::test]
    async fn refresh_tokens_are_revocable() {
        let (db, _dir) = temp_db();
        db.save_refresh_token("alice", "token-1", i64::MAX).await.unwrap();
        db.save_refresh_token("alice", "token-2", i64::MAX).await.unwrap();

        assert!(db.refresh_token_exists("token-1").await.unwrap());
        assert!(db.delete_refresh_token("token-1").await.unwrap());
        assert!(!db.refresh_token_exists("token-1").await.unwrap());
        assert!(db.refresh_token_exists("token-2").await.unwrap());
        assert!(!db.delete_refresh_token("token-1").await.unwrap());
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("credentials.redb");
        {
            let db = CredentialDatabase::open(&path).unwrap();
            let record = RefreshRecord {
                username: "alice".into(),
                expires_at: i64::MAX,
            };
            db.insert_refresh_token("persisted", &record).unwrap();
        }
        let db = CredentialDatabase::open(&path).unwrap();
        assert!(db.contains_refresh_token("persisted").unwrap());
    }

    #[tokio::test]
    async fn purge_removes_expired_records() {
        let (db, _dir) = temp_db();
        db.save_refresh_token("alice", "stale", 1_000).await.unwrap();
        db.save_refresh_token("alice", "live", 5_000).await.unwrap();

        assert_eq!(db.purge_expired_refresh_tokens(2_000).await.unwrap(), 1);
        assert!(!db.refresh_token_exists("stale").await.unwrap());
        assert!(db.refresh_token_exists("live").await.unwrap());
    }
}
