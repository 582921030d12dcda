// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts consumed by the filesystem core. Identities and
//! settings belong to the (external) user store and are read-only here;
//! share records are owned by this crate.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `IdentityRepository` | `Identity` | `InMemoryIdentityRepository` |
//! | `UserSettingsRepository` | per-user settings | `InMemoryUserSettingsRepository` |
//! | `PublicShareRepository` | `PublicShare` | `InMemoryPublicShareRepository`, `PostgresPublicShareRepository` |
//! | `DirectShareRepository` | `DirectShare` | `InMemoryDirectShareRepository`, `PostgresDirectShareRepository` |
//!
//! Trash records are not listed: they live on disk next to the trashed
//! payload.

use crate::domain::identity::{Identity, UserId};
use crate::domain::share::{DirectShare, DirectShareId, PublicShare, ShareToken};
use async_trait::async_trait;

/// Setting key holding the trash retention period in days.
pub const TRASH_RETENTION_SETTING: &str = "trashRetentionPeriod";

#[async_trait]
pub trait IdentityRepository: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<Identity>, RepositoryError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, RepositoryError>;
}

/// Per-user key/value settings owned by the user store.
#[async_trait]
pub trait UserSettingsRepository: Send + Sync {
    async fn get_setting(&self, user: UserId, key: &str) -> Result<Option<String>, RepositoryError>;
}

#[async_trait]
pub trait PublicShareRepository: Send + Sync {
    /// Persist a share together with its item list, atomically.
    async fn save(&self, share: &PublicShare) -> Result<(), RepositoryError>;

    async fn find_by_token(&self, token: &ShareToken) -> Result<Option<PublicShare>, RepositoryError>;

    /// Newest first.
    async fn find_by_owner(&self, owner: UserId) -> Result<Vec<PublicShare>, RepositoryError>;

    /// Delete a share and its items. Returns false if it did not exist.
    async fn delete(&self, token: &ShareToken) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait DirectShareRepository: Send + Sync {
    /// Fails with `Duplicate` if (sharer, recipient, root_path) already exists.
    async fn insert(&self, share: &DirectShare) -> Result<(), RepositoryError>;

    async fn exists(
        &self,
        sharer: UserId,
        recipient: UserId,
        root_path: &str,
    ) -> Result<bool, RepositoryError>;

    async fn find_by_id(&self, id: DirectShareId) -> Result<Option<DirectShare>, RepositoryError>;

    async fn find_by_recipient(&self, recipient: UserId) -> Result<Vec<DirectShare>, RepositoryError>;

    async fn find_by_sharer(&self, sharer: UserId) -> Result<Vec<DirectShare>, RepositoryError>;

    /// Delete those of `ids` where `requester` is the sharer or the
    /// recipient. Returns the ids actually deleted.
    async fn delete_for_party(
        &self,
        ids: &[DirectShareId],
        requester: UserId,
    ) -> Result<Vec<DirectShareId>, RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound(err.to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Duplicate(db.message().to_string())
            }
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}
