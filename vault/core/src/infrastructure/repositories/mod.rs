// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the repository traits defined in
//! [`crate::domain::repository`].
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve identities, settings and shares
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! ## PostgreSQL Repositories
//! - **PostgresPublicShareRepository** - Public links and their items
//! - **PostgresDirectShareRepository** - User-to-user shares
//!
//! ## In-Memory Repositories
//!
//! HashMap-backed implementations of every trait, used by the CLI and in
//! tests. Identities and settings are owned by the external user store, so
//! the in-memory variants expose `insert`/`set` for seeding.

pub mod postgres_share;

pub use postgres_share::{PostgresDirectShareRepository, PostgresPublicShareRepository};

use crate::domain::identity::{Identity, UserId};
use crate::domain::repository::{
    DirectShareRepository, IdentityRepository, PublicShareRepository, RepositoryError,
    UserSettingsRepository,
};
use crate::domain::share::{DirectShare, DirectShareId, PublicShare, ShareToken};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct InMemoryIdentityRepository {
    identities: Arc<RwLock<HashMap<UserId, Identity>>>,
}

impl InMemoryIdentityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, identity: Identity) {
        self.identities.write().insert(identity.id, identity);
    }
}

#[async_trait]
impl IdentityRepository for InMemoryIdentityRepository {
    async fn find_by_id(&self, id: UserId) -> Result<Option<Identity>, RepositoryError> {
        Ok(self.identities.read().get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, RepositoryError> {
        Ok(self
            .identities
            .read()
            .values()
            .find(|identity| identity.username == username)
            .cloned())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryUserSettingsRepository {
    settings: Arc<RwLock<HashMap<(UserId, String), String>>>,
}

impl InMemoryUserSettingsRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, user: UserId, key: &str, value: impl Into<String>) {
        self.settings.write().insert((user, key.to_string()), value.into());
    }
}

#[async_trait]
impl UserSettingsRepository for InMemoryUserSettingsRepository {
    async fn get_setting(&self, user: UserId, key: &str) -> Result<Option<String>, RepositoryError> {
        Ok(self.settings.read().get(&(user, key.to_string())).cloned())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryPublicShareRepository {
    shares: Arc<RwLock<HashMap<ShareToken, PublicShare>>>,
}

impl InMemoryPublicShareRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PublicShareRepository for InMemoryPublicShareRepository {
    async fn save(&self, share: &PublicShare) -> Result<(), RepositoryError> {
        let mut shares = self.shares.write();
        if shares.contains_key(&share.token) {
            return Err(RepositoryError::Duplicate(format!("share token {}", share.token)));
        }
        shares.insert(share.token.clone(), share.clone());
        Ok(())
    }

    async fn find_by_token(&self, token: &ShareToken) -> Result<Option<PublicShare>, RepositoryError> {
        Ok(self.shares.read().get(token).cloned())
    }

    async fn find_by_owner(&self, owner: UserId) -> Result<Vec<PublicShare>, RepositoryError> {
        let mut shares: Vec<PublicShare> = self
            .shares
            .read()
            .values()
            .filter(|share| share.owner == owner)
            .cloned()
            .collect();
        shares.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(shares)
    }

    async fn delete(&self, token: &ShareToken) -> Result<bool, RepositoryError> {
        Ok(self.shares.write().remove(token).is_some())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryDirectShareRepository {
    shares: Arc<RwLock<HashMap<DirectShareId, DirectShare>>>,
}

impl InMemoryDirectShareRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DirectShareRepository for InMemoryDirectShareRepository {
    async fn insert(&self, share: &DirectShare) -> Result<(), RepositoryError> {
        let mut shares = self.shares.write();
        let duplicate = shares.values().any(|existing| {
            existing.sharer == share.sharer
                && existing.recipient == share.recipient
                && existing.root_path == share.root_path
        });
        if duplicate {
            return Err(RepositoryError::Duplicate(format!(
                "{} already shared with {}",
                share.root_path, share.recipient
            )));
        }
        shares.insert(share.id, share.clone());
        Ok(())
    }

    async fn exists(
        &self,
        sharer: UserId,
        recipient: UserId,
        root_path: &str,
    ) -> Result<bool, RepositoryError> {
        Ok(self.shares.read().values().any(|share| {
            share.sharer == sharer && share.recipient == recipient && share.root_path == root_path
        }))
    }

    async fn find_by_id(&self, id: DirectShareId) -> Result<Option<DirectShare>, RepositoryError> {
        Ok(self.shares.read().get(&id).cloned())
    }

    async fn find_by_recipient(&self, recipient: UserId) -> Result<Vec<DirectShare>, RepositoryError> {
        let mut shares: Vec<DirectShare> = self
            .shares
            .read()
            .values()
            .filter(|share| share.recipient == recipient)
            .cloned()
            .collect();
        shares.sort_by(|a, b| b.shared_at.cmp(&a.shared_at));
        Ok(shares)
    }

    async fn find_by_sharer(&self, sharer: UserId) -> Result<Vec<DirectShare>, RepositoryError> {
        let mut shares: Vec<DirectShare> = self
            .shares
            .read()
            .values()
            .filter(|share| share.sharer == sharer)
            .cloned()
            .collect();
        shares.sort_by(|a, b| b.shared_at.cmp(&a.shared_at));
        Ok(shares)
    }

    async fn delete_for_party(
        &self,
        ids: &[DirectShareId],
        requester: UserId,
    ) -> Result<Vec<DirectShareId>, RepositoryError> {
        let mut shares = self.shares.write();
        let mut deleted = Vec::new();
        for id in ids {
            let permitted = shares.get(id).map(|share| share.involves(requester)).unwrap_or(false);
            if permitted && shares.remove(id).is_some() {
                deleted.push(*id);
            }
        }
        Ok(deleted)
    }
}
