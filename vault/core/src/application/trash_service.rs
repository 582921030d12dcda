// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Trash Application Service
//!
//! Soft delete for an identity's own tree. Deletions move items into
//! `<trash_base>/<owner>/<id>` next to a `.trashinfo` sidecar; restore
//! re-resolves the recorded path through the [`PathResolver`], so a
//! restored item is subject to the same containment rules as any other
//! write.
//!
//! Retention is enforced lazily: listing the trash first purges entries
//! older than the owner's `trashRetentionPeriod` setting. There is no
//! background timer.
//!
//! Batch operations never abort on a single item. Per-item failures are
//! collected in the returned [`BatchOutcome`] while successful items stay
//! committed.

use crate::domain::errors::{BatchOutcome, VfsError};
use crate::domain::events::{AccessEvent, TrashEvent};
use crate::domain::identity::{Identity, UserId};
use crate::domain::path_resolver::PathResolver;
use crate::domain::repository::{UserSettingsRepository, TRASH_RETENTION_SETTING};
use crate::domain::storage::{StorageError, StorageProvider};
use crate::domain::trash::{RetentionPolicy, TrashEntry, TrashId, TrashInfo, TrashLayout};
use crate::infrastructure::event_bus::EventBus;
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Sidecars are a few hundred bytes; anything larger is not ours.
const MAX_SIDECAR_BYTES: u64 = 64 * 1024;

// ============================================================================
// Service Trait
// ============================================================================

#[async_trait]
pub trait TrashService: Send + Sync {
    /// Move items of the caller's tree into the trash. Returns the new ids.
    async fn trash(
        &self,
        user: UserId,
        paths: &[String],
        request_elevated_root: bool,
    ) -> Result<BatchOutcome<TrashId>, VfsError>;

    /// Apply retention, then list remaining entries sorted by id.
    async fn list(&self, user: UserId) -> Result<Vec<TrashEntry>, VfsError>;

    /// Move entries back to their original paths. Returns the restored paths.
    async fn restore(&self, user: UserId, ids: &[String]) -> Result<BatchOutcome<String>, VfsError>;

    /// Permanently delete entries. Already purged ids succeed silently.
    async fn purge(&self, user: UserId, ids: &[String]) -> Result<BatchOutcome<TrashId>, VfsError>;

    /// Remove everything in the caller's trash.
    async fn empty(&self, user: UserId) -> Result<(), VfsError>;

    /// Purge entries past the owner's retention window. Returns the count.
    async fn purge_expired(&self, user: UserId) -> Result<usize, VfsError>;
}

// ============================================================================
// Standard Implementation
// ============================================================================

pub struct StandardTrashService {
    resolver: Arc<PathResolver>,
    storage: Arc<dyn StorageProvider>,
    settings: Arc<dyn UserSettingsRepository>,
    event_bus: Arc<EventBus>,
    trash_base: PathBuf,
}

impl StandardTrashService {
    pub fn new(
        resolver: Arc<PathResolver>,
        storage: Arc<dyn StorageProvider>,
        settings: Arc<dyn UserSettingsRepository>,
        event_bus: Arc<EventBus>,
        trash_base: impl Into<PathBuf>,
    ) -> Self {
        Self {
            resolver,
            storage,
            settings,
            event_bus,
            trash_base: trash_base.into(),
        }
    }

    fn layout(&self, user: UserId) -> TrashLayout {
        TrashLayout::new(&self.trash_base, user)
    }

    async fn retention_policy(&self, user: UserId) -> RetentionPolicy {
        match self.settings.get_setting(user, TRASH_RETENTION_SETTING).await {
            Ok(value) => RetentionPolicy::from_setting(value.as_deref()),
            Err(e) => {
                warn!(user = %user, error = %e, "Could not read trash retention setting");
                RetentionPolicy::disabled()
            }
        }
    }

    async fn read_info(&self, sidecar: &Path) -> Result<TrashInfo, VfsError> {
        let bytes = self.storage.read_file(sidecar, MAX_SIDECAR_BYTES).await?;
        TrashInfo::from_json(&bytes)
            .map_err(|e| VfsError::UpstreamIo(format!("Unreadable trash record: {}", e)))
    }

    /// Ids of every sidecar in the trash area, sorted.
    async fn sidecar_ids(&self, layout: &TrashLayout) -> Result<Vec<TrashId>, VfsError> {
        if !self.storage.exists(layout.dir()).await {
            return Ok(Vec::new());
        }
        let mut ids: Vec<TrashId> = self
            .storage
            .read_dir(layout.dir())
            .await?
            .iter()
            .filter_map(|entry| TrashLayout::id_from_sidecar(&entry.name))
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Remove a path, treating "already gone" as success.
    async fn remove_if_present(&self, path: &Path) -> Result<bool, StorageError> {
        match self.storage.remove_entry(path).await {
            Ok(()) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn audit(&self, user: UserId, path: &str, context: &str, err: &VfsError) {
        if matches!(err, VfsError::OutOfBounds) {
            self.event_bus.publish_access_event(AccessEvent::AccessRejected {
                user: Some(user),
                attempted_path: path.to_string(),
                context: context.to_string(),
                rejected_at: Utc::now(),
            });
        }
    }

    async fn trash_one(
        &self,
        identity: &Identity,
        layout: &TrashLayout,
        path: &str,
        request_elevated_root: bool,
    ) -> Result<TrashId, VfsError> {
        let resolved = self.resolver.resolve_for(identity, path, request_elevated_root)?;
        if resolved.is_root() {
            return Err(VfsError::InvalidInput("Cannot trash the root directory".to_string()));
        }
        if !self.storage.exists(&resolved.real).await {
            return Err(VfsError::inaccessible());
        }
        if layout.dir().starts_with(&resolved.real) {
            return Err(VfsError::InvalidInput(
                "Cannot trash a directory that contains the trash".to_string(),
            ));
        }

        let original_name = resolved
            .real
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let id = TrashId::new();
        let info = TrashInfo::new(path, &original_name, resolved.escaped_sandbox());
        let record = info
            .to_json()
            .map_err(|e| VfsError::UpstreamIo(format!("Could not encode trash record: {}", e)))?;

        let sidecar = layout.sidecar(&id);
        self.storage.write_file(&sidecar, &record).await?;

        if let Err(e) = self.storage.move_entry(&resolved.real, &layout.payload(&id)).await {
            if let Err(cleanup) = self.storage.remove_entry(&sidecar).await {
                warn!(trash_id = %id, error = %cleanup, "Could not remove orphaned trash record");
            }
            return Err(e.into());
        }

        self.event_bus.publish_trash_event(TrashEvent::ItemTrashed {
            owner: identity.id,
            trash_id: id.clone(),
            original_path: path.to_string(),
            escaped_sandbox: info.escaped_sandbox,
            trashed_at: Utc::now(),
        });
        Ok(id)
    }

    async fn restore_one(
        &self,
        identity: &Identity,
        layout: &TrashLayout,
        raw_id: &str,
    ) -> Result<String, VfsError> {
        let id = TrashId::parse(raw_id)
            .ok_or_else(|| VfsError::InvalidInput(format!("Invalid trash id: {}", raw_id)))?;
        let sidecar = layout.sidecar(&id);
        let payload = layout.payload(&id);
        if !self.storage.exists(&sidecar).await || !self.storage.exists(&payload).await {
            return Err(VfsError::NotFound(format!("Trashed item not found: {}", raw_id)));
        }

        let info = self.read_info(&sidecar).await?;
        let target = self
            .resolver
            .resolve_recorded(identity, &info.original_path, info.escaped_sandbox)?;
        if target.is_root() {
            return Err(VfsError::InvalidInput(format!(
                "Invalid restore path for {}",
                info.original_name
            )));
        }
        if self.storage.exists(&target.real).await {
            return Err(VfsError::Conflict(format!(
                "Item already exists at original location for {}",
                info.original_name
            )));
        }

        if let Some(parent) = target.real.parent() {
            self.storage.create_dir_all(parent).await?;
        }
        self.storage.move_entry(&payload, &target.real).await?;

        if let Err(e) = self.storage.remove_entry(&sidecar).await {
            warn!(trash_id = %id, error = %e, "Restored item but could not remove its trash record");
        }

        self.event_bus.publish_trash_event(TrashEvent::ItemRestored {
            owner: identity.id,
            trash_id: id,
            restored_path: info.original_path.clone(),
            restored_at: Utc::now(),
        });
        Ok(info.original_path)
    }

    async fn purge_one(&self, layout: &TrashLayout, raw_id: &str) -> Result<TrashId, VfsError> {
        let id = TrashId::parse(raw_id)
            .ok_or_else(|| VfsError::InvalidInput(format!("Invalid trash id: {}", raw_id)))?;
        let removed_payload = self.remove_if_present(&layout.payload(&id)).await?;
        let removed_sidecar = self.remove_if_present(&layout.sidecar(&id)).await?;
        if !removed_payload && !removed_sidecar {
            debug!(trash_id = %id, "Trash entry already purged");
        }
        Ok(id)
    }

    async fn apply_retention(&self, user: UserId, layout: &TrashLayout) -> usize {
        let policy = self.retention_policy(user).await;
        if !policy.is_enabled() {
            return 0;
        }

        let ids = match self.sidecar_ids(layout).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(user = %user, error = %e, "Could not scan trash for expired entries");
                return 0;
            }
        };

        let now = Utc::now().naive_utc();
        let mut purged = 0;
        for id in ids {
            let info = match self.read_info(&layout.sidecar(&id)).await {
                Ok(info) => info,
                Err(e) => {
                    debug!(trash_id = %id, error = %e, "Skipping unreadable trash record");
                    continue;
                }
            };
            if !info.is_expired(policy, now) {
                continue;
            }
            if let Err(e) = self.remove_if_present(&layout.payload(&id)).await {
                warn!(trash_id = %id, error = %e, "Could not purge expired trash entry");
                continue;
            }
            if let Err(e) = self.remove_if_present(&layout.sidecar(&id)).await {
                warn!(trash_id = %id, error = %e, "Could not remove expired trash record");
                continue;
            }
            purged += 1;
        }

        if purged > 0 {
            info!(user = %user, purged, retention_days = policy.days, "Purged expired trash entries");
            self.event_bus.publish_trash_event(TrashEvent::RetentionPurged {
                owner: user,
                retention_days: policy.days,
                purged_count: purged,
                purged_at: Utc::now(),
            });
        }
        purged
    }
}

#[async_trait]
impl TrashService for StandardTrashService {
    async fn trash(
        &self,
        user: UserId,
        paths: &[String],
        request_elevated_root: bool,
    ) -> Result<BatchOutcome<TrashId>, VfsError> {
        if paths.is_empty() {
            return Err(VfsError::InvalidInput("A list of paths is required".to_string()));
        }
        let identity = self.resolver.identity(user).await?;
        let layout = self.layout(user);
        self.storage.create_dir_all(layout.dir()).await?;

        let mut outcome = BatchOutcome::new();
        for path in paths {
            match self.trash_one(&identity, &layout, path, request_elevated_root).await {
                Ok(id) => outcome.push_ok(id),
                Err(e) => {
                    warn!(user = %user, error = %e, "Could not trash item");
                    self.audit(user, path, "trash", &e);
                    outcome.push_err(path.clone(), e);
                }
            }
        }

        info!(user = %user, trashed = outcome.succeeded.len(), failed = outcome.errors.len(), "Trash request completed");
        Ok(outcome)
    }

    async fn list(&self, user: UserId) -> Result<Vec<TrashEntry>, VfsError> {
        self.resolver.identity(user).await?;
        let layout = self.layout(user);
        self.apply_retention(user, &layout).await;

        let mut entries = Vec::new();
        for id in self.sidecar_ids(&layout).await? {
            let attributes = match self.storage.stat(&layout.payload(&id)).await {
                Ok(attributes) => attributes,
                // Orphaned record; the payload is gone
                Err(_) => continue,
            };
            let info = match self.read_info(&layout.sidecar(&id)).await {
                Ok(info) => info,
                Err(e) => {
                    debug!(trash_id = %id, error = %e, "Skipping unreadable trash record");
                    continue;
                }
            };
            entries.push(TrashEntry {
                id,
                owner: user,
                original_path: info.original_path,
                original_name: info.original_name,
                deleted_at: info.deleted_at,
                escaped_sandbox: info.escaped_sandbox,
                file_type: attributes.file_type,
                size: attributes.size,
            });
        }
        Ok(entries)
    }

    async fn restore(&self, user: UserId, ids: &[String]) -> Result<BatchOutcome<String>, VfsError> {
        if ids.is_empty() {
            return Err(VfsError::InvalidInput("List of trashed names required".to_string()));
        }
        let identity = self.resolver.identity(user).await?;
        let layout = self.layout(user);

        let mut outcome = BatchOutcome::new();
        for raw_id in ids {
            match self.restore_one(&identity, &layout, raw_id).await {
                Ok(path) => outcome.push_ok(path),
                Err(e) => {
                    warn!(user = %user, trash_id = %raw_id, error = %e, "Could not restore trash entry");
                    self.audit(user, raw_id, "restore", &e);
                    outcome.push_err(raw_id.clone(), e);
                }
            }
        }
        Ok(outcome)
    }

    async fn purge(&self, user: UserId, ids: &[String]) -> Result<BatchOutcome<TrashId>, VfsError> {
        if ids.is_empty() {
            return Err(VfsError::InvalidInput("List of trashed names required".to_string()));
        }
        self.resolver.identity(user).await?;
        let layout = self.layout(user);

        let mut outcome = BatchOutcome::new();
        for raw_id in ids {
            match self.purge_one(&layout, raw_id).await {
                Ok(id) => {
                    self.event_bus.publish_trash_event(TrashEvent::ItemPurged {
                        owner: user,
                        trash_id: id.clone(),
                        purged_at: Utc::now(),
                    });
                    outcome.push_ok(id);
                }
                Err(e) => {
                    warn!(user = %user, trash_id = %raw_id, error = %e, "Could not purge trash entry");
                    outcome.push_err(raw_id.clone(), e);
                }
            }
        }
        Ok(outcome)
    }

    async fn empty(&self, user: UserId) -> Result<(), VfsError> {
        self.resolver.identity(user).await?;
        let layout = self.layout(user);

        if self.storage.exists(layout.dir()).await {
            self.storage.remove_entry(layout.dir()).await?;
        }
        self.storage.create_dir_all(layout.dir()).await?;

        info!(user = %user, "Trash emptied");
        self.event_bus.publish_trash_event(TrashEvent::TrashEmptied {
            owner: user,
            emptied_at: Utc::now(),
        });
        Ok(())
    }

    async fn purge_expired(&self, user: UserId) -> Result<usize, VfsError> {
        self.resolver.identity(user).await?;
        let layout = self.layout(user);
        Ok(self.apply_retention(user, &layout).await)
    }
}
