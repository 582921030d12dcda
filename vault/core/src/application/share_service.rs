// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Share Application Service
//!
//! Public links (anonymous, token addressed, many roots) and direct shares
//! (identity to identity, one root each). Creation validates every path
//! before anything is persisted; access always goes through the
//! [`VirtualPathMapper`] so a share never exposes more than its roots.
//!
//! Public share roots are always resolved inside the owner's sandbox.
//! Direct shares remember whether they were created against the elevated
//! root and keep resolving against it.

use crate::application::virtual_path::{ContentView, Download, VirtualEntry, VirtualPathMapper};
use crate::domain::archive::ArchiveView;
use crate::domain::containment::is_contained;
use crate::domain::errors::VfsError;
use crate::domain::events::{AccessEvent, ShareEvent};
use crate::domain::identity::{Identity, UserId};
use crate::domain::path_resolver::{PathResolver, ResolvedPath};
use crate::domain::repository::{DirectShareRepository, PublicShareRepository, RepositoryError};
use crate::domain::share::{
    direct_share_message, DirectShare, DirectShareId, NotificationSink, PublicShare, Severity,
    ShareScope, ShareToken,
};
use crate::domain::storage::{FileType, StorageProvider};
use crate::infrastructure::event_bus::EventBus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What an anonymous visitor sees when opening a link.
#[derive(Debug, Clone, Serialize)]
pub struct PublicShareDetails {
    pub token: ShareToken,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub entries: Vec<VirtualEntry>,
}

/// One row of the shared-with-me / shared-by-me listings.
#[derive(Debug, Clone, Serialize)]
pub struct DirectShareListing {
    pub id: DirectShareId,
    pub name: String,
    pub root_path: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub size: u64,
    pub mtime: i64,
    pub shared_at: DateTime<Utc>,
    /// Sharer for shared-with-me rows, recipient for shared-by-me rows.
    pub counterpart: UserId,
    pub counterpart_name: String,
}

#[async_trait]
pub trait ShareService: Send + Sync {
    /// All-or-nothing: any path that does not resolve aborts the creation.
    async fn create_public_share(
        &self,
        owner: UserId,
        name: &str,
        paths: &[String],
    ) -> Result<PublicShare, VfsError>;

    async fn delete_public_share(&self, token: &str, requester: UserId) -> Result<(), VfsError>;

    async fn list_public_shares(&self, owner: UserId) -> Result<Vec<PublicShare>, VfsError>;

    async fn public_share_details(&self, token: &str) -> Result<PublicShareDetails, VfsError>;

    async fn browse_public_share(&self, token: &str, virtual_path: &str) -> Result<Vec<VirtualEntry>, VfsError>;

    async fn open_public_share(&self, token: &str, virtual_path: &str) -> Result<Download, VfsError>;

    /// Items that cannot be mapped are left out; fails only when none can.
    async fn download_public_selection(&self, token: &str, virtual_paths: &[String]) -> Result<Vec<u8>, VfsError>;

    async fn read_public_share(&self, token: &str, virtual_path: &str) -> Result<ContentView, VfsError>;

    async fn browse_public_archive(
        &self,
        token: &str,
        virtual_path: &str,
        internal_path: &str,
    ) -> Result<ArchiveView, VfsError>;

    /// Share every path with every recipient. Self shares and existing
    /// shares are skipped. Returns the shares actually created.
    async fn create_direct_share(
        &self,
        sharer: UserId,
        recipients: &[UserId],
        paths: &[String],
        request_elevated_root: bool,
    ) -> Result<Vec<DirectShare>, VfsError>;

    /// Remove the shares the requester is a party to.
    async fn revoke(&self, ids: &[String], requester: UserId) -> Result<Vec<DirectShareId>, VfsError>;

    async fn shared_with_me(&self, recipient: UserId) -> Result<Vec<DirectShareListing>, VfsError>;

    async fn shared_by_me(&self, sharer: UserId) -> Result<Vec<DirectShareListing>, VfsError>;

    async fn browse_direct_share(
        &self,
        recipient: UserId,
        share_id: &str,
        virtual_path: &str,
    ) -> Result<Vec<VirtualEntry>, VfsError>;

    async fn open_direct_share(
        &self,
        recipient: UserId,
        share_id: &str,
        virtual_path: &str,
    ) -> Result<Download, VfsError>;

    async fn read_direct_share(
        &self,
        recipient: UserId,
        share_id: &str,
        virtual_path: &str,
    ) -> Result<ContentView, VfsError>;

    async fn browse_direct_archive(
        &self,
        recipient: UserId,
        share_id: &str,
        virtual_path: &str,
        internal_path: &str,
    ) -> Result<ArchiveView, VfsError>;

    /// Real path of `requested` (owner-sandbox coordinates) if it is one of
    /// the scope's roots or lies beneath one.
    async fn is_path_within_share(&self, scope: &ShareScope, requested: &str) -> Result<PathBuf, VfsError>;
}

/// Collapse repeated and `.` segments; `..` is kept for the canonical check.
fn normalize_share_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty() && *s != ".").collect();
    format!("/{}", segments.join("/"))
}

pub(crate) fn textually_within(root: &str, requested: &str) -> bool {
    root == "/" || requested == root || requested.starts_with(&format!("{}/", root))
}

pub struct StandardShareService {
    resolver: Arc<PathResolver>,
    mapper: Arc<VirtualPathMapper>,
    storage: Arc<dyn StorageProvider>,
    public_shares: Arc<dyn PublicShareRepository>,
    direct_shares: Arc<dyn DirectShareRepository>,
    notifications: Arc<dyn NotificationSink>,
    event_bus: Arc<EventBus>,
}

impl StandardShareService {
    pub fn new(
        resolver: Arc<PathResolver>,
        mapper: Arc<VirtualPathMapper>,
        storage: Arc<dyn StorageProvider>,
        public_shares: Arc<dyn PublicShareRepository>,
        direct_shares: Arc<dyn DirectShareRepository>,
        notifications: Arc<dyn NotificationSink>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            resolver,
            mapper,
            storage,
            public_shares,
            direct_shares,
            notifications,
            event_bus,
        }
    }

    fn audit<T>(&self, user: Option<UserId>, path: &str, context: &str, result: Result<T, VfsError>) -> Result<T, VfsError> {
        if let Err(VfsError::OutOfBounds) = &result {
            self.event_bus.publish_access_event(AccessEvent::AccessRejected {
                user,
                attempted_path: path.to_string(),
                context: context.to_string(),
                rejected_at: Utc::now(),
            });
        }
        result
    }

    /// Resolve a root for a new share; it must exist.
    async fn resolve_existing(
        &self,
        identity: &Identity,
        path: &str,
        request_elevated_root: bool,
    ) -> Result<ResolvedPath, VfsError> {
        let resolved = self.resolver.resolve_for(identity, path, request_elevated_root)?;
        if !self.storage.exists(&resolved.real).await {
            return Err(VfsError::inaccessible());
        }
        Ok(resolved)
    }

    async fn public_share(&self, token: &str) -> Result<PublicShare, VfsError> {
        let token = ShareToken::parse(token).ok_or_else(|| VfsError::NotFound("Share not found".to_string()))?;
        self.public_shares
            .find_by_token(&token)
            .await?
            .ok_or_else(|| VfsError::NotFound("Share not found".to_string()))
    }

    /// A direct share as seen by its recipient. Anyone else gets NotFound.
    async fn received_share(&self, recipient: UserId, share_id: &str) -> Result<DirectShare, VfsError> {
        let not_found = || VfsError::NotFound("Share not found".to_string());
        let id = DirectShareId::from_string(share_id).map_err(|_| not_found())?;
        match self.direct_shares.find_by_id(id).await? {
            Some(share) if share.recipient == recipient => Ok(share),
            Some(_) => {
                warn!(user = %recipient, share_id = %id, "Direct share accessed by non-recipient");
                Err(not_found())
            }
            None => Err(not_found()),
        }
    }

    async fn username(&self, user: UserId) -> String {
        match self.resolver.identity(user).await {
            Ok(identity) => identity.username,
            Err(_) => user.to_string(),
        }
    }

    async fn listing(&self, share: &DirectShare, counterpart: UserId) -> Option<DirectShareListing> {
        let roots = match self.mapper.roots(&share.scope()).await {
            Ok(roots) => roots,
            Err(e) => {
                debug!(share_id = %share.id, error = %e, "Skipping direct share with unknown owner");
                return None;
            }
        };
        let root = roots.into_iter().next()?;
        let attributes = self.storage.stat(&root.resolved.real).await.ok()?;

        Some(DirectShareListing {
            id: share.id,
            name: root.virtual_name,
            root_path: share.root_path.clone(),
            file_type: attributes.file_type,
            size: attributes.size,
            mtime: attributes.mtime,
            shared_at: share.shared_at,
            counterpart,
            counterpart_name: self.username(counterpart).await,
        })
    }
}

#[async_trait]
impl ShareService for StandardShareService {
    async fn create_public_share(
        &self,
        owner: UserId,
        name: &str,
        paths: &[String],
    ) -> Result<PublicShare, VfsError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(VfsError::InvalidInput("Share name is required".to_string()));
        }
        if paths.is_empty() {
            return Err(VfsError::InvalidInput("A list of paths is required".to_string()));
        }
        let identity = self.resolver.identity(owner).await?;

        let mut items = Vec::with_capacity(paths.len());
        for path in paths {
            let resolved = self.audit(
                Some(owner),
                path,
                "public_share",
                self.resolve_existing(&identity, path, false).await,
            )?;
            items.push(self.resolver.display_path(&resolved));
        }

        let share = PublicShare::new(owner, name, items);
        self.public_shares.save(&share).await?;

        info!(owner = %owner, token = %share.token, items = share.items.len(), "Public share created");
        self.event_bus.publish_share_event(ShareEvent::PublicShareCreated {
            token: share.token.clone(),
            owner,
            item_count: share.items.len(),
            created_at: share.created_at,
        });
        Ok(share)
    }

    async fn delete_public_share(&self, token: &str, requester: UserId) -> Result<(), VfsError> {
        let share = self.public_share(token).await?;
        if share.owner != requester {
            warn!(user = %requester, token = %share.token, "Refusing to delete another identity's share");
            return Err(VfsError::Unauthorized("Only the owner can delete this share".to_string()));
        }
        if !self.public_shares.delete(&share.token).await? {
            return Err(VfsError::NotFound("Share not found".to_string()));
        }

        info!(owner = %requester, token = %share.token, "Public share deleted");
        self.event_bus.publish_share_event(ShareEvent::PublicShareDeleted {
            token: share.token,
            owner: requester,
            deleted_at: Utc::now(),
        });
        Ok(())
    }

    async fn list_public_shares(&self, owner: UserId) -> Result<Vec<PublicShare>, VfsError> {
        Ok(self.public_shares.find_by_owner(owner).await?)
    }

    async fn public_share_details(&self, token: &str) -> Result<PublicShareDetails, VfsError> {
        let share = self.public_share(token).await?;
        let entries = self.mapper.list(&share.scope(), "/").await?;
        Ok(PublicShareDetails {
            token: share.token,
            name: share.name,
            created_at: share.created_at,
            entries,
        })
    }

    async fn browse_public_share(&self, token: &str, virtual_path: &str) -> Result<Vec<VirtualEntry>, VfsError> {
        let share = self.public_share(token).await?;
        let result = self.mapper.list(&share.scope(), virtual_path).await;
        self.audit(None, virtual_path, "public_share", result)
    }

    async fn open_public_share(&self, token: &str, virtual_path: &str) -> Result<Download, VfsError> {
        let share = self.public_share(token).await?;
        let result = self.mapper.download(&share.scope(), virtual_path, &share.name).await;
        self.audit(None, virtual_path, "public_share", result)
    }

    async fn download_public_selection(&self, token: &str, virtual_paths: &[String]) -> Result<Vec<u8>, VfsError> {
        let share = self.public_share(token).await?;
        let result = self.mapper.package_selection(&share.scope(), virtual_paths).await;
        let packaged = self.audit(None, &virtual_paths.join(", "), "public_share", result)?;
        for skipped in packaged.skipped {
            let _ = self.audit::<()>(None, &skipped.item, "public_share", Err(skipped.error));
        }
        Ok(packaged.data)
    }

    async fn read_public_share(&self, token: &str, virtual_path: &str) -> Result<ContentView, VfsError> {
        let share = self.public_share(token).await?;
        let result = self.mapper.read_content(&share.scope(), virtual_path).await;
        self.audit(None, virtual_path, "public_share", result)
    }

    async fn browse_public_archive(
        &self,
        token: &str,
        virtual_path: &str,
        internal_path: &str,
    ) -> Result<ArchiveView, VfsError> {
        let share = self.public_share(token).await?;
        let result = self.mapper.browse_archive(&share.scope(), virtual_path, internal_path).await;
        self.audit(None, virtual_path, "public_share", result)
    }

    async fn create_direct_share(
        &self,
        sharer: UserId,
        recipients: &[UserId],
        paths: &[String],
        request_elevated_root: bool,
    ) -> Result<Vec<DirectShare>, VfsError> {
        if recipients.is_empty() || paths.is_empty() {
            return Err(VfsError::InvalidInput("Recipients and paths are required".to_string()));
        }
        let identity = self.resolver.identity(sharer).await?;

        // Validate everything before persisting anything
        let mut roots = Vec::with_capacity(paths.len());
        for path in paths {
            let resolved = self.audit(
                Some(sharer),
                path,
                "direct_share",
                self.resolve_existing(&identity, path, request_elevated_root).await,
            )?;
            let item_name = resolved
                .real
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "/".to_string());
            roots.push((self.resolver.display_path(&resolved), resolved.escaped_sandbox(), item_name));
        }
        for recipient in recipients {
            if self.resolver.identity(*recipient).await.is_err() {
                return Err(VfsError::NotFound(format!("Unknown recipient: {}", recipient)));
            }
        }

        let mut created = Vec::new();
        for recipient in recipients {
            if *recipient == sharer {
                debug!(user = %sharer, "Skipping self share");
                continue;
            }
            for (root_path, escaped_sandbox, item_name) in &roots {
                if self.direct_shares.exists(sharer, *recipient, root_path).await? {
                    debug!(sharer = %sharer, recipient = %recipient, path = %root_path, "Already shared");
                    continue;
                }
                let share = DirectShare::new(sharer, *recipient, root_path.clone(), *escaped_sandbox);
                match self.direct_shares.insert(&share).await {
                    Ok(()) => {}
                    Err(RepositoryError::Duplicate(_)) => continue,
                    Err(e) => return Err(e.into()),
                }

                self.event_bus.publish_share_event(ShareEvent::DirectShareCreated {
                    share_id: share.id,
                    sharer,
                    recipient: *recipient,
                    root_path: root_path.clone(),
                    created_at: share.shared_at,
                });
                let message = direct_share_message(item_name, &identity.username);
                if let Err(e) = self.notifications.notify(*recipient, &message, Severity::Info).await {
                    warn!(recipient = %recipient, error = %e, "Could not notify share recipient");
                }
                created.push(share);
            }
        }

        info!(sharer = %sharer, created = created.len(), "Direct shares created");
        Ok(created)
    }

    async fn revoke(&self, ids: &[String], requester: UserId) -> Result<Vec<DirectShareId>, VfsError> {
        if ids.is_empty() {
            return Err(VfsError::InvalidInput("A list of share ids is required".to_string()));
        }
        let ids = ids
            .iter()
            .map(|id| {
                DirectShareId::from_string(id)
                    .map_err(|_| VfsError::InvalidInput(format!("Invalid share id: {}", id)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let revoked = self.direct_shares.delete_for_party(&ids, requester).await?;
        if revoked.is_empty() {
            warn!(user = %requester, requested = ids.len(), "No revocable shares in request");
            return Err(VfsError::Unauthorized("No shares were revoked".to_string()));
        }

        info!(user = %requester, revoked = revoked.len(), "Direct shares revoked");
        self.event_bus.publish_share_event(ShareEvent::DirectSharesRevoked {
            share_ids: revoked.clone(),
            requester,
            revoked_at: Utc::now(),
        });
        Ok(revoked)
    }

    async fn shared_with_me(&self, recipient: UserId) -> Result<Vec<DirectShareListing>, VfsError> {
        let mut listings = Vec::new();
        for share in self.direct_shares.find_by_recipient(recipient).await? {
            if let Some(listing) = self.listing(&share, share.sharer).await {
                listings.push(listing);
            }
        }
        Ok(listings)
    }

    async fn shared_by_me(&self, sharer: UserId) -> Result<Vec<DirectShareListing>, VfsError> {
        let mut listings = Vec::new();
        for share in self.direct_shares.find_by_sharer(sharer).await? {
            if let Some(listing) = self.listing(&share, share.recipient).await {
                listings.push(listing);
            }
        }
        Ok(listings)
    }

    async fn browse_direct_share(
        &self,
        recipient: UserId,
        share_id: &str,
        virtual_path: &str,
    ) -> Result<Vec<VirtualEntry>, VfsError> {
        let share = self.received_share(recipient, share_id).await?;
        let result = self.mapper.list(&share.scope(), virtual_path).await;
        self.audit(Some(recipient), virtual_path, "direct_share", result)
    }

    async fn open_direct_share(
        &self,
        recipient: UserId,
        share_id: &str,
        virtual_path: &str,
    ) -> Result<Download, VfsError> {
        let share = self.received_share(recipient, share_id).await?;
        let name = share.root_path.rsplit('/').find(|s| !s.is_empty()).unwrap_or("share").to_string();
        let result = self.mapper.download(&share.scope(), virtual_path, &name).await;
        self.audit(Some(recipient), virtual_path, "direct_share", result)
    }

    async fn read_direct_share(
        &self,
        recipient: UserId,
        share_id: &str,
        virtual_path: &str,
    ) -> Result<ContentView, VfsError> {
        let share = self.received_share(recipient, share_id).await?;
        let result = self.mapper.read_content(&share.scope(), virtual_path).await;
        self.audit(Some(recipient), virtual_path, "direct_share", result)
    }

    async fn browse_direct_archive(
        &self,
        recipient: UserId,
        share_id: &str,
        virtual_path: &str,
        internal_path: &str,
    ) -> Result<ArchiveView, VfsError> {
        let share = self.received_share(recipient, share_id).await?;
        let result = self
            .mapper
            .browse_archive(&share.scope(), virtual_path, internal_path)
            .await;
        self.audit(Some(recipient), virtual_path, "direct_share", result)
    }

    async fn is_path_within_share(&self, scope: &ShareScope, requested: &str) -> Result<PathBuf, VfsError> {
        let identity = self.resolver.identity(scope.owner).await?;
        let requested = normalize_share_path(requested);

        for root in &scope.roots {
            let root_path = normalize_share_path(root);
            if !textually_within(&root_path, &requested) {
                continue;
            }
            let root = match self.resolver.resolve_recorded(&identity, &root_path, scope.escaped_sandbox) {
                Ok(root) => root,
                Err(_) => continue,
            };
            // Second step: the canonical path must stay under the root's
            // real path, not just under the owner's sandbox
            if let Ok(full) = self.resolver.resolve_in(&root.sandbox, &requested) {
                if is_contained(&root.real, &full.real) {
                    return Ok(full.real);
                }
            }
        }

        warn!(owner = %scope.owner, path = %requested, "Path outside share roots rejected");
        self.audit(None, &requested, "share_scope", Err(VfsError::OutOfBounds))
    }
}
