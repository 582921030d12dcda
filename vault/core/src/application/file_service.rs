// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! File Application Service
//!
//! Operations on the caller's own tree: browse, view, create, rename, move
//! and copy. Every path goes through the [`PathResolver`]; destinations are
//! re-checked against the root that governed the source.

use crate::application::share_service::textually_within;
use crate::application::virtual_path::{browse_archive_at, listing_order, read_content_at, ContentView};
use crate::domain::archive::{is_browsable_archive, ArchiveBrowser, ArchiveView};
use crate::domain::containment::{is_contained, resolve_real_path};
use crate::domain::errors::{BatchOutcome, VfsError};
use crate::domain::identity::{Identity, UserId};
use crate::domain::path_resolver::{PathResolver, ResolvedPath};
use crate::domain::path_sanitizer::{suffixed_name, PathSanitizer};
use crate::domain::repository::DirectShareRepository;
use crate::domain::storage::{FileType, StorageError, StorageProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub name: String,
    /// Path relative to the root the listing was resolved against.
    pub path: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub size: u64,
    pub mtime: i64,
    /// The entry is a direct-share root of the caller, or lies under one.
    pub is_shared: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    File,
    Directory,
}

/// How many levels below the home directory recent activity looks.
const RECENT_ACTIVITY_DEPTH: usize = 3;
const RECENT_ACTIVITY_LIMIT: usize = 5;

/// A recently modified item under the caller's home directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentItem {
    pub name: String,
    /// Path relative to the home directory.
    pub path: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub mtime: i64,
}

/// Last component of a client-supplied file name, with either separator.
fn upload_file_name(filename: &str) -> &str {
    filename.rsplit(['/', '\\']).next().unwrap_or_default().trim()
}

#[async_trait]
pub trait FileService: Send + Sync {
    async fn browse(&self, user: UserId, path: &str, request_elevated_root: bool) -> Result<Vec<FileEntry>, VfsError>;

    async fn read_content(&self, user: UserId, path: &str, request_elevated_root: bool) -> Result<ContentView, VfsError>;

    async fn browse_archive(
        &self,
        user: UserId,
        path: &str,
        internal_path: &str,
        request_elevated_root: bool,
    ) -> Result<ArchiveView, VfsError>;

    /// Returns the display path of the new item.
    async fn create_item(
        &self,
        user: UserId,
        parent: &str,
        name: &str,
        kind: ItemKind,
        request_elevated_root: bool,
    ) -> Result<String, VfsError>;

    /// Store `data` as a new file in `directory`. Any directory part of
    /// `filename` is dropped. Existing items are never overwritten.
    /// Returns the display path of the stored file.
    async fn upload(
        &self,
        user: UserId,
        directory: &str,
        filename: &str,
        data: &[u8],
        request_elevated_root: bool,
    ) -> Result<String, VfsError>;

    async fn rename(
        &self,
        user: UserId,
        path: &str,
        new_name: &str,
        request_elevated_root: bool,
    ) -> Result<String, VfsError>;

    async fn move_items(
        &self,
        user: UserId,
        sources: &[String],
        destination: &str,
        request_elevated_root: bool,
    ) -> Result<BatchOutcome<String>, VfsError>;

    /// Name collisions are resolved as `<stem> (copyN)<ext>`.
    async fn copy_items(
        &self,
        user: UserId,
        sources: &[String],
        destination: &str,
        request_elevated_root: bool,
    ) -> Result<BatchOutcome<String>, VfsError>;

    /// Create the sandbox root and the default sub-directories.
    async fn provision_home(&self, user: UserId) -> Result<PathBuf, VfsError>;

    /// Most recently modified files and directories under the home
    /// directory, newest first. Hidden entries are skipped.
    async fn recent_activity(&self, user: UserId) -> Result<Vec<RecentItem>, VfsError>;
}

pub struct StandardFileService {
    resolver: Arc<PathResolver>,
    storage: Arc<dyn StorageProvider>,
    browser: Arc<dyn ArchiveBrowser>,
    direct_shares: Arc<dyn DirectShareRepository>,
    max_content_bytes: u64,
    default_home_dirs: Vec<String>,
}

impl StandardFileService {
    pub fn new(
        resolver: Arc<PathResolver>,
        storage: Arc<dyn StorageProvider>,
        browser: Arc<dyn ArchiveBrowser>,
        direct_shares: Arc<dyn DirectShareRepository>,
        max_content_bytes: u64,
        default_home_dirs: Vec<String>,
    ) -> Self {
        Self {
            resolver,
            storage,
            browser,
            direct_shares,
            max_content_bytes,
            default_home_dirs,
        }
    }

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

    async fn resolve_directory(
        &self,
        identity: &Identity,
        path: &str,
        request_elevated_root: bool,
    ) -> Result<ResolvedPath, VfsError> {
        let resolved = self.resolve_existing(identity, path, request_elevated_root).await?;
        if !self.storage.stat(&resolved.real).await?.file_type.is_dir() {
            return Err(VfsError::InvalidInput("Not a directory".to_string()));
        }
        Ok(resolved)
    }

    /// Direct-share roots of `user` created against the same kind of root.
    async fn shared_roots(&self, user: UserId, escaped_sandbox: bool) -> Vec<String> {
        match self.direct_shares.find_by_sharer(user).await {
            Ok(shares) => shares
                .into_iter()
                .filter(|s| s.escaped_sandbox == escaped_sandbox)
                .map(|s| s.root_path)
                .collect(),
            Err(e) => {
                warn!(user = %user, error = %e, "Could not load shares for listing");
                Vec::new()
            }
        }
    }

    fn entry_name(resolved: &ResolvedPath) -> Result<String, VfsError> {
        resolved
            .real
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| VfsError::InvalidInput("The root directory cannot be moved".to_string()))
    }

    async fn move_one(
        &self,
        identity: &Identity,
        source: &str,
        destination: &ResolvedPath,
        request_elevated_root: bool,
    ) -> Result<String, VfsError> {
        let source = self.resolve_existing(identity, source, request_elevated_root).await?;
        if source.is_root() {
            return Err(VfsError::InvalidInput("The root directory cannot be moved".to_string()));
        }
        let name = Self::entry_name(&source)?;
        let target = self.resolver.resolve_child(destination, &name)?;
        if !is_contained(&source.sandbox.root, &target.real) {
            return Err(VfsError::OutOfBounds);
        }
        if target.real.starts_with(&source.real) {
            return Err(VfsError::InvalidInput(format!("Cannot move '{}' into itself", name)));
        }
        if self.storage.exists(&target.real).await {
            return Err(VfsError::Conflict(format!("'{}' already exists in the destination", name)));
        }

        self.storage.move_entry(&source.real, &target.real).await?;
        Ok(self.resolver.display_path(&target))
    }

    async fn copy_one(
        &self,
        identity: &Identity,
        source: &str,
        destination: &ResolvedPath,
        request_elevated_root: bool,
    ) -> Result<String, VfsError> {
        let source = self.resolve_existing(identity, source, request_elevated_root).await?;
        if source.is_root() {
            return Err(VfsError::InvalidInput("The root directory cannot be copied".to_string()));
        }
        let name = Self::entry_name(&source)?;
        if destination.real.starts_with(&source.real) {
            return Err(VfsError::InvalidInput(format!("Cannot copy '{}' into itself", name)));
        }

        let mut target = self.resolver.resolve_child(destination, &name)?;
        let mut n = 1;
        while self.storage.exists(&target.real).await {
            target = self.resolver.resolve_child(destination, &suffixed_name(&name, &format!("copy{}", n)))?;
            n += 1;
        }
        if !is_contained(&source.sandbox.root, &target.real) {
            return Err(VfsError::OutOfBounds);
        }

        self.storage.copy_entry(&source.real, &target.real).await?;
        Ok(self.resolver.display_path(&target))
    }
}

#[async_trait]
impl FileService for StandardFileService {
    async fn browse(&self, user: UserId, path: &str, request_elevated_root: bool) -> Result<Vec<FileEntry>, VfsError> {
        let identity = self.resolver.identity(user).await?;
        let directory = self.resolve_directory(&identity, path, request_elevated_root).await?;
        let base = self.resolver.display_path(&directory);
        let shared = self.shared_roots(user, directory.escaped_sandbox()).await;

        let mut entries: Vec<FileEntry> = self
            .storage
            .read_dir(&directory.real)
            .await?
            .into_iter()
            .map(|entry| {
                let path = if base == "/" {
                    format!("/{}", entry.name)
                } else {
                    format!("{}/{}", base, entry.name)
                };
                let is_shared = shared.iter().any(|root| root != "/" && textually_within(root, &path));
                FileEntry {
                    name: entry.name,
                    path,
                    file_type: entry.attributes.file_type,
                    size: entry.attributes.size,
                    mtime: entry.attributes.mtime,
                    is_shared,
                }
            })
            .collect();

        entries.sort_by(|a, b| listing_order(a.file_type.is_dir(), &a.name, b.file_type.is_dir(), &b.name));
        Ok(entries)
    }

    async fn read_content(&self, user: UserId, path: &str, request_elevated_root: bool) -> Result<ContentView, VfsError> {
        let identity = self.resolver.identity(user).await?;
        let resolved = self.resolve_existing(&identity, path, request_elevated_root).await?;
        read_content_at(
            self.storage.as_ref(),
            &self.browser,
            &resolved.real,
            &self.resolver.display_path(&resolved),
            self.max_content_bytes,
        )
        .await
    }

    async fn browse_archive(
        &self,
        user: UserId,
        path: &str,
        internal_path: &str,
        request_elevated_root: bool,
    ) -> Result<ArchiveView, VfsError> {
        let identity = self.resolver.identity(user).await?;
        let resolved = self.resolve_existing(&identity, path, request_elevated_root).await?;
        let name = resolved.real.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        if !is_browsable_archive(&name) {
            return Err(VfsError::InvalidInput("Not a browsable archive".to_string()));
        }
        browse_archive_at(&self.browser, &resolved.real, internal_path).await
    }

    async fn create_item(
        &self,
        user: UserId,
        parent: &str,
        name: &str,
        kind: ItemKind,
        request_elevated_root: bool,
    ) -> Result<String, VfsError> {
        let identity = self.resolver.identity(user).await?;
        let parent = self.resolve_directory(&identity, parent, request_elevated_root).await?;
        let target = self.resolver.resolve_child(&parent, name.trim())?;
        if self.storage.exists(&target.real).await {
            return Err(VfsError::Conflict(format!("'{}' already exists", name.trim())));
        }

        match kind {
            ItemKind::File => self.storage.create_file(&target.real).await?,
            ItemKind::Directory => self.storage.create_dir(&target.real).await?,
        }
        let created = self.resolver.display_path(&target);
        info!(user = %user, path = %created, ?kind, "Item created");
        Ok(created)
    }

    async fn upload(
        &self,
        user: UserId,
        directory: &str,
        filename: &str,
        data: &[u8],
        request_elevated_root: bool,
    ) -> Result<String, VfsError> {
        let identity = self.resolver.identity(user).await?;
        let parent = self.resolve_directory(&identity, directory, request_elevated_root).await?;
        let name = upload_file_name(filename);
        let target = self.resolver.resolve_child(&parent, name)?;

        match self.storage.create_file(&target.real).await {
            Ok(()) => {}
            Err(StorageError::AlreadyExists(_)) => {
                return Err(VfsError::Conflict(format!("'{}' already exists", name)));
            }
            Err(e) => return Err(e.into()),
        }
        self.storage.write_file(&target.real, data).await?;

        let stored = self.resolver.display_path(&target);
        info!(user = %user, path = %stored, bytes = data.len(), "File uploaded");
        Ok(stored)
    }

    async fn rename(
        &self,
        user: UserId,
        path: &str,
        new_name: &str,
        request_elevated_root: bool,
    ) -> Result<String, VfsError> {
        let identity = self.resolver.identity(user).await?;
        let source = self.resolve_existing(&identity, path, request_elevated_root).await?;
        if source.is_root() {
            return Err(VfsError::InvalidInput("The root directory cannot be renamed".to_string()));
        }
        let parent = ResolvedPath {
            real: source
                .real
                .parent()
                .map(PathBuf::from)
                .ok_or_else(VfsError::inaccessible)?,
            sandbox: source.sandbox.clone(),
        };

        let target = self.resolver.resolve_child(&parent, new_name)?;
        if target.real == source.real {
            return Ok(self.resolver.display_path(&target));
        }
        if self.storage.exists(&target.real).await {
            return Err(VfsError::Conflict(format!("'{}' already exists", new_name)));
        }

        self.storage.move_entry(&source.real, &target.real).await?;
        Ok(self.resolver.display_path(&target))
    }

    async fn move_items(
        &self,
        user: UserId,
        sources: &[String],
        destination: &str,
        request_elevated_root: bool,
    ) -> Result<BatchOutcome<String>, VfsError> {
        if sources.is_empty() {
            return Err(VfsError::InvalidInput("A list of paths is required".to_string()));
        }
        let identity = self.resolver.identity(user).await?;
        let destination = self.resolve_directory(&identity, destination, request_elevated_root).await?;

        let mut outcome = BatchOutcome::new();
        for source in sources {
            match self.move_one(&identity, source, &destination, request_elevated_root).await {
                Ok(path) => outcome.push_ok(path),
                Err(e) => {
                    warn!(user = %user, error = %e, "Could not move item");
                    outcome.push_err(source.clone(), e);
                }
            }
        }
        Ok(outcome)
    }

    async fn copy_items(
        &self,
        user: UserId,
        sources: &[String],
        destination: &str,
        request_elevated_root: bool,
    ) -> Result<BatchOutcome<String>, VfsError> {
        if sources.is_empty() {
            return Err(VfsError::InvalidInput("A list of paths is required".to_string()));
        }
        let identity = self.resolver.identity(user).await?;
        let destination = self.resolve_directory(&identity, destination, request_elevated_root).await?;

        let mut outcome = BatchOutcome::new();
        for source in sources {
            match self.copy_one(&identity, source, &destination, request_elevated_root).await {
                Ok(path) => outcome.push_ok(path),
                Err(e) => {
                    warn!(user = %user, error = %e, "Could not copy item");
                    outcome.push_err(source.clone(), e);
                }
            }
        }
        Ok(outcome)
    }

    async fn provision_home(&self, user: UserId) -> Result<PathBuf, VfsError> {
        let identity = self.resolver.identity(user).await?;
        let home = self.resolver.home_dir(&identity)?;
        self.storage.create_dir_all(&home).await?;

        let sanitizer = PathSanitizer::new();
        for dir in &self.default_home_dirs {
            sanitizer.validate_name(dir)?;
            match self.storage.create_dir(&home.join(dir)).await {
                Ok(()) | Err(StorageError::AlreadyExists(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        info!(user = %user, home = %home.display(), "Home directory provisioned");
        Ok(home)
    }

    async fn recent_activity(&self, user: UserId) -> Result<Vec<RecentItem>, VfsError> {
        let identity = self.resolver.identity(user).await?;
        let home = self.resolve_directory(&identity, "/", false).await?;

        let mut items = Vec::new();
        let mut pending = vec![(home.real.clone(), String::new(), 1)];
        while let Some((dir, base, depth)) = pending.pop() {
            let entries = match self.storage.read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    debug!(path = %dir.display(), error = %e, "Skipping unreadable directory");
                    continue;
                }
            };

            for entry in entries {
                if entry.name.starts_with('.') {
                    continue;
                }
                let real = dir.join(&entry.name);
                // Links leading out of the home are neither listed nor followed
                match resolve_real_path(&real) {
                    Ok(target) if is_contained(&home.real, &target) => {}
                    _ => continue,
                }

                let path = format!("{}/{}", base, entry.name);
                if entry.attributes.file_type.is_dir() && depth < RECENT_ACTIVITY_DEPTH {
                    pending.push((real, path.clone(), depth + 1));
                }
                items.push(RecentItem {
                    name: entry.name,
                    path,
                    file_type: entry.attributes.file_type,
                    mtime: entry.attributes.mtime,
                });
            }
        }

        items.sort_by(|a, b| b.mtime.cmp(&a.mtime).then_with(|| a.path.cmp(&b.path)));
        items.truncate(RECENT_ACTIVITY_LIMIT);
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::containment::resolve_real_path;
    use crate::domain::share::DirectShare;
    use crate::infrastructure::archive::ZipArchiveBrowser;
    use crate::infrastructure::repositories::{InMemoryDirectShareRepository, InMemoryIdentityRepository};
    use crate::infrastructure::storage::LocalStorageProvider;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        service: StandardFileService,
        shares: InMemoryDirectShareRepository,
        home: PathBuf,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let base = resolve_real_path(temp.path()).unwrap();
        let home_base = base.join("home");
        let home = home_base.join("alice");
        std::fs::create_dir_all(home.join("docs/nested")).unwrap();
        std::fs::create_dir_all(home.join("media")).unwrap();
        std::fs::write(home.join("docs/a.txt"), "alpha").unwrap();
        std::fs::write(home.join("media/movie.mp4"), "frames").unwrap();

        let identities = InMemoryIdentityRepository::new();
        identities.insert(Identity::standard(1, "alice"));
        identities.insert(Identity::standard(2, "bob"));
        let shares = InMemoryDirectShareRepository::new();

        let service = StandardFileService::new(
            Arc::new(PathResolver::new(Arc::new(identities), home_base)),
            Arc::new(LocalStorageProvider::new()),
            Arc::new(ZipArchiveBrowser::new(1024)),
            Arc::new(shares.clone()),
            1024,
            vec!["Documents".to_string(), "Music".to_string()],
        );
        Fixture {
            _temp: temp,
            service,
            shares,
            home,
        }
    }

    fn paths(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_browse_sorts_and_flags_shared_entries() {
        let f = fixture();
        std::fs::write(f.home.join("Zeta.txt"), "z").unwrap();
        f.shares
            .insert(&DirectShare::new(UserId(1), UserId(2), "/media", false))
            .await
            .unwrap();

        let entries = f.service.browse(UserId(1), "/", false).await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["docs", "media", "Zeta.txt"]);
        assert!(entries.iter().find(|e| e.name == "media").unwrap().is_shared);
        assert!(!entries.iter().find(|e| e.name == "docs").unwrap().is_shared);

        let nested = f.service.browse(UserId(1), "/media", false).await.unwrap();
        assert!(nested[0].is_shared);
        assert_eq!(nested[0].path, "/media/movie.mp4");
    }

    #[tokio::test]
    async fn test_rename_rejects_separators_and_parent_refs() {
        let f = fixture();
        for bad in ["../escape.txt", "x/y.txt", "..", ""] {
            let err = f.service.rename(UserId(1), "/docs/a.txt", bad, false).await.unwrap_err();
            assert!(matches!(err, VfsError::InvalidInput(_)), "accepted {:?}", bad);
        }
        assert!(f.home.join("docs/a.txt").exists());
    }

    #[tokio::test]
    async fn test_rename_refuses_existing_destination() {
        let f = fixture();
        std::fs::write(f.home.join("docs/b.txt"), "beta").unwrap();
        let err = f.service.rename(UserId(1), "/docs/a.txt", "b.txt", false).await.unwrap_err();
        assert!(matches!(err, VfsError::Conflict(_)));

        let renamed = f.service.rename(UserId(1), "/docs/a.txt", "c.txt", false).await.unwrap();
        assert_eq!(renamed, "/docs/c.txt");
        assert_eq!(std::fs::read_to_string(f.home.join("docs/c.txt")).unwrap(), "alpha");
    }

    #[tokio::test]
    async fn test_create_item() {
        let f = fixture();
        let created = f
            .service
            .create_item(UserId(1), "/docs", "notes.md", ItemKind::File, false)
            .await
            .unwrap();
        assert_eq!(created, "/docs/notes.md");
        assert!(f.home.join("docs/notes.md").is_file());

        let dup = f.service.create_item(UserId(1), "/docs", "notes.md", ItemKind::Directory, false).await;
        assert!(matches!(dup, Err(VfsError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_move_reports_partial_success() {
        let f = fixture();
        let outcome = f
            .service
            .move_items(UserId(1), &paths(&["/docs/a.txt", "/docs", "/missing"]), "/docs/nested", false)
            .await
            .unwrap();

        assert_eq!(outcome.succeeded, vec!["/docs/nested/a.txt".to_string()]);
        assert_eq!(outcome.errors.len(), 2);
        assert!(matches!(outcome.errors[0].error, VfsError::InvalidInput(_)));
        assert!(outcome.errors[1].error.is_not_found());
    }

    #[tokio::test]
    async fn test_copy_suffixes_collisions() {
        let f = fixture();
        let first = f.service.copy_items(UserId(1), &paths(&["/docs/a.txt"]), "/docs", false).await.unwrap();
        let second = f.service.copy_items(UserId(1), &paths(&["/docs/a.txt"]), "/docs", false).await.unwrap();

        assert_eq!(first.succeeded, vec!["/docs/a (copy1).txt".to_string()]);
        assert_eq!(second.succeeded, vec!["/docs/a (copy2).txt".to_string()]);
        assert_eq!(std::fs::read_to_string(f.home.join("docs/a (copy2).txt")).unwrap(), "alpha");
    }

    #[tokio::test]
    async fn test_read_content_lossy_and_capped() {
        let f = fixture();
        std::fs::write(f.home.join("docs/bin.dat"), [0x66, 0x6f, 0xff, 0x6f]).unwrap();
        let view = f.service.read_content(UserId(1), "/docs/bin.dat", false).await.unwrap();
        assert!(matches!(view, ContentView::Text { ref content, .. } if content == "fo\u{fffd}o"));

        std::fs::write(f.home.join("docs/big.txt"), vec![b'a'; 2048]).unwrap();
        let err = f.service.read_content(UserId(1), "/docs/big.txt", false).await.unwrap_err();
        assert_eq!(err.to_string(), "File is too large to display");
    }

    #[tokio::test]
    async fn test_provision_home_creates_defaults() {
        let f = fixture();
        let home = f.service.provision_home(UserId(2)).await.unwrap();
        assert!(home.join("Documents").is_dir());
        assert!(home.join("Music").is_dir());
        // Idempotent
        f.service.provision_home(UserId(2)).await.unwrap();
    }

    #[tokio::test]
    async fn test_upload_keeps_only_the_file_name() {
        let f = fixture();
        let stored = f
            .service
            .upload(UserId(1), "/docs", "C:\\Users\\alice\\report.pdf", b"%PDF", false)
            .await
            .unwrap();
        assert_eq!(stored, "/docs/report.pdf");
        assert_eq!(std::fs::read(f.home.join("docs/report.pdf")).unwrap(), b"%PDF");

        let stored = f.service.upload(UserId(1), "/", "../../bob/planted.txt", b"x", false).await.unwrap();
        assert_eq!(stored, "/planted.txt");
        assert!(f.home.join("planted.txt").is_file());
    }

    #[tokio::test]
    async fn test_upload_never_overwrites() {
        let f = fixture();
        let err = f.service.upload(UserId(1), "/docs", "a.txt", b"replaced", false).await.unwrap_err();
        assert!(matches!(err, VfsError::Conflict(_)));
        assert_eq!(std::fs::read_to_string(f.home.join("docs/a.txt")).unwrap(), "alpha");
    }

    #[tokio::test]
    async fn test_upload_rejects_bad_targets() {
        let f = fixture();
        for bad in ["", "..", "/", "dir/"] {
            let err = f.service.upload(UserId(1), "/docs", bad, b"x", false).await.unwrap_err();
            assert!(matches!(err, VfsError::InvalidInput(_)), "accepted {:?}", bad);
        }

        let err = f.service.upload(UserId(1), "/docs/a.txt", "b.txt", b"x", false).await.unwrap_err();
        assert!(matches!(err, VfsError::InvalidInput(_)));

        let err = f.service.upload(UserId(1), "/../bob", "b.txt", b"x", false).await.unwrap_err();
        assert!(err.is_not_found());
    }

    fn touch(path: &std::path::Path, seconds_ahead: u64) {
        let when = std::time::SystemTime::now() + std::time::Duration::from_secs(seconds_ahead);
        std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .unwrap()
            .set_modified(when)
            .unwrap();
    }

    #[tokio::test]
    async fn test_recent_activity_newest_first_within_depth() {
        let f = fixture();
        std::fs::create_dir_all(f.home.join("docs/nested/deep")).unwrap();
        touch(&f.home.join("docs/b.txt"), 500);
        touch(&f.home.join("docs/a.txt"), 1000);
        touch(&f.home.join("media/movie.mp4"), 2000);
        touch(&f.home.join("docs/nested/n.txt"), 3000);
        touch(&f.home.join("z.txt"), 4000);
        // Newer, but hidden or below the depth limit
        touch(&f.home.join(".profile"), 9000);
        touch(&f.home.join("docs/nested/deep/too-deep.txt"), 9000);

        let recent = f.service.recent_activity(UserId(1)).await.unwrap();
        let paths: Vec<&str> = recent.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["/z.txt", "/docs/nested/n.txt", "/media/movie.mp4", "/docs/a.txt", "/docs/b.txt"]
        );
        assert_eq!(recent[1].name, "n.txt");
        assert_eq!(recent[1].file_type, FileType::File);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_recent_activity_ignores_links_out_of_home() {
        let f = fixture();
        let outside = f.home.parent().unwrap().join("bob");
        std::fs::create_dir_all(&outside).unwrap();
        touch(&outside.join("secret.txt"), 9000);
        std::os::unix::fs::symlink(&outside, f.home.join("bob-link")).unwrap();

        let recent = f.service.recent_activity(UserId(1)).await.unwrap();
        assert!(recent.iter().all(|r| !r.path.starts_with("/bob-link")));
        assert!(!recent.is_empty());
    }
}
