// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Virtual Path Mapper
//!
//! Translates share-relative virtual paths into real paths. A share exposes
//! only its declared roots; the rest of the owner's tree does not exist in
//! its namespace.
//!
//! # Addressing
//!
//! - `/` lists the share's roots under their top-level virtual names (the
//!   real basename, suffixed `name (2)`, `name (3)`... on collision, in
//!   declaration order).
//! - `/<top>/<rest>` addresses inside the root named `<top>`.
//! - A single-root share also accepts paths relative to that root when the
//!   first segment is not its top-level name.
//!
//! Every mapped path is canonicalized and re-checked against the real path
//! of the root it was reached through, so symlinks inside a shared folder
//! cannot reach the owner's unshared files.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Containment for share access, listing and packaging

use crate::domain::archive::{
    is_browsable_archive, ArchiveBrowser, ArchivePackager, ArchiveView, PackageSource,
};
use crate::domain::containment::{is_contained, resolve_real_path};
use crate::domain::errors::{BatchError, VfsError};
use crate::domain::path_resolver::{PathResolver, ResolvedPath};
use crate::domain::path_sanitizer::suffixed_name;
use crate::domain::share::ShareScope;
use crate::domain::storage::{FileType, StorageProvider};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// One declared root of a share, as currently resolvable.
#[derive(Debug, Clone)]
pub struct ShareRoot {
    pub virtual_name: String,
    /// Root path as stored on the share record.
    pub declared_path: String,
    pub resolved: ResolvedPath,
}

/// A virtual path that passed the share containment check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedPath {
    /// Canonical virtual path, always starting with the top-level name.
    pub virtual_path: String,
    pub real: PathBuf,
    /// Real path of the share root this path was reached through.
    pub root: PathBuf,
}

impl MappedPath {
    pub fn name(&self) -> &str {
        self.virtual_path.rsplit('/').next().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VirtualLocation {
    /// The share's virtual root, listing its declared roots.
    Root,
    Item(MappedPath),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub size: u64,
    pub mtime: i64,
}

/// What a download request produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Download {
    /// A single file, streamed by the caller from `real`.
    File { name: String, real: PathBuf, size: u64 },
    /// A directory or whole share packaged on the fly.
    Archive { name: String, data: Vec<u8> },
}

/// A packaged selection and the requested items left out of it.
#[derive(Debug)]
pub struct PackagedSelection {
    pub data: Vec<u8>,
    pub skipped: Vec<BatchError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentView {
    Text {
        path: String,
        size: u64,
        content: String,
    },
    Archive {
        path: String,
        view: ArchiveView,
    },
}

/// Directories first, then case-insensitive by name.
pub(crate) fn listing_order(a_dir: bool, a_name: &str, b_dir: bool, b_name: &str) -> Ordering {
    b_dir
        .cmp(&a_dir)
        .then_with(|| a_name.to_lowercase().cmp(&b_name.to_lowercase()))
}

/// Split a virtual path into segments. Parent references are treated as
/// escape attempts, never collapsed.
fn virtual_segments(virtual_path: &str) -> Result<Vec<&str>, VfsError> {
    if virtual_path.chars().any(char::is_control) {
        return Err(VfsError::InvalidInput("Invalid path".to_string()));
    }
    let mut segments = Vec::new();
    for segment in virtual_path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(VfsError::OutOfBounds),
            s => segments.push(s),
        }
    }
    Ok(segments)
}

/// Text view of a file, or the root listing of a zip archive.
pub(crate) async fn read_content_at(
    storage: &dyn StorageProvider,
    browser: &Arc<dyn ArchiveBrowser>,
    real: &Path,
    display_path: &str,
    max_bytes: u64,
) -> Result<ContentView, VfsError> {
    let attributes = storage.stat(real).await?;
    if attributes.file_type.is_dir() {
        return Err(VfsError::InvalidInput("Cannot display a directory".to_string()));
    }

    let name = real.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    if is_browsable_archive(&name) {
        let view = browse_archive_at(browser, real, "").await?;
        return Ok(ContentView::Archive {
            path: display_path.to_string(),
            view,
        });
    }

    let bytes = storage.read_file(real, max_bytes).await?;
    Ok(ContentView::Text {
        path: display_path.to_string(),
        size: bytes.len() as u64,
        content: String::from_utf8_lossy(&bytes).into_owned(),
    })
}

/// Run the (blocking) archive browser off the async runtime.
pub(crate) async fn browse_archive_at(
    browser: &Arc<dyn ArchiveBrowser>,
    real: &Path,
    internal_path: &str,
) -> Result<ArchiveView, VfsError> {
    let browser = Arc::clone(browser);
    let real = real.to_path_buf();
    let internal_path = internal_path.to_string();
    let view = tokio::task::spawn_blocking(move || browser.browse(&real, &internal_path))
        .await
        .map_err(|e| VfsError::UpstreamIo(format!("Archive reader task failed: {}", e)))??;
    Ok(view)
}

pub struct VirtualPathMapper {
    resolver: Arc<PathResolver>,
    storage: Arc<dyn StorageProvider>,
    browser: Arc<dyn ArchiveBrowser>,
    packager: Arc<dyn ArchivePackager>,
    max_content_bytes: u64,
}

impl VirtualPathMapper {
    pub fn new(
        resolver: Arc<PathResolver>,
        storage: Arc<dyn StorageProvider>,
        browser: Arc<dyn ArchiveBrowser>,
        packager: Arc<dyn ArchivePackager>,
        max_content_bytes: u64,
    ) -> Self {
        Self {
            resolver,
            storage,
            browser,
            packager,
            max_content_bytes,
        }
    }

    /// Resolve the share's declared roots against the root they were shared
    /// from. Roots that no longer resolve or exist are left out.
    pub async fn roots(&self, scope: &ShareScope) -> Result<Vec<ShareRoot>, VfsError> {
        let identity = self.resolver.identity(scope.owner).await?;
        let mut taken = HashSet::new();
        let mut roots = Vec::with_capacity(scope.roots.len());

        for declared in &scope.roots {
            let resolved = match self.resolver.resolve_recorded(&identity, declared, scope.escaped_sandbox) {
                Ok(resolved) => resolved,
                Err(e) => {
                    warn!(owner = %scope.owner, path = %declared, error = %e, "Share root no longer resolves");
                    continue;
                }
            };
            if !self.storage.exists(&resolved.real).await {
                debug!(owner = %scope.owner, path = %declared, "Share root no longer exists");
                continue;
            }

            let base = resolved
                .real
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "root".to_string());
            let mut name = base.clone();
            let mut n = 2;
            while !taken.insert(name.clone()) {
                name = suffixed_name(&base, &n.to_string());
                n += 1;
            }

            roots.push(ShareRoot {
                virtual_name: name,
                declared_path: declared.clone(),
                resolved,
            });
        }
        Ok(roots)
    }

    /// Map a virtual path to an existing real location inside the share.
    pub async fn map(&self, scope: &ShareScope, virtual_path: &str) -> Result<VirtualLocation, VfsError> {
        let segments = virtual_segments(virtual_path)?;
        let roots = self.roots(scope).await?;
        self.locate(&roots, &segments).await
    }

    /// Map a virtual path that must name an item, not the virtual root.
    pub async fn map_item(&self, scope: &ShareScope, virtual_path: &str) -> Result<MappedPath, VfsError> {
        match self.map(scope, virtual_path).await? {
            VirtualLocation::Item(mapped) => Ok(mapped),
            VirtualLocation::Root => Err(VfsError::InvalidInput("A shared item path is required".to_string())),
        }
    }

    async fn locate(&self, roots: &[ShareRoot], segments: &[&str]) -> Result<VirtualLocation, VfsError> {
        let Some((first, rest)) = segments.split_first() else {
            return Ok(VirtualLocation::Root);
        };

        let (root, rest) = match roots.iter().find(|r| r.virtual_name == *first) {
            Some(root) => (root, rest),
            None if roots.len() == 1 => (&roots[0], segments),
            None => return Err(VfsError::inaccessible()),
        };

        let candidate = rest
            .iter()
            .fold(root.resolved.real.clone(), |path, segment| path.join(segment));
        let real = resolve_real_path(&candidate).map_err(|_| VfsError::OutOfBounds)?;
        if !is_contained(&root.resolved.real, &real) {
            warn!(
                root = %root.resolved.real.display(),
                share_root = %root.declared_path,
                "Virtual path outside share root rejected"
            );
            return Err(VfsError::OutOfBounds);
        }
        if !self.storage.exists(&real).await {
            return Err(VfsError::inaccessible());
        }

        let mut virtual_path = format!("/{}", root.virtual_name);
        for segment in rest {
            virtual_path.push('/');
            virtual_path.push_str(segment);
        }

        Ok(VirtualLocation::Item(MappedPath {
            virtual_path,
            real,
            root: root.resolved.real.clone(),
        }))
    }

    /// List the virtual root or a shared directory.
    pub async fn list(&self, scope: &ShareScope, virtual_path: &str) -> Result<Vec<VirtualEntry>, VfsError> {
        let segments = virtual_segments(virtual_path)?;
        let roots = self.roots(scope).await?;

        let mut entries = match self.locate(&roots, &segments).await? {
            VirtualLocation::Root => self.list_roots(&roots).await,
            VirtualLocation::Item(mapped) => self.list_directory(&mapped).await?,
        };
        entries.sort_by(|a, b| listing_order(a.file_type.is_dir(), &a.name, b.file_type.is_dir(), &b.name));
        Ok(entries)
    }

    async fn list_roots(&self, roots: &[ShareRoot]) -> Vec<VirtualEntry> {
        let mut entries = Vec::with_capacity(roots.len());
        for root in roots {
            match self.storage.stat(&root.resolved.real).await {
                Ok(attributes) => entries.push(VirtualEntry {
                    name: root.virtual_name.clone(),
                    path: format!("/{}", root.virtual_name),
                    file_type: attributes.file_type,
                    size: attributes.size,
                    mtime: attributes.mtime,
                }),
                Err(e) => debug!(path = %root.declared_path, error = %e, "Skipping unreadable share root"),
            }
        }
        entries
    }

    async fn list_directory(&self, mapped: &MappedPath) -> Result<Vec<VirtualEntry>, VfsError> {
        let attributes = self.storage.stat(&mapped.real).await?;
        if !attributes.file_type.is_dir() {
            return Err(VfsError::InvalidInput("Not a directory".to_string()));
        }

        let mut entries = Vec::new();
        for entry in self.storage.read_dir(&mapped.real).await? {
            // Hide links that lead out of the share root
            let child = mapped.real.join(&entry.name);
            match resolve_real_path(&child) {
                Ok(real) if is_contained(&mapped.root, &real) => {}
                _ => continue,
            }
            entries.push(VirtualEntry {
                path: format!("{}/{}", mapped.virtual_path, entry.name),
                name: entry.name,
                file_type: entry.attributes.file_type,
                size: entry.attributes.size,
                mtime: entry.attributes.mtime,
            });
        }
        Ok(entries)
    }

    /// A file as-is, or a directory (or the whole share) as a zip archive.
    pub async fn download(
        &self,
        scope: &ShareScope,
        virtual_path: &str,
        archive_name: &str,
    ) -> Result<Download, VfsError> {
        let segments = virtual_segments(virtual_path)?;
        let roots = self.roots(scope).await?;

        match self.locate(&roots, &segments).await? {
            VirtualLocation::Root => {
                // A share of one file opens as that file
                if let [root] = roots.as_slice() {
                    let attributes = self.storage.stat(&root.resolved.real).await?;
                    if !attributes.file_type.is_dir() {
                        return Ok(Download::File {
                            name: root.virtual_name.clone(),
                            real: root.resolved.real.clone(),
                            size: attributes.size,
                        });
                    }
                }
                let sources = roots
                    .iter()
                    .map(|root| PackageSource {
                        real: root.resolved.real.clone(),
                        archive_name: root.virtual_name.clone(),
                    })
                    .collect();
                Ok(Download::Archive {
                    name: format!("{}.zip", archive_name),
                    data: self.package_sources(sources).await?,
                })
            }
            VirtualLocation::Item(mapped) => {
                let attributes = self.storage.stat(&mapped.real).await?;
                let name = mapped.name().to_string();
                if attributes.file_type.is_dir() {
                    let sources = vec![PackageSource {
                        real: mapped.real.clone(),
                        archive_name: name.clone(),
                    }];
                    Ok(Download::Archive {
                        name: format!("{}.zip", name),
                        data: self.package_sources(sources).await?,
                    })
                } else {
                    Ok(Download::File {
                        name,
                        real: mapped.real,
                        size: attributes.size,
                    })
                }
            }
        }
    }

    /// Package several virtual items into one archive. Selecting the virtual
    /// root selects every share root. Items that cannot be mapped are
    /// skipped and reported; the call fails only when nothing is left.
    pub async fn package_selection(
        &self,
        scope: &ShareScope,
        virtual_paths: &[String],
    ) -> Result<PackagedSelection, VfsError> {
        if virtual_paths.is_empty() {
            return Err(VfsError::InvalidInput("No items selected".to_string()));
        }
        let roots = self.roots(scope).await?;

        let mut selected = Vec::new();
        let mut skipped = Vec::new();
        for virtual_path in virtual_paths {
            let located = match virtual_segments(virtual_path) {
                Ok(segments) => self.locate(&roots, &segments).await,
                Err(e) => Err(e),
            };
            match located {
                Ok(VirtualLocation::Root) => {
                    selected.extend(roots.iter().map(|root| (root.resolved.real.clone(), root.virtual_name.clone())))
                }
                Ok(VirtualLocation::Item(mapped)) => {
                    let name = mapped.name().to_string();
                    selected.push((mapped.real, name));
                }
                Err(error) => {
                    debug!(path = %virtual_path, error = %error, "Skipping unselectable item");
                    skipped.push(BatchError {
                        item: virtual_path.clone(),
                        error,
                    });
                }
            }
        }
        if selected.is_empty() {
            return Err(VfsError::inaccessible());
        }

        let mut taken = HashSet::new();
        let mut sources = Vec::with_capacity(selected.len());
        for (real, base) in selected {
            if sources.iter().any(|s: &PackageSource| s.real == real) {
                continue;
            }
            let mut name = base.clone();
            let mut n = 2;
            while !taken.insert(name.clone()) {
                name = suffixed_name(&base, &n.to_string());
                n += 1;
            }
            sources.push(PackageSource { real, archive_name: name });
        }

        Ok(PackagedSelection {
            data: self.package_sources(sources).await?,
            skipped,
        })
    }

    async fn package_sources(&self, sources: Vec<PackageSource>) -> Result<Vec<u8>, VfsError> {
        let packager = Arc::clone(&self.packager);
        let data = tokio::task::spawn_blocking(move || packager.package(&sources))
            .await
            .map_err(|e| VfsError::UpstreamIo(format!("Archive writer task failed: {}", e)))??;
        Ok(data)
    }

    /// Size-capped text view of a shared file; zip files are listed.
    pub async fn read_content(&self, scope: &ShareScope, virtual_path: &str) -> Result<ContentView, VfsError> {
        let mapped = self.map_item(scope, virtual_path).await?;
        read_content_at(
            self.storage.as_ref(),
            &self.browser,
            &mapped.real,
            &mapped.virtual_path,
            self.max_content_bytes,
        )
        .await
    }

    /// Browse inside a shared zip archive. The internal path is its own
    /// namespace, validated by the archive browser.
    pub async fn browse_archive(
        &self,
        scope: &ShareScope,
        virtual_path: &str,
        internal_path: &str,
    ) -> Result<ArchiveView, VfsError> {
        let mapped = self.map_item(scope, virtual_path).await?;
        if !is_browsable_archive(mapped.name()) {
            return Err(VfsError::InvalidInput("Not a browsable archive".to_string()));
        }
        browse_archive_at(&self.browser, &mapped.real, internal_path).await
    }
}
