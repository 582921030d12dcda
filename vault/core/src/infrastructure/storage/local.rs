// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Local Filesystem Storage Provider
//!
//! `std::fs` implementation of [`StorageProvider`] for the dashboard host.
//! Paths arrive already resolved and contained, so this provider never
//! interprets `..` or follows symlinks on its own account: trees are copied
//! and removed without traversing links.
//!
//! Moves use `rename(2)` and fall back to copy-then-remove when the source
//! and destination live on different filesystems (trash on its own volume is
//! a common layout).

use crate::domain::storage::{DirEntry, FileAttributes, FileType, StorageError, StorageProvider};
use async_trait::async_trait;
use std::fs::Metadata;
use std::io::Read;
use std::path::Path;
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

#[derive(Debug, Clone, Default)]
pub struct LocalStorageProvider;

impl LocalStorageProvider {
    pub fn new() -> Self {
        Self
    }

    fn attributes(meta: &Metadata) -> FileAttributes {
        let file_type = if meta.is_dir() {
            FileType::Directory
        } else if meta.file_type().is_symlink() {
            FileType::Symlink
        } else {
            FileType::File
        };
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        FileAttributes {
            file_type,
            size: meta.len(),
            mtime,
        }
    }

    /// Stat following symlinks, falling back to the link itself when it
    /// dangles.
    fn stat_path(path: &Path) -> Result<FileAttributes, StorageError> {
        match std::fs::metadata(path) {
            Ok(meta) => Ok(Self::attributes(&meta)),
            Err(_) => std::fs::symlink_metadata(path)
                .map(|meta| Self::attributes(&meta))
                .map_err(|e| StorageError::from_io(e, path)),
        }
    }

    /// Recursive copy that never traverses symlinks. With
    /// `preserve_symlinks` the links themselves are recreated, otherwise
    /// they are skipped.
    fn copy_tree(from: &Path, to: &Path, preserve_symlinks: bool) -> Result<(), StorageError> {
        let meta = std::fs::symlink_metadata(from).map_err(|e| StorageError::from_io(e, from))?;
        if !meta.is_dir() {
            std::fs::copy(from, to).map_err(|e| StorageError::from_io(e, from))?;
            return Ok(());
        }

        for entry in WalkDir::new(from).follow_links(false) {
            let entry = entry.map_err(|e| StorageError::IoError(e.to_string()))?;
            let relative = entry
                .path()
                .strip_prefix(from)
                .map_err(|_| StorageError::InvalidPath(entry.path().display().to_string()))?;
            let target = to.join(relative);
            let file_type = entry.file_type();

            if file_type.is_dir() {
                std::fs::create_dir_all(&target).map_err(|e| StorageError::from_io(e, &target))?;
            } else if file_type.is_symlink() {
                if preserve_symlinks {
                    Self::copy_symlink(entry.path(), &target)?;
                } else {
                    tracing::debug!(path = %entry.path().display(), "Skipping symlink during copy");
                }
            } else {
                std::fs::copy(entry.path(), &target).map_err(|e| StorageError::from_io(e, entry.path()))?;
            }
        }
        Ok(())
    }

    #[cfg(unix)]
    fn copy_symlink(link: &Path, target: &Path) -> Result<(), StorageError> {
        let destination = std::fs::read_link(link).map_err(|e| StorageError::from_io(e, link))?;
        std::os::unix::fs::symlink(destination, target).map_err(|e| StorageError::from_io(e, target))
    }

    #[cfg(not(unix))]
    fn copy_symlink(link: &Path, _target: &Path) -> Result<(), StorageError> {
        tracing::debug!(path = %link.display(), "Dropping symlink during cross-device move");
        Ok(())
    }

    fn remove_path(path: &Path) -> Result<(), StorageError> {
        let meta = std::fs::symlink_metadata(path).map_err(|e| StorageError::from_io(e, path))?;
        let result = if meta.is_dir() {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        };
        result.map_err(|e| StorageError::from_io(e, path))
    }

    #[cfg(unix)]
    fn is_cross_device(err: &std::io::Error) -> bool {
        err.raw_os_error() == Some(libc::EXDEV)
    }

    #[cfg(not(unix))]
    fn is_cross_device(_err: &std::io::Error) -> bool {
        false
    }
}

#[async_trait]
impl StorageProvider for LocalStorageProvider {
    async fn exists(&self, path: &Path) -> bool {
        std::fs::symlink_metadata(path).is_ok()
    }

    async fn stat(&self, path: &Path) -> Result<FileAttributes, StorageError> {
        Self::stat_path(path)
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>, StorageError> {
        let entries = std::fs::read_dir(path).map_err(|e| StorageError::from_io(e, path))?;

        let mut result = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::from_io(e, path))?;
            let entry_path = entry.path();
            match Self::stat_path(&entry_path) {
                Ok(attributes) => result.push(DirEntry {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    attributes,
                }),
                // Raced with a concurrent delete
                Err(StorageError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(result)
    }

    async fn create_dir(&self, path: &Path) -> Result<(), StorageError> {
        std::fs::create_dir(path).map_err(|e| StorageError::from_io(e, path))
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), StorageError> {
        std::fs::create_dir_all(path).map_err(|e| StorageError::from_io(e, path))
    }

    async fn create_file(&self, path: &Path) -> Result<(), StorageError> {
        std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map(|_| ())
            .map_err(|e| StorageError::from_io(e, path))
    }

    async fn write_file(&self, path: &Path, data: &[u8]) -> Result<(), StorageError> {
        std::fs::write(path, data).map_err(|e| StorageError::from_io(e, path))
    }

    async fn read_file(&self, path: &Path, max_bytes: u64) -> Result<Vec<u8>, StorageError> {
        let file = std::fs::File::open(path).map_err(|e| StorageError::from_io(e, path))?;
        let size = file.metadata().map_err(|e| StorageError::from_io(e, path))?.len();
        if size > max_bytes {
            return Err(StorageError::FileTooLarge {
                path: path.display().to_string(),
                limit_bytes: max_bytes,
                actual_bytes: size,
            });
        }

        // The file may grow between stat and read
        let mut data = Vec::with_capacity(size as usize);
        file.take(max_bytes + 1)
            .read_to_end(&mut data)
            .map_err(|e| StorageError::from_io(e, path))?;
        if data.len() as u64 > max_bytes {
            return Err(StorageError::FileTooLarge {
                path: path.display().to_string(),
                limit_bytes: max_bytes,
                actual_bytes: data.len() as u64,
            });
        }
        Ok(data)
    }

    async fn move_entry(&self, from: &Path, to: &Path) -> Result<(), StorageError> {
        if std::fs::symlink_metadata(to).is_ok() {
            return Err(StorageError::AlreadyExists(to.display().to_string()));
        }

        match std::fs::rename(from, to) {
            Ok(()) => Ok(()),
            Err(e) if Self::is_cross_device(&e) => {
                tracing::debug!(
                    from = %from.display(),
                    to = %to.display(),
                    "Cross-device move, falling back to copy and remove"
                );
                if let Err(copy_err) = Self::copy_tree(from, to, true) {
                    // Leave the source intact; drop the partial copy
                    let _ = Self::remove_path(to);
                    return Err(copy_err);
                }
                Self::remove_path(from)
            }
            Err(e) => Err(StorageError::from_io(e, from)),
        }
    }

    async fn copy_entry(&self, from: &Path, to: &Path) -> Result<(), StorageError> {
        if std::fs::symlink_metadata(to).is_ok() {
            return Err(StorageError::AlreadyExists(to.display().to_string()));
        }
        Self::copy_tree(from, to, false)
    }

    async fn remove_entry(&self, path: &Path) -> Result<(), StorageError> {
        Self::remove_path(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_and_remove_directory_tree() {
        let temp_dir = TempDir::new().unwrap();
        let provider = LocalStorageProvider::new();
        let dir = temp_dir.path().join("volume");

        provider.create_dir(&dir).await.unwrap();
        provider.write_file(&dir.join("a.txt"), b"hello").await.unwrap();
        assert!(provider.exists(&dir.join("a.txt")).await);

        provider.remove_entry(&dir).await.unwrap();
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_create_duplicate_fails() {
        let temp_dir = TempDir::new().unwrap();
        let provider = LocalStorageProvider::new();
        let dir = temp_dir.path().join("volume");

        provider.create_dir(&dir).await.unwrap();
        let result = provider.create_dir(&dir).await;
        assert!(matches!(result, Err(StorageError::AlreadyExists(_))));

        let file = temp_dir.path().join("f");
        provider.create_file(&file).await.unwrap();
        assert!(matches!(provider.create_file(&file).await, Err(StorageError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_remove_nonexistent_fails() {
        let temp_dir = TempDir::new().unwrap();
        let provider = LocalStorageProvider::new();
        let result = provider.remove_entry(&temp_dir.path().join("missing")).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_read_file_respects_cap() {
        let temp_dir = TempDir::new().unwrap();
        let provider = LocalStorageProvider::new();
        let file = temp_dir.path().join("big.txt");
        std::fs::write(&file, vec![b'x'; 64]).unwrap();

        assert_eq!(provider.read_file(&file, 64).await.unwrap().len(), 64);
        assert!(matches!(
            provider.read_file(&file, 63).await,
            Err(StorageError::FileTooLarge { actual_bytes: 64, .. })
        ));
    }

    #[tokio::test]
    async fn test_move_refuses_to_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let provider = LocalStorageProvider::new();
        let a = temp_dir.path().join("a");
        let b = temp_dir.path().join("b");
        std::fs::write(&a, "a").unwrap();
        std::fs::write(&b, "b").unwrap();

        assert!(matches!(provider.move_entry(&a, &b).await, Err(StorageError::AlreadyExists(_))));
        assert_eq!(std::fs::read_to_string(&b).unwrap(), "b");

        let c = temp_dir.path().join("c");
        provider.move_entry(&a, &c).await.unwrap();
        assert!(!a.exists());
        assert_eq!(std::fs::read_to_string(&c).unwrap(), "a");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_copy_tree_skips_symlinks() {
        let temp_dir = TempDir::new().unwrap();
        let provider = LocalStorageProvider::new();
        let src = temp_dir.path().join("src");
        std::fs::create_dir_all(src.join("nested")).unwrap();
        std::fs::write(src.join("nested/file.txt"), "data").unwrap();
        std::os::unix::fs::symlink("/etc", src.join("escape")).unwrap();

        let dst = temp_dir.path().join("dst");
        provider.copy_entry(&src, &dst).await.unwrap();

        assert_eq!(std::fs::read_to_string(dst.join("nested/file.txt")).unwrap(), "data");
        assert!(std::fs::symlink_metadata(dst.join("escape")).is_err());
    }

    #[tokio::test]
    async fn test_read_dir_reports_types_and_sizes() {
        let temp_dir = TempDir::new().unwrap();
        let provider = LocalStorageProvider::new();
        std::fs::create_dir(temp_dir.path().join("sub")).unwrap();
        std::fs::write(temp_dir.path().join("f.txt"), "abc").unwrap();

        let mut entries = provider.read_dir(temp_dir.path()).await.unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "f.txt");
        assert_eq!(entries[0].attributes.size, 3);
        assert_eq!(entries[1].attributes.file_type, FileType::Directory);
    }
}
