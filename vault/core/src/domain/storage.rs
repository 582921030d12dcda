// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Storage Provider Trait - Anti-Corruption Layer for the host filesystem
//!
//! Every real path handed to a [`StorageProvider`] has already passed the
//! containment check; providers perform no boundary enforcement of their
//! own. Keeping filesystem calls behind this trait lets the application
//! services stay free of `std::fs` and its error kinds.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// File type for directory entries and attributes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    File,
    #[serde(rename = "dir")]
    Directory,
    /// Only reported for dangling links; live links report their target's type.
    Symlink,
}

impl FileType {
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAttributes {
    pub file_type: FileType,
    /// File size in bytes
    pub size: u64,
    /// Last modification time (Unix timestamp)
    pub mtime: i64,
}

/// Directory entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirEntry {
    /// File/directory name (not including path)
    pub name: String,
    pub attributes: FileAttributes,
}

/// Filesystem operations needed by the filesystem core.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// True if anything (including a dangling symlink) occupies `path`.
    async fn exists(&self, path: &Path) -> bool;

    async fn stat(&self, path: &Path) -> Result<FileAttributes, StorageError>;

    /// List a directory. Order is unspecified.
    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>, StorageError>;

    /// Create a single directory; fails with `AlreadyExists` if present.
    async fn create_dir(&self, path: &Path) -> Result<(), StorageError>;

    async fn create_dir_all(&self, path: &Path) -> Result<(), StorageError>;

    /// Create an empty file; fails with `AlreadyExists` if present.
    async fn create_file(&self, path: &Path) -> Result<(), StorageError>;

    async fn write_file(&self, path: &Path, data: &[u8]) -> Result<(), StorageError>;

    /// Read a whole file, refusing files larger than `max_bytes`.
    async fn read_file(&self, path: &Path, max_bytes: u64) -> Result<Vec<u8>, StorageError>;

    /// Move a file or directory tree, across filesystems if needed.
    async fn move_entry(&self, from: &Path, to: &Path) -> Result<(), StorageError>;

    /// Copy a file or directory tree. Symlinks inside a copied tree are skipped.
    async fn copy_entry(&self, from: &Path, to: &Path) -> Result<(), StorageError>;

    /// Remove a file, symlink or directory tree.
    async fn remove_entry(&self, path: &Path) -> Result<(), StorageError>;
}

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("File too large: path={path}, limit={limit_bytes}, actual={actual_bytes}")]
    FileTooLarge {
        path: String,
        limit_bytes: u64,
        actual_bytes: u64,
    },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl StorageError {
    /// Map an I/O error on `path` onto a storage error.
    pub fn from_io(err: std::io::Error, path: &Path) -> Self {
        let path = path.display().to_string();
        match err.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(path),
            std::io::ErrorKind::AlreadyExists => StorageError::AlreadyExists(path),
            std::io::ErrorKind::PermissionDenied => StorageError::PermissionDenied(path),
            _ => StorageError::IoError(format!("{}: {}", path, err)),
        }
    }
}
