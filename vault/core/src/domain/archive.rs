// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Archive Contracts
//!
//! Browsing into and packaging compressed archives. Archive-internal paths
//! form their own namespace, validated by
//! [`PathSanitizer::normalize_archive_path`](crate::domain::path_sanitizer::PathSanitizer::normalize_archive_path)
//! and never joined onto a filesystem path.
//!
//! Implementations trust the real paths they are given: containment is the
//! caller's job (path resolver or virtual path mapper).

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveEntry {
    pub name: String,
    /// Archive-internal path, without leading separator.
    pub path: String,
    pub is_dir: bool,
    /// Uncompressed size; zero for pseudo-directories.
    pub size: u64,
}

/// Result of browsing one archive-internal path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArchiveView {
    Listing {
        path: String,
        entries: Vec<ArchiveEntry>,
    },
    File {
        path: String,
        size: u64,
        content: String,
    },
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Archive is corrupt or unreadable: {0}")]
    Corrupt(String),

    #[error("Archive entry too large: {name} ({actual_bytes} bytes, limit {limit_bytes})")]
    EntryTooLarge {
        name: String,
        limit_bytes: u64,
        actual_bytes: u64,
    },

    #[error("Download too large to package (limit {limit_bytes} bytes)")]
    PackageTooLarge { limit_bytes: u64 },

    #[error("Archive entry is not valid text: {0}")]
    Undecodable(String),

    #[error("Archive entry not found: {0}")]
    EntryNotFound(String),

    #[error("Invalid archive path: {0}")]
    InvalidPath(String),

    #[error("Archive I/O error: {0}")]
    Io(String),
}

/// Read-only, in-memory view into an archive file.
pub trait ArchiveBrowser: Send + Sync {
    /// List the children of a directory inside the archive, or decode a
    /// single entry. A path ending in `/` (or empty) always lists.
    fn browse(&self, archive: &Path, internal_path: &str) -> Result<ArchiveView, ArchiveError>;
}

/// One tree to package, rooted at `archive_name` inside the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSource {
    pub real: PathBuf,
    pub archive_name: String,
}

/// Builds a single compressed archive from already authorized real paths.
pub trait ArchivePackager: Send + Sync {
    /// Directory trees are walked depth-first without following symlinks.
    fn package(&self, sources: &[PackageSource]) -> Result<Vec<u8>, ArchiveError>;
}

/// True for file names the content viewers treat as browsable archives.
pub fn is_browsable_archive(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".zip")
}
