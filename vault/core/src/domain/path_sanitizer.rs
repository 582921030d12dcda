// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Path Sanitizer Domain Service
//!
//! Textual validation for the three kinds of untrusted path strings the
//! filesystem core accepts: sandbox paths, single entry names (rename and
//! create targets, trash ids) and archive-internal paths.
//!
//! Sanitizing is only the first half of the containment discipline. Sandbox
//! paths still go through [`crate::domain::containment`] after the textual
//! pass, since symlinks can only be judged against the real filesystem.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Reject malformed path input before it reaches the filesystem

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Path sanitization errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathSanitizerError {
    #[error("Path traversal attempt detected: {0}")]
    PathTraversal(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Path outside boundary: {0}")]
    OutsideBoundary(String),

    #[error("Path too long: {0}")]
    PathTooLong(String),
}

/// Path sanitizer domain service
///
/// # Security Guarantees
/// - Rejects NUL and other control characters in every kind of input
/// - Rejects separators and parent references in single names
/// - Archive-internal paths never contain `..`, a leading `/` or `\`
pub struct PathSanitizer {
    /// Maximum allowed path length (default: 4096)
    max_path_len: usize,
    /// Maximum allowed single name length (default: 255)
    max_name_len: usize,
}

impl PathSanitizer {
    pub fn new() -> Self {
        Self {
            max_path_len: 4096,
            max_name_len: 255,
        }
    }

    pub fn with_max_length(max_path_len: usize) -> Self {
        Self {
            max_path_len,
            ..Self::new()
        }
    }

    /// Normalize a caller-supplied sandbox path.
    ///
    /// Strips leading separators so the result can be joined onto a root,
    /// and rejects control characters. `..` segments are left in place: they
    /// are resolved against the real filesystem and caught by the
    /// containment check instead.
    ///
    /// # Examples
    /// ```
    /// use dashvault_core::domain::path_sanitizer::PathSanitizer;
    ///
    /// let sanitizer = PathSanitizer::new();
    /// assert_eq!(sanitizer.normalize_user_path("/reports/q1.csv").unwrap(), "reports/q1.csv");
    /// assert!(sanitizer.normalize_user_path("/reports/\u{7}bell").is_err());
    /// ```
    pub fn normalize_user_path<'a>(&self, path: &'a str) -> Result<&'a str, PathSanitizerError> {
        if path.len() > self.max_path_len {
            return Err(PathSanitizerError::PathTooLong(path.to_string()));
        }

        if path.chars().any(char::is_control) {
            tracing::warn!(path = %path.escape_debug(), "Path contains control characters");
            return Err(PathSanitizerError::InvalidPath(
                "Path contains control characters".to_string(),
            ));
        }

        Ok(path.trim_start_matches('/'))
    }

    /// Validate a single directory entry name (rename and create targets).
    pub fn validate_name(&self, name: &str) -> Result<(), PathSanitizerError> {
        if name.is_empty() || name.trim().is_empty() {
            return Err(PathSanitizerError::InvalidName("Name is required".to_string()));
        }

        if name.len() > self.max_name_len {
            return Err(PathSanitizerError::PathTooLong(name.to_string()));
        }

        if name == "." || name == ".." {
            tracing::warn!(name = %name, "Parent reference used as entry name");
            return Err(PathSanitizerError::PathTraversal(name.to_string()));
        }

        if name.contains('/') || name.contains('\\') {
            tracing::warn!(name = %name, "Entry name contains a path separator");
            return Err(PathSanitizerError::InvalidName(name.to_string()));
        }

        if name.chars().any(char::is_control) {
            return Err(PathSanitizerError::InvalidName(name.escape_debug().to_string()));
        }

        Ok(())
    }

    /// Normalize a path inside an archive's internal namespace.
    ///
    /// Returns the slash-joined segments without leading or trailing
    /// separators; the empty string addresses the archive root. This
    /// namespace is never joined onto a filesystem path.
    pub fn normalize_archive_path(&self, path: &str) -> Result<String, PathSanitizerError> {
        if path.len() > self.max_path_len {
            return Err(PathSanitizerError::PathTooLong(path.to_string()));
        }

        if path.chars().any(char::is_control) || path.contains('\\') {
            return Err(PathSanitizerError::InvalidPath(path.escape_debug().to_string()));
        }

        let mut segments = Vec::new();
        for segment in path.split('/') {
            match segment {
                "" | "." => continue,
                ".." => {
                    tracing::warn!(path = %path, "Archive path traversal attempt detected");
                    return Err(PathSanitizerError::PathTraversal(path.to_string()));
                }
                s => segments.push(s),
            }
        }

        Ok(segments.join("/"))
    }

    /// Validate a raw archive member name as stored in the archive.
    ///
    /// Unlike [`Self::normalize_archive_path`], absolute member names are
    /// rejected outright rather than re-rooted.
    pub fn validate_archive_member(&self, name: &str) -> Result<String, PathSanitizerError> {
        if name.starts_with('/') {
            return Err(PathSanitizerError::OutsideBoundary(name.to_string()));
        }
        let normalized = self.normalize_archive_path(name)?;
        if normalized.is_empty() {
            return Err(PathSanitizerError::InvalidPath(name.to_string()));
        }
        Ok(normalized)
    }

    /// Express `absolute_path` relative to `root` as a `/`-prefixed string.
    ///
    /// # Returns
    /// * `Ok(String)` - e.g. `/subdir/file.txt`, or `/` for the root itself
    /// * `Err(PathSanitizerError)` - Path is not under `root`
    pub fn strip_root(&self, absolute_path: &Path, root: &Path) -> Result<String, PathSanitizerError> {
        let relative: PathBuf = absolute_path
            .strip_prefix(root)
            .map(|p| p.to_path_buf())
            .map_err(|_| {
                PathSanitizerError::OutsideBoundary(absolute_path.display().to_string())
            })?;

        Ok(format!("/{}", relative.to_string_lossy()))
    }
}

/// Insert a parenthesized label between a name's stem and its extension:
/// `report.txt` + `2` gives `report (2).txt`. Dotfiles keep their whole name
/// as the stem.
pub fn suffixed_name(name: &str, label: &str) -> String {
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{} ({}){}", &name[..dot], label, &name[dot..]),
        _ => format!("{} ({})", name, label),
    }
}

impl Default for PathSanitizer {
    fn default() -> Self {
        Self::new()
    }
}
