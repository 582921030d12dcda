// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Filesystem Errors
//!
//! Caller-facing error kinds of the filesystem core and the batch result
//! type used by trash, restore, purge, move and copy.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Uniform error surface for request handlers

use crate::domain::archive::ArchiveError;
use crate::domain::path_resolver::PathRejection;
use crate::domain::path_sanitizer::PathSanitizerError;
use crate::domain::repository::RepositoryError;
use crate::domain::storage::StorageError;
use serde::Serialize;
use thiserror::Error;

/// Message shared by missing paths and containment failures.
pub const INACCESSIBLE_PATH: &str = "Invalid or inaccessible path";

#[derive(Debug, Error)]
pub enum VfsError {
    #[error("{0}")]
    NotFound(String),

    /// Containment failure. Renders exactly like a missing path.
    #[error("Invalid or inaccessible path")]
    OutOfBounds,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("I/O failure: {0}")]
    UpstreamIo(String),
}

/// Error kind as reported to clients. `OutOfBounds` has no public kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicErrorKind {
    NotFound,
    Conflict,
    InvalidInput,
    Unauthorized,
    UpstreamIo,
}

impl VfsError {
    pub fn inaccessible() -> Self {
        VfsError::NotFound(INACCESSIBLE_PATH.to_string())
    }

    pub fn public_kind(&self) -> PublicErrorKind {
        match self {
            VfsError::NotFound(_) | VfsError::OutOfBounds => PublicErrorKind::NotFound,
            VfsError::Conflict(_) => PublicErrorKind::Conflict,
            VfsError::InvalidInput(_) => PublicErrorKind::InvalidInput,
            VfsError::Unauthorized(_) => PublicErrorKind::Unauthorized,
            VfsError::UpstreamIo(_) => PublicErrorKind::UpstreamIo,
        }
    }

    /// HTTP status used by the request handlers.
    pub fn status_code(&self) -> u16 {
        match self.public_kind() {
            PublicErrorKind::NotFound => 404,
            PublicErrorKind::Conflict => 409,
            PublicErrorKind::InvalidInput => 400,
            PublicErrorKind::Unauthorized => 403,
            PublicErrorKind::UpstreamIo => 500,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.public_kind() == PublicErrorKind::NotFound
    }
}

impl From<PathRejection> for VfsError {
    fn from(rejection: PathRejection) -> Self {
        match rejection {
            PathRejection::InvalidInput(msg) => VfsError::InvalidInput(msg),
            PathRejection::OutOfBounds => VfsError::OutOfBounds,
            PathRejection::ElevationRevoked(_) => {
                VfsError::Unauthorized("Elevated-root access is no longer available".to_string())
            }
            PathRejection::UnknownIdentity(_) | PathRejection::EmptyRoot(_) => {
                VfsError::inaccessible()
            }
        }
    }
}

impl From<StorageError> for VfsError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => VfsError::inaccessible(),
            StorageError::AlreadyExists(_) => {
                VfsError::Conflict("An item with that name already exists".to_string())
            }
            StorageError::FileTooLarge { .. } => {
                VfsError::InvalidInput("File is too large to display".to_string())
            }
            StorageError::InvalidPath(msg) => VfsError::InvalidInput(msg),
            other => VfsError::UpstreamIo(other.to_string()),
        }
    }
}

impl From<RepositoryError> for VfsError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => VfsError::NotFound(msg),
            RepositoryError::Duplicate(msg) => VfsError::Conflict(msg),
            other => VfsError::UpstreamIo(other.to_string()),
        }
    }
}

impl From<PathSanitizerError> for VfsError {
    fn from(err: PathSanitizerError) -> Self {
        VfsError::InvalidInput(err.to_string())
    }
}

impl From<ArchiveError> for VfsError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::EntryNotFound(_) => VfsError::inaccessible(),
            ArchiveError::Io(msg) => VfsError::UpstreamIo(msg),
            other => VfsError::InvalidInput(other.to_string()),
        }
    }
}

/// A failed item in a batch operation.
#[derive(Debug)]
pub struct BatchError {
    /// The item as the caller named it (path or trash id).
    pub item: String,
    pub error: VfsError,
}

impl std::fmt::Display for BatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.item, self.error)
    }
}

/// Result of a best-effort batch: successes stay committed even when other
/// items fail.
#[derive(Debug)]
pub struct BatchOutcome<T> {
    pub succeeded: Vec<T>,
    pub errors: Vec<BatchError>,
}

impl<T> BatchOutcome<T> {
    pub fn new() -> Self {
        Self {
            succeeded: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn push_ok(&mut self, item: T) {
        self.succeeded.push(item);
    }

    pub fn push_err(&mut self, item: impl Into<String>, error: VfsError) {
        self.errors.push(BatchError {
            item: item.into(),
            error,
        });
    }

    pub fn is_complete_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// At least one item was attempted and none succeeded.
    pub fn is_total_failure(&self) -> bool {
        self.succeeded.is_empty() && !self.errors.is_empty()
    }

    pub fn is_partial(&self) -> bool {
        !self.succeeded.is_empty() && !self.errors.is_empty()
    }

    /// Newline-joined per-item messages, or `None` when nothing failed.
    pub fn combined_error(&self) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }
        Some(
            self.errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }
}

impl<T> Default for BatchOutcome<T> {
    fn default() -> Self {
        Self::new()
    }
}
