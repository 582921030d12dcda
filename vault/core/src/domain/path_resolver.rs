// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Path Resolver Domain Service
//!
//! Maps an identity and an untrusted path string onto a real filesystem
//! path. Every inbound file operation on a caller's own tree goes through
//! [`PathResolver::resolve`] before touching the filesystem.
//!
//! Every identity is sandboxed to `<home_base>/<home_dir_name>`. An elevated
//! identity reaches the true filesystem root only when the call explicitly
//! requests it *and* the path is absolute; role alone never unsandboxes.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Sandbox boundary enforcement for own-tree operations

use crate::domain::containment::{is_contained, resolve_real_path};
use crate::domain::identity::{Identity, SandboxContext, UserId};
use crate::domain::path_sanitizer::PathSanitizer;
use crate::domain::repository::IdentityRepository;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Why a path was rejected. Callers collapse everything except
/// `InvalidInput` into one "invalid or inaccessible path" response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathRejection {
    #[error("Unknown identity: {0}")]
    UnknownIdentity(UserId),

    #[error("No sandbox root for identity {0}")]
    EmptyRoot(UserId),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Path outside sandbox")]
    OutOfBounds,

    /// A path recorded against the true root, re-resolved for an identity
    /// that is no longer elevated.
    #[error("Identity {0} no longer has elevated-root access")]
    ElevationRevoked(UserId),
}

/// A real path that passed the containment check, together with the root
/// it was checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub real: PathBuf,
    pub sandbox: SandboxContext,
}

impl ResolvedPath {
    /// True when the path was resolved against the true filesystem root.
    pub fn escaped_sandbox(&self) -> bool {
        self.sandbox.elevated
    }

    pub fn is_root(&self) -> bool {
        self.real == self.sandbox.root
    }
}

pub struct PathResolver {
    identities: Arc<dyn IdentityRepository>,
    home_base: PathBuf,
    sanitizer: PathSanitizer,
}

impl PathResolver {
    pub fn new(identities: Arc<dyn IdentityRepository>, home_base: impl Into<PathBuf>) -> Self {
        Self {
            identities,
            home_base: home_base.into(),
            sanitizer: PathSanitizer::new(),
        }
    }

    pub fn home_base(&self) -> &Path {
        &self.home_base
    }

    pub async fn identity(&self, user: UserId) -> Result<Identity, PathRejection> {
        match self.identities.find_by_id(user).await {
            Ok(Some(identity)) => Ok(identity),
            Ok(None) => Err(PathRejection::UnknownIdentity(user)),
            Err(e) => {
                tracing::error!(user = %user, error = %e, "Identity lookup failed");
                Err(PathRejection::UnknownIdentity(user))
            }
        }
    }

    /// Unresolved home directory of an identity, as configured.
    pub fn home_dir(&self, identity: &Identity) -> Result<PathBuf, PathRejection> {
        if self.sanitizer.validate_name(&identity.home_dir_name).is_err() {
            tracing::warn!(user = %identity.id, "Identity has no usable home directory name");
            return Err(PathRejection::EmptyRoot(identity.id));
        }
        Ok(self.home_base.join(&identity.home_dir_name))
    }

    /// Canonical sandbox root of an identity.
    pub fn home_root(&self, identity: &Identity) -> Result<PathBuf, PathRejection> {
        let home = self.home_dir(identity)?;
        let root = resolve_real_path(&home).map_err(|_| PathRejection::EmptyRoot(identity.id))?;
        if root.as_os_str().is_empty() {
            return Err(PathRejection::EmptyRoot(identity.id));
        }
        Ok(root)
    }

    /// Sandbox context the given path would be resolved against.
    pub fn sandbox_for(
        &self,
        identity: &Identity,
        user_path: &str,
        request_elevated_root: bool,
    ) -> Result<SandboxContext, PathRejection> {
        if request_elevated_root && identity.is_elevated() && user_path.starts_with('/') {
            return Ok(SandboxContext {
                owner: identity.id,
                root: PathBuf::from("/"),
                elevated: true,
            });
        }
        Ok(SandboxContext {
            owner: identity.id,
            root: self.home_root(identity)?,
            elevated: false,
        })
    }

    /// Resolve a caller-supplied path for `user`.
    ///
    /// The result may not exist yet (create and restore targets); callers
    /// check existence themselves.
    pub async fn resolve(
        &self,
        user: UserId,
        user_path: &str,
        request_elevated_root: bool,
    ) -> Result<ResolvedPath, PathRejection> {
        let identity = self.identity(user).await?;
        self.resolve_for(&identity, user_path, request_elevated_root)
    }

    pub fn resolve_for(
        &self,
        identity: &Identity,
        user_path: &str,
        request_elevated_root: bool,
    ) -> Result<ResolvedPath, PathRejection> {
        let sandbox = self.sandbox_for(identity, user_path, request_elevated_root)?;
        self.resolve_in(&sandbox, user_path)
    }

    /// Re-resolve a path stored on a trash entry or share record.
    ///
    /// A path recorded with `escaped_sandbox` is only ever resolved against
    /// the true root again. If the identity has lost elevated rights since,
    /// the resolution fails instead of silently landing in the sandbox.
    pub fn resolve_recorded(
        &self,
        identity: &Identity,
        recorded_path: &str,
        escaped_sandbox: bool,
    ) -> Result<ResolvedPath, PathRejection> {
        if escaped_sandbox && !identity.is_elevated() {
            tracing::warn!(
                user = %identity.id,
                path = %recorded_path,
                "Recorded true-root path refused for non-elevated identity"
            );
            return Err(PathRejection::ElevationRevoked(identity.id));
        }
        let resolved = self.resolve_for(identity, recorded_path, escaped_sandbox)?;
        if resolved.escaped_sandbox() != escaped_sandbox {
            return Err(PathRejection::OutOfBounds);
        }
        Ok(resolved)
    }

    /// Resolve a path against an already established sandbox context.
    pub fn resolve_in(
        &self,
        sandbox: &SandboxContext,
        user_path: &str,
    ) -> Result<ResolvedPath, PathRejection> {
        let relative = self
            .sanitizer
            .normalize_user_path(user_path)
            .map_err(|e| PathRejection::InvalidInput(e.to_string()))?;

        let candidate = sandbox.root.join(relative);
        let real = resolve_real_path(&candidate).map_err(|e| {
            tracing::warn!(path = %user_path, error = %e, "Path could not be resolved");
            PathRejection::OutOfBounds
        })?;

        if !is_contained(&sandbox.root, &real) {
            tracing::warn!(
                path = %user_path,
                root = %sandbox.root.display(),
                user = %sandbox.owner,
                "Path outside sandbox boundary rejected"
            );
            return Err(PathRejection::OutOfBounds);
        }

        Ok(ResolvedPath {
            real,
            sandbox: sandbox.clone(),
        })
    }

    /// Resolve `name` as a direct child of `parent`, re-checked against the
    /// root that governed `parent`. Used for rename and create targets.
    pub fn resolve_child(
        &self,
        parent: &ResolvedPath,
        name: &str,
    ) -> Result<ResolvedPath, PathRejection> {
        self.sanitizer
            .validate_name(name)
            .map_err(|e| PathRejection::InvalidInput(e.to_string()))?;

        let real = resolve_real_path(&parent.real.join(name))
            .map_err(|_| PathRejection::OutOfBounds)?;

        if !is_contained(&parent.sandbox.root, &real) {
            tracing::warn!(
                name = %name,
                root = %parent.sandbox.root.display(),
                "Destination outside sandbox boundary rejected"
            );
            return Err(PathRejection::OutOfBounds);
        }

        Ok(ResolvedPath {
            real,
            sandbox: parent.sandbox.clone(),
        })
    }

    /// Sandbox-relative display path (`/docs/a.txt`) of a resolved path.
    pub fn display_path(&self, resolved: &ResolvedPath) -> String {
        self.sanitizer
            .strip_root(&resolved.real, &resolved.sandbox.root)
            .unwrap_or_else(|_| "/".to_string())
    }
}
