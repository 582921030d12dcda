// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Identity
//!
//! Caller identities as supplied by the (external) session layer, and the
//! sandbox context derived from them for a single path resolution.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Identity value objects consumed by the path resolver

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Numeric identity id, as issued by the user store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl UserId {
    pub fn from_string(s: &str) -> Result<Self, std::num::ParseIntError> {
        Ok(Self(s.trim().parse()?))
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privilege {
    /// May request true-root access with an explicit per-call flag.
    Elevated,
    Standard,
}

/// Identity as seen by the filesystem core. Owned by the user store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    /// Display name, used in share notifications.
    pub username: String,
    /// Name of the home directory under the configured home base.
    pub home_dir_name: String,
    pub privilege: Privilege,
}

impl Identity {
    pub fn standard(id: i64, username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            id: UserId(id),
            home_dir_name: username.clone(),
            username,
            privilege: Privilege::Standard,
        }
    }

    pub fn elevated(id: i64, username: impl Into<String>) -> Self {
        Self {
            privilege: Privilege::Elevated,
            ..Self::standard(id, username)
        }
    }

    pub fn is_elevated(&self) -> bool {
        self.privilege == Privilege::Elevated
    }
}

/// Root a single resolution was checked against.
///
/// `root` is the canonical home directory for sandboxed resolutions and `/`
/// when elevated-root access was both requested and permitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxContext {
    pub owner: UserId,
    pub root: PathBuf,
    pub elevated: bool,
}
