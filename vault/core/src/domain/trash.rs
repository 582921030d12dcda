// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Trash Domain Model
//!
//! Trash records and their on-disk layout. Each trashed item is stored as
//! `<trash_base>/<owner>/<id>` with a JSON sidecar `<id>.trashinfo` next to
//! it:
//!
//! ```json
//! {"original_path": "/reports/q1.csv", "original_name": "q1.csv",
//!  "deleted_at": "2024-05-01T10:00:00.123456", "escaped_sandbox": false}
//! ```
//!
//! `deleted_at` is naive UTC in ISO-8601 form; the fractional part is
//! omitted when it is zero. Sidecars written before `escaped_sandbox`
//! existed read as sandboxed.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Trash record value objects and retention rules

use crate::domain::identity::UserId;
use crate::domain::path_sanitizer::PathSanitizer;
use crate::domain::storage::FileType;
use chrono::{Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const TRASH_INFO_SUFFIX: &str = ".trashinfo";

/// Opaque trash entry id; also the payload's file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrashId(String);

impl TrashId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accept a caller-supplied id only if it names a single entry of the
    /// trash directory.
    pub fn parse(s: &str) -> Option<Self> {
        if s.ends_with(TRASH_INFO_SUFFIX) || PathSanitizer::new().validate_name(s).is_err() {
            return None;
        }
        Some(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn sidecar_name(&self) -> String {
        format!("{}{}", self.0, TRASH_INFO_SUFFIX)
    }
}

impl Default for TrashId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TrashId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sidecar record, serialized as-is into `<id>.trashinfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrashInfo {
    /// Path string the caller used, not the real path; restore re-resolves it.
    pub original_path: String,
    pub original_name: String,
    #[serde(with = "isoformat")]
    pub deleted_at: NaiveDateTime,
    #[serde(default)]
    pub escaped_sandbox: bool,
}

impl TrashInfo {
    pub fn new(original_path: &str, original_name: &str, escaped_sandbox: bool) -> Self {
        Self {
            original_path: original_path.to_string(),
            original_name: original_name.to_string(),
            deleted_at: Utc::now().naive_utc(),
            escaped_sandbox,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn is_expired(&self, policy: RetentionPolicy, now: NaiveDateTime) -> bool {
        match policy.cutoff(now) {
            Some(cutoff) => self.deleted_at < cutoff,
            None => false,
        }
    }
}

/// A listed trash entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrashEntry {
    pub id: TrashId,
    pub owner: UserId,
    pub original_path: String,
    pub original_name: String,
    #[serde(with = "isoformat")]
    pub deleted_at: NaiveDateTime,
    pub escaped_sandbox: bool,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub size: u64,
}

/// Owner-configured retention window. Zero days disables expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetentionPolicy {
    pub days: u32,
}

impl RetentionPolicy {
    pub fn disabled() -> Self {
        Self { days: 0 }
    }

    pub fn days(days: u32) -> Self {
        Self { days }
    }

    /// Parse the stored setting value. Missing, empty or malformed values
    /// disable retention.
    pub fn from_setting(value: Option<&str>) -> Self {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => match v.parse::<u32>() {
                Ok(days) => Self { days },
                Err(_) => {
                    tracing::warn!(value = %v, "Ignoring malformed trash retention setting");
                    Self::disabled()
                }
            },
            None => Self::disabled(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.days > 0
    }

    /// Entries deleted before the cutoff are expired.
    pub fn cutoff(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        if !self.is_enabled() {
            return None;
        }
        Some(now - Duration::days(i64::from(self.days)))
    }
}

/// Locations inside one owner's trash directory.
#[derive(Debug, Clone)]
pub struct TrashLayout {
    dir: PathBuf,
}

impl TrashLayout {
    pub fn new(trash_base: &Path, owner: UserId) -> Self {
        Self {
            dir: trash_base.join(owner.to_string()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn payload(&self, id: &TrashId) -> PathBuf {
        self.dir.join(id.as_str())
    }

    pub fn sidecar(&self, id: &TrashId) -> PathBuf {
        self.dir.join(id.sidecar_name())
    }

    /// Trash id for a sidecar file name, if it is one.
    pub fn id_from_sidecar(name: &str) -> Option<TrashId> {
        name.strip_suffix(TRASH_INFO_SUFFIX).and_then(TrashId::parse)
    }
}

/// Python-compatible `isoformat()` for naive timestamps.
pub mod isoformat {
    use chrono::{NaiveDateTime, Timelike};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(value: &NaiveDateTime) -> String {
        if value.nanosecond() / 1_000 == 0 {
            value.format("%Y-%m-%dT%H:%M:%S").to_string()
        } else {
            value.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
        }
    }

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<NaiveDateTime>()
            .map_err(|e| serde::de::Error::custom(format!("invalid deleted_at '{}': {}", raw, e)))
    }
}
