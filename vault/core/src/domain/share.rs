// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Share Aggregates
//!
//! Two kinds of share exist. A [`PublicShare`] is an anonymous link holding
//! any number of root items; a [`DirectShare`] grants one root item to one
//! recipient. Both expose their roots to the virtual path mapper through a
//! [`ShareScope`], which is the only view of a share the mapper ever sees.

use crate::domain::identity::UserId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unguessable public link token, usable as a URL path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShareToken(String);

impl ShareToken {
    /// 128 random bits as 32 lowercase hex characters.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Accept a caller-supplied token if it could have been issued by
    /// [`ShareToken::generate`] or an older install.
    pub fn parse(s: &str) -> Option<Self> {
        let valid = !s.is_empty()
            && s.len() <= 64
            && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        valid.then(|| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ShareToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicShare {
    pub token: ShareToken,
    pub name: String,
    pub owner: UserId,
    /// Root paths relative to the owner's sandbox, in declaration order.
    pub items: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl PublicShare {
    pub fn new(owner: UserId, name: impl Into<String>, items: Vec<String>) -> Self {
        Self {
            token: ShareToken::generate(),
            name: name.into(),
            owner,
            items,
            created_at: Utc::now(),
        }
    }

    /// Public share roots always resolve inside the owner's sandbox.
    pub fn scope(&self) -> ShareScope {
        ShareScope {
            owner: self.owner,
            roots: self.items.clone(),
            escaped_sandbox: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectShareId(pub Uuid);

impl DirectShareId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for DirectShareId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DirectShareId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectShare {
    pub id: DirectShareId,
    pub sharer: UserId,
    pub recipient: UserId,
    pub root_path: String,
    pub shared_at: DateTime<Utc>,
    /// Root was resolved against the true filesystem root at share time.
    pub escaped_sandbox: bool,
}

impl DirectShare {
    pub fn new(sharer: UserId, recipient: UserId, root_path: impl Into<String>, escaped_sandbox: bool) -> Self {
        Self {
            id: DirectShareId::new(),
            sharer,
            recipient,
            root_path: root_path.into(),
            shared_at: Utc::now(),
            escaped_sandbox,
        }
    }

    pub fn involves(&self, user: UserId) -> bool {
        self.sharer == user || self.recipient == user
    }

    pub fn scope(&self) -> ShareScope {
        ShareScope {
            owner: self.sharer,
            roots: vec![self.root_path.clone()],
            escaped_sandbox: self.escaped_sandbox,
        }
    }
}

/// The granted part of an owner's tree: root paths in owner-sandbox
/// coordinates, resolved against the root they were created with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareScope {
    pub owner: UserId,
    pub roots: Vec<String>,
    pub escaped_sandbox: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Outbound notifications, implemented by the notification subsystem.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(
        &self,
        recipient: UserId,
        message: &str,
        severity: Severity,
    ) -> Result<(), NotificationError>;
}

#[derive(Debug, Error)]
#[error("Notification delivery failed: {0}")]
pub struct NotificationError(pub String);

/// Text of the notification sent to a direct share recipient.
pub fn direct_share_message(item_name: &str, sharer_name: &str) -> String {
    format!("'{}' was shared with you by {}.", item_name, sharer_name)
}
