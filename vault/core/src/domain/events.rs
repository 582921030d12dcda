// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::identity::UserId;
use crate::domain::share::{DirectShareId, ShareToken};
use crate::domain::trash::TrashId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trash lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrashEvent {
    ItemTrashed {
        owner: UserId,
        trash_id: TrashId,
        original_path: String,
        escaped_sandbox: bool,
        trashed_at: DateTime<Utc>,
    },
    ItemRestored {
        owner: UserId,
        trash_id: TrashId,
        restored_path: String,
        restored_at: DateTime<Utc>,
    },
    ItemPurged {
        owner: UserId,
        trash_id: TrashId,
        purged_at: DateTime<Utc>,
    },
    /// Expired entries removed as a side effect of a listing.
    RetentionPurged {
        owner: UserId,
        retention_days: u32,
        purged_count: usize,
        purged_at: DateTime<Utc>,
    },
    TrashEmptied {
        owner: UserId,
        emptied_at: DateTime<Utc>,
    },
}

/// Share lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ShareEvent {
    PublicShareCreated {
        token: ShareToken,
        owner: UserId,
        item_count: usize,
        created_at: DateTime<Utc>,
    },
    PublicShareDeleted {
        token: ShareToken,
        owner: UserId,
        deleted_at: DateTime<Utc>,
    },
    DirectShareCreated {
        share_id: DirectShareId,
        sharer: UserId,
        recipient: UserId,
        root_path: String,
        created_at: DateTime<Utc>,
    },
    DirectSharesRevoked {
        share_ids: Vec<DirectShareId>,
        requester: UserId,
        revoked_at: DateTime<Utc>,
    },
}

/// Security audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AccessEvent {
    /// A path failed a containment check. The attempted path is recorded
    /// here and in the log, never in the caller's response.
    AccessRejected {
        user: Option<UserId>,
        attempted_path: String,
        context: String,
        rejected_at: DateTime<Utc>,
    },
}
