// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Notification Sinks
//!
//! The dashboard's notification subsystem implements [`NotificationSink`]
//! on its own side. This module provides the in-process inbox used when the
//! core runs standalone and in tests.

use crate::domain::identity::UserId;
use crate::domain::share::{NotificationError, NotificationSink, Severity};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipient: UserId,
    pub message: String,
    pub severity: Severity,
}

/// Keeps every notification in memory, in delivery order.
#[derive(Clone, Default)]
pub struct InMemoryNotificationSink {
    delivered: Arc<RwLock<Vec<Notification>>>,
}

impl InMemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications_for(&self, recipient: UserId) -> Vec<Notification> {
        self.delivered
            .read()
            .iter()
            .filter(|n| n.recipient == recipient)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.delivered.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.delivered.read().is_empty()
    }
}

#[async_trait]
impl NotificationSink for InMemoryNotificationSink {
    async fn notify(
        &self,
        recipient: UserId,
        message: &str,
        severity: Severity,
    ) -> Result<(), NotificationError> {
        tracing::debug!(recipient = %recipient, ?severity, "Delivering notification");
        self.delivered.write().push(Notification {
            recipient,
            message: message.to_string(),
            severity,
        });
        Ok(())
    }
}
