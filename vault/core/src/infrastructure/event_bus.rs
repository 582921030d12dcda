// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Filesystem Event Bus
//!
//! Trash, share and access-audit events fanned out over a tokio broadcast
//! channel. Audit log writers and the dashboard's live views subscribe here.
//!
//! Events are not persisted; a subscriber that lags loses the oldest events.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** In-process publish/subscribe for [`DomainEvent`]

use crate::domain::events::{AccessEvent, ShareEvent, TrashEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

const DEFAULT_CAPACITY: usize = 1000;

/// Everything published on the bus, tagged by concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    Trash(TrashEvent),
    Share(ShareEvent),
    Access(AccessEvent),
}

/// Cloneable handle; every clone publishes to the same subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<DomainEvent>>,
}

impl EventBus {
    /// Capacity is the number of events buffered per subscriber before the
    /// oldest are dropped.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    pub fn publish_trash_event(&self, event: TrashEvent) {
        self.publish(DomainEvent::Trash(event));
    }

    pub fn publish_share_event(&self, event: ShareEvent) {
        self.publish(DomainEvent::Share(event));
    }

    pub fn publish_access_event(&self, event: AccessEvent) {
        self.publish(DomainEvent::Access(event));
    }

    fn publish(&self, event: DomainEvent) {
        // send() only fails when nobody is subscribed
        match self.sender.send(event) {
            Ok(delivered) => debug!(delivered, "Filesystem event published"),
            Err(broadcast::error::SendError(event)) => {
                debug!(event = ?event, "Filesystem event dropped, no subscribers")
            }
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// One subscription; sees events published after it was created.
pub struct EventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
}

impl EventReceiver {
    /// Wait for the next event. A lagging receiver reports how many events it
    /// missed and then continues with the oldest one still buffered.
    pub async fn recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => EventBusError::Closed,
            broadcast::error::RecvError::Lagged(n) => {
                warn!(missed = n, "Filesystem event receiver lagged");
                EventBusError::Lagged(n)
            }
        })
    }

    pub fn try_recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!(missed = n, "Filesystem event receiver lagged");
                EventBusError::Lagged(n)
            }
        })
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EventBusError {
    #[error("Event bus closed")]
    Closed,

    #[error("Receiver lagged by {0} events")]
    Lagged(u64),

    #[error("No event pending")]
    Empty,
}
