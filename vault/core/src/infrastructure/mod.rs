// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure
//!
//! Adapters for the domain traits: local filesystem storage, zip archives,
//! repositories, the event bus and the notification sink.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Module root

pub mod archive;
pub mod db;
pub mod event_bus;
pub mod notifications;
pub mod repositories;
pub mod storage;
