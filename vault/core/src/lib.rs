// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Dashvault Core
//!
//! Sandboxed virtual filesystem and sharing subsystem of the dashvault
//! server dashboard: path resolution under per-identity sandboxes, a
//! soft-delete trash with retention, public link and direct user shares
//! exposed as virtual namespaces, and in-memory archive browsing.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Crate root

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use domain::*;
