// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Value objects, aggregates and domain services of the sandboxed virtual
//! filesystem, plus the traits infrastructure adapters implement.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Module root

pub mod archive;
pub mod containment;
pub mod errors;
pub mod events;
pub mod identity;
pub mod path_resolver;
pub mod path_sanitizer;
pub mod repository;
pub mod share;
pub mod storage;
pub mod trash;
pub mod vfs_config;
