// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application Services
//!
//! Use cases invoked by the dashboard's request handlers. Each service
//! resolves paths first and only then touches storage.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Module root

pub mod file_service;
pub mod share_service;
pub mod trash_service;
pub mod virtual_path;

pub use file_service::{FileService, StandardFileService};
pub use share_service::{ShareService, StandardShareService};
pub use trash_service::{StandardTrashService, TrashService};
pub use virtual_path::VirtualPathMapper;
