// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the dashvault CLI

pub mod archive;
pub mod config;
pub mod resolve;
pub mod share;
pub mod trash;

pub use self::archive::ArchiveCommand;
pub use self::config::ConfigCommand;
pub use self::share::ShareCommand;
pub use self::trash::TrashCommand;

use anyhow::{Context, Result};
use clap::Args;
use dashvault_core::domain::identity::Identity;
use dashvault_core::domain::path_resolver::PathResolver;
use dashvault_core::domain::vfs_config::VfsConfig;
use dashvault_core::infrastructure::repositories::InMemoryIdentityRepository;
use std::path::PathBuf;
use std::sync::Arc;

/// The identity a command acts for. The user store is not reachable from
/// the CLI, so the operator describes the identity on the command line.
#[derive(Args, Debug, Clone)]
pub struct IdentityArgs {
    /// Numeric identity id (names the trash area)
    #[arg(long, value_name = "ID")]
    pub user_id: i64,

    /// Username, also the home directory name under home_base
    #[arg(long, value_name = "NAME")]
    pub user: String,

    /// Treat the identity as elevated
    #[arg(long)]
    pub elevated: bool,
}

impl IdentityArgs {
    pub fn identity(&self) -> Identity {
        if self.elevated {
            Identity::elevated(self.user_id, &self.user)
        } else {
            Identity::standard(self.user_id, &self.user)
        }
    }
}

pub fn load_config(config_override: Option<PathBuf>) -> Result<VfsConfig> {
    let config = VfsConfig::load_or_default(config_override).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

/// Path resolver that knows exactly one identity.
pub fn resolver_for(config: &VfsConfig, identity: Identity) -> Arc<PathResolver> {
    let identities = InMemoryIdentityRepository::new();
    identities.insert(identity);
    Arc::new(PathResolver::new(Arc::new(identities), config.home_base.clone()))
}
