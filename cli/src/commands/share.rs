// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Share record commands
//!
//! Commands: migrate, public, direct, revoke. All of them need
//! `database_url`; in-memory share records do not outlive a process.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use dashvault_core::application::share_service::{ShareService, StandardShareService};
use dashvault_core::application::virtual_path::VirtualPathMapper;
use dashvault_core::domain::vfs_config::VfsConfig;
use dashvault_core::infrastructure::archive::{ZipArchiveBrowser, ZipPackager};
use dashvault_core::infrastructure::db::Database;
use dashvault_core::infrastructure::event_bus::EventBus;
use dashvault_core::infrastructure::notifications::InMemoryNotificationSink;
use dashvault_core::infrastructure::repositories::{PostgresDirectShareRepository, PostgresPublicShareRepository};
use dashvault_core::infrastructure::storage::LocalStorageProvider;

use super::{load_config, resolver_for, IdentityArgs};

#[derive(Subcommand)]
pub enum ShareCommand {
    /// Create the share tables
    Migrate,

    /// List an identity's public links
    Public {
        #[command(flatten)]
        identity: IdentityArgs,
    },

    /// List the direct shares an identity has created
    Direct {
        #[command(flatten)]
        identity: IdentityArgs,
    },

    /// Revoke direct shares the identity is a party to
    Revoke {
        #[command(flatten)]
        identity: IdentityArgs,

        #[arg(required = true)]
        ids: Vec<String>,
    },
}

pub async fn handle_command(command: ShareCommand, config_override: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_override)?;
    let database = connect(&config).await?;

    match command {
        ShareCommand::Migrate => {
            database.ensure_schema().await?;
            println!("{}", "✓ Share schema is up to date".green());
            Ok(())
        }
        ShareCommand::Public { identity } => {
            let shares = service(&config, &database, &identity)
                .list_public_shares(identity.identity().id)
                .await?;
            if shares.is_empty() {
                println!("{}", "No public links".dimmed());
            }
            for share in shares {
                println!(
                    "{}  {}  {}",
                    share.token.to_string().bold(),
                    share.name,
                    share.created_at.format("%Y-%m-%d %H:%M").to_string().dimmed()
                );
                for item in &share.items {
                    println!("    {}", item);
                }
            }
            Ok(())
        }
        ShareCommand::Direct { identity } => {
            let shares = service(&config, &database, &identity)
                .shared_by_me(identity.identity().id)
                .await?;
            if shares.is_empty() {
                println!("{}", "No direct shares".dimmed());
            }
            for share in shares {
                println!(
                    "{}  {} -> {}",
                    share.id.to_string().bold(),
                    share.root_path,
                    share.counterpart_name
                );
            }
            Ok(())
        }
        ShareCommand::Revoke { identity, ids } => {
            let revoked = service(&config, &database, &identity)
                .revoke(&ids, identity.identity().id)
                .await?;
            for id in revoked {
                println!("{}", format!("✓ Revoked {}", id).green());
            }
            Ok(())
        }
    }
}

async fn connect(config: &VfsConfig) -> Result<Database> {
    let url = config
        .database_url
        .as_deref()
        .context("database_url is not configured (set it in the config file or DASHVAULT_DATABASE_URL)")?;
    Database::new(url).await
}

fn service(config: &VfsConfig, database: &Database, identity: &IdentityArgs) -> StandardShareService {
    let resolver = resolver_for(config, identity.identity());
    let storage = Arc::new(LocalStorageProvider::new());
    let mapper = Arc::new(VirtualPathMapper::new(
        resolver.clone(),
        storage.clone(),
        Arc::new(ZipArchiveBrowser::new(config.max_archive_entry_bytes)),
        Arc::new(ZipPackager::new(config.max_package_bytes)),
        config.max_content_bytes,
    ));

    StandardShareService::new(
        resolver,
        mapper,
        storage,
        Arc::new(PostgresPublicShareRepository::new(database.get_pool().clone())),
        Arc::new(PostgresDirectShareRepository::new(database.get_pool().clone())),
        Arc::new(InMemoryNotificationSink::new()),
        Arc::new(EventBus::new(config.event_bus_capacity)),
    )
}
