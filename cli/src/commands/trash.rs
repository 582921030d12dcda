// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Trash maintenance commands
//!
//! Commands: list, restore, purge, empty

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use dashvault_core::application::trash_service::{StandardTrashService, TrashService};
use dashvault_core::domain::errors::BatchOutcome;
use dashvault_core::domain::repository::TRASH_RETENTION_SETTING;
use dashvault_core::infrastructure::event_bus::EventBus;
use dashvault_core::infrastructure::repositories::InMemoryUserSettingsRepository;
use dashvault_core::infrastructure::storage::LocalStorageProvider;

use super::{load_config, resolver_for, IdentityArgs};

#[derive(Args, Debug, Clone)]
pub struct TrashTarget {
    #[command(flatten)]
    pub identity: IdentityArgs,

    /// Retention window in days applied before listing (0 disables)
    #[arg(long, value_name = "DAYS")]
    pub retention_days: Option<u32>,
}

#[derive(Subcommand)]
pub enum TrashCommand {
    /// List trashed items (applies retention first)
    List {
        #[command(flatten)]
        target: TrashTarget,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Restore items to their original paths
    Restore {
        #[command(flatten)]
        target: TrashTarget,

        /// Trash ids as shown by `list`
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Permanently delete items
    Purge {
        #[command(flatten)]
        target: TrashTarget,

        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Permanently delete everything in the trash
    Empty {
        #[command(flatten)]
        target: TrashTarget,

        /// Skip confirmation
        #[arg(long)]
        yes: bool,
    },
}

pub async fn handle_command(command: TrashCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        TrashCommand::List { target, json } => list(target, json, config_override).await,
        TrashCommand::Restore { target, ids } => restore(target, ids, config_override).await,
        TrashCommand::Purge { target, ids } => purge(target, ids, config_override).await,
        TrashCommand::Empty { target, yes } => empty(target, yes, config_override).await,
    }
}

fn service(target: &TrashTarget, config_override: Option<PathBuf>) -> Result<StandardTrashService> {
    let config = load_config(config_override)?;
    let settings = InMemoryUserSettingsRepository::new();
    if let Some(days) = target.retention_days {
        settings.set(target.identity.identity().id, TRASH_RETENTION_SETTING, days.to_string());
    }

    Ok(StandardTrashService::new(
        resolver_for(&config, target.identity.identity()),
        Arc::new(LocalStorageProvider::new()),
        Arc::new(settings),
        Arc::new(EventBus::new(config.event_bus_capacity)),
        config.trash_base.clone(),
    ))
}

fn report<T: std::fmt::Display>(verb: &str, outcome: &BatchOutcome<T>) -> Result<()> {
    for item in &outcome.succeeded {
        println!("{}", format!("✓ {} {}", verb, item).green());
    }
    if let Some(errors) = outcome.combined_error() {
        for line in errors.lines() {
            eprintln!("{}", format!("✗ {}", line).red());
        }
    }
    if outcome.is_total_failure() {
        bail!("Nothing was {}", verb.to_lowercase());
    }
    Ok(())
}

async fn list(target: TrashTarget, json: bool, config_override: Option<PathBuf>) -> Result<()> {
    let service = service(&target, config_override)?;
    let entries = service
        .list(target.identity.identity().id)
        .await
        .context("Failed to list trash")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("{}", "Trash is empty".dimmed());
        return Ok(());
    }

    println!(
        "{:<38} {:<20} {:>12}  {}",
        "ID".bold(),
        "DELETED".bold(),
        "SIZE".bold(),
        "ORIGINAL PATH".bold()
    );
    for entry in &entries {
        let path = if entry.escaped_sandbox {
            format!("{} {}", entry.original_path, "(root)".yellow())
        } else {
            entry.original_path.clone()
        };
        println!(
            "{:<38} {:<20} {:>12}  {}",
            entry.id,
            entry.deleted_at.format("%Y-%m-%d %H:%M:%S"),
            entry.size,
            path
        );
    }
    Ok(())
}

async fn restore(target: TrashTarget, ids: Vec<String>, config_override: Option<PathBuf>) -> Result<()> {
    let service = service(&target, config_override)?;
    let outcome = service.restore(target.identity.identity().id, &ids).await?;
    report("Restored", &outcome)
}

async fn purge(target: TrashTarget, ids: Vec<String>, config_override: Option<PathBuf>) -> Result<()> {
    let service = service(&target, config_override)?;
    let outcome = service.purge(target.identity.identity().id, &ids).await?;
    report("Purged", &outcome)
}

async fn empty(target: TrashTarget, yes: bool, config_override: Option<PathBuf>) -> Result<()> {
    if !yes {
        bail!("Refusing to empty the trash without --yes");
    }
    let service = service(&target, config_override)?;
    service.empty(target.identity.identity().id).await?;
    println!("{}", "✓ Trash emptied".green());
    Ok(())
}
