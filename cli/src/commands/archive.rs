// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Archive inspection commands
//!
//! Reads archives entirely in memory; nothing is extracted to disk.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use dashvault_core::domain::archive::{ArchiveBrowser, ArchiveView};
use dashvault_core::infrastructure::archive::ZipArchiveBrowser;

use super::load_config;

#[derive(Subcommand)]
pub enum ArchiveCommand {
    /// List a directory inside an archive, or print a text entry
    Ls {
        /// Zip file on the local filesystem
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Archive-internal path (default: archive root)
        #[arg(value_name = "PATH", default_value = "")]
        internal_path: String,
    },
}

pub async fn handle_command(command: ArchiveCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ArchiveCommand::Ls { file, internal_path } => ls(file, internal_path, config_override).await,
    }
}

async fn ls(file: PathBuf, internal_path: String, config_override: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_override)?;
    let browser = ZipArchiveBrowser::new(config.max_archive_entry_bytes);

    let view = tokio::task::spawn_blocking(move || browser.browse(&file, &internal_path))
        .await
        .context("Archive reader task failed")?
        .context("Failed to read archive")?;

    match view {
        ArchiveView::Listing { path, entries } => {
            println!("{}", format!("/{}", path).bold());
            if entries.is_empty() {
                println!("{}", "  (empty)".dimmed());
            }
            for entry in entries {
                if entry.is_dir {
                    println!("  {}/", entry.name.blue());
                } else {
                    println!("  {:<40} {:>12}", entry.name, entry.size);
                }
            }
        }
        ArchiveView::File { content, .. } => print!("{}", content),
    }
    Ok(())
}
