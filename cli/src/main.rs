// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # dashvault CLI
//!
//! Operator tool embedding the dashvault filesystem core. The dashboard's
//! request handlers call the same services; this binary exists for
//! configuration checks and maintenance on the host.
//!
//! ## Commands
//!
//! - `dashvault config show|validate|generate` - Configuration management
//! - `dashvault resolve <path>` - Check how a path resolves for an identity
//! - `dashvault trash list|restore|purge|empty` - Trash maintenance
//! - `dashvault share migrate|public|direct|revoke` - Share records in PostgreSQL
//! - `dashvault archive ls <file> [path]` - Inspect a zip archive in memory

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod commands;

use commands::{ArchiveCommand, ConfigCommand, IdentityArgs, ShareCommand, TrashCommand};

/// dashvault - sandboxed file access for the server dashboard
#[derive(Parser)]
#[command(name = "dashvault")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "DASHVAULT_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "DASHVAULT_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Resolve a path the way file requests do
    #[command(name = "resolve")]
    Resolve {
        /// Path as a client would send it
        path: String,

        #[command(flatten)]
        identity: IdentityArgs,

        /// Request elevated-root access (only honored for elevated identities)
        #[arg(long)]
        root_access: bool,
    },

    /// Trash maintenance for one identity
    #[command(name = "trash")]
    Trash {
        #[command(subcommand)]
        command: TrashCommand,
    },

    /// Share records (requires database_url)
    #[command(name = "share")]
    Share {
        #[command(subcommand)]
        command: ShareCommand,
    },

    /// Inspect zip archives without extracting them
    #[command(name = "archive")]
    Archive {
        #[command(subcommand)]
        command: ArchiveCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Config { command }) => commands::config::handle_command(command, cli.config).await,
        Some(Commands::Resolve {
            path,
            identity,
            root_access,
        }) => commands::resolve::handle_command(path, identity, root_access, cli.config).await,
        Some(Commands::Trash { command }) => commands::trash::handle_command(command, cli.config).await,
        Some(Commands::Share { command }) => commands::share::handle_command(command, cli.config).await,
        Some(Commands::Archive { command }) => commands::archive::handle_command(command, cli.config).await,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    Ok(())
}
