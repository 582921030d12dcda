// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `dashvault config` subcommands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use dashvault_core::domain::vfs_config::{VfsConfig, CONFIG_PATH_ENV};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration (file, defaults and env overrides)
    Show {
        /// Also list the discovery locations
        #[arg(long)]
        paths: bool,

        /// Print the effective configuration as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Check a configuration file for unusable paths and limits
    Validate {
        /// File to check (default: discovery order)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Write a starter configuration file
    Generate {
        /// Output path (default: ./dashvault-config.yaml)
        #[arg(short, long, default_value = "./dashvault-config.yaml")]
        output: PathBuf,

        /// Use the commented template
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    let config = VfsConfig::load_or_default(config_override.clone()).context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. {}: {}",
            CONFIG_PATH_ENV,
            std::env::var(CONFIG_PATH_ENV)
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./dashvault-config.yaml");
        println!("  4. ~/.dashvault/config.yaml");
        println!("  5. /etc/dashvault/config.yaml");
        println!();
    }

    if as_yaml {
        print!("{}", serde_yaml::to_string(&config).context("Failed to render configuration")?);
        return Ok(());
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Filesystem:".bold());
    println!("  Home base: {}", config.home_base.display());
    println!("  Trash base: {}", config.trash_base.display());
    println!("  Default home dirs: {}", config.default_home_dirs.join(", "));
    println!();

    println!("{}", "Limits:".bold());
    println!("  Max content bytes: {}", config.max_content_bytes);
    println!("  Max archive entry bytes: {}", config.max_archive_entry_bytes);
    println!("  Max package bytes: {}", config.max_package_bytes);
    println!();

    println!("{}", "Share storage:".bold());
    match &config.database_url {
        Some(_) => println!("  PostgreSQL (database_url set)"),
        None => println!("  In-memory"),
    }
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    let config = VfsConfig::load_or_default(config_path).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;
    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    };

    std::fs::write(&output, sample).with_context(|| format!("Failed to write config to {:?}", output))?;

    println!("{}", format!("✓ Configuration generated: {}", output.display()).green());

    Ok(())
}
