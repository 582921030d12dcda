// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Path resolution check
//!
//! Prints the real path a client-supplied path maps to, or the same uniform
//! rejection a client would get.

use anyhow::Result;
use colored::Colorize;
use dashvault_core::domain::errors::VfsError;
use std::path::PathBuf;

use super::{load_config, resolver_for, IdentityArgs};

pub async fn handle_command(
    path: String,
    identity: IdentityArgs,
    root_access: bool,
    config_override: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_override)?;
    let resolver = resolver_for(&config, identity.identity());

    match resolver.resolve(identity.identity().id, &path, root_access).await {
        Ok(resolved) => {
            println!("{}", resolved.real.display());
            if resolved.escaped_sandbox() {
                println!("{}", "(resolved against the filesystem root)".yellow());
            } else {
                println!("{}", format!("(sandbox: {})", resolved.sandbox.root.display()).dimmed());
            }
            Ok(())
        }
        Err(rejection) => {
            tracing::debug!(reason = %rejection, "Path rejected");
            let err = VfsError::from(rejection);
            eprintln!("{}", format!("✗ {}", err).red());
            std::process::exit(2);
        }
    }
}
