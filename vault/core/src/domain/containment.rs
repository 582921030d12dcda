// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Containment
//!
//! Real-path resolution and the containment check shared by the path
//! resolver and the share registry.
//!
//! [`resolve_real_path`] behaves like a non-strict `realpath(3)`: every
//! existing prefix is resolved through its symlinks, `..` is applied after
//! resolution, and a missing tail is appended as-is. The containment check is
//! only ever applied to its output.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Symlink-safe boundary enforcement

use std::io;
use std::path::{Component, Path, PathBuf};

/// Same limit the kernel applies (`ELOOP`).
const MAX_SYMLINK_DEPTH: usize = 40;

/// Resolve `path` to an absolute path with all symlinks and `.`/`..`
/// segments removed. Components that do not exist are kept lexically.
pub fn resolve_real_path(path: &Path) -> io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    resolve_from(PathBuf::from("/"), &absolute, &mut 0)
}

fn resolve_from(mut resolved: PathBuf, path: &Path, links_followed: &mut usize) -> io::Result<PathBuf> {
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => resolved = PathBuf::from("/"),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(name) => {
                let next = resolved.join(name);
                match std::fs::symlink_metadata(&next) {
                    Ok(meta) if meta.file_type().is_symlink() => {
                        *links_followed += 1;
                        if *links_followed > MAX_SYMLINK_DEPTH {
                            return Err(io::Error::other("too many levels of symbolic links"));
                        }
                        let target = std::fs::read_link(&next)?;
                        resolved = resolve_from(resolved, &target, links_followed)?;
                    }
                    _ => resolved = next,
                }
            }
        }
    }
    Ok(resolved)
}

/// True when `candidate` equals `root` or is a separator-delimited
/// descendant of it. Both paths must already be real paths.
///
/// Comparison is per component, so `/docs-private` is not inside `/docs`.
pub fn is_contained(root: &Path, candidate: &Path) -> bool {
    candidate.starts_with(root)
}
