// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Filesystem Configuration
//!
//! YAML configuration for the filesystem core, discovered in the usual
//! locations and overridable through environment variables for container
//! deployments.
//!
//! ```yaml
//! home_base: /data/home
//! trash_base: /data/.trash
//! max_content_bytes: 5242880
//! max_archive_entry_bytes: 5242880
//! max_package_bytes: 1073741824
//! default_home_dirs: [Videos, Music, Documents, Downloads, Gallery]
//! event_bus_capacity: 1000
//! database_url: postgres://dashvault@localhost/dashvault
//! ```
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Filesystem core configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "DASHVAULT_CONFIG_PATH";

const FIVE_MIB: u64 = 5 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VfsConfig {
    /// Parent directory of every identity's sandbox root.
    #[serde(default = "default_home_base")]
    pub home_base: PathBuf,

    /// Parent directory of the per-identity trash areas.
    #[serde(default = "default_trash_base")]
    pub trash_base: PathBuf,

    /// Largest file the content viewers will return.
    #[serde(default = "default_size_cap")]
    pub max_content_bytes: u64,

    /// Largest single archive entry the archive browser will decode.
    #[serde(default = "default_size_cap")]
    pub max_archive_entry_bytes: u64,

    /// Cap on the uncompressed bytes packaged into one zip download.
    #[serde(default = "default_package_cap")]
    pub max_package_bytes: u64,

    /// Directories created in a freshly provisioned home.
    #[serde(default = "default_home_dirs")]
    pub default_home_dirs: Vec<String>,

    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,

    /// PostgreSQL connection string for share records. In-memory when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
}

fn default_home_base() -> PathBuf {
    PathBuf::from("/data/home")
}

fn default_trash_base() -> PathBuf {
    PathBuf::from("/data/.trash")
}

fn default_size_cap() -> u64 {
    FIVE_MIB
}

fn default_package_cap() -> u64 {
    1024 * 1024 * 1024
}

fn default_home_dirs() -> Vec<String> {
    ["Videos", "Music", "Documents", "Downloads", "Gallery"]
        .iter()
        .map(|d| d.to_string())
        .collect()
}

fn default_event_bus_capacity() -> usize {
    1000
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            home_base: default_home_base(),
            trash_base: default_trash_base(),
            max_content_bytes: default_size_cap(),
            max_archive_entry_bytes: default_size_cap(),
            max_package_bytes: default_package_cap(),
            default_home_dirs: default_home_dirs(),
            event_bus_capacity: default_event_bus_capacity(),
            database_url: None,
        }
    }
}

impl VfsConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. DASHVAULT_CONFIG_PATH environment variable
    /// 2. ./dashvault-config.yaml (working directory)
    /// 3. ~/.dashvault/config.yaml (user home)
    /// 4. /etc/dashvault/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./dashvault-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".dashvault").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/dashvault/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        let mut config = match Self::discover_config() {
            Some(config_path) => {
                tracing::info!("Loading configuration from discovered path: {:?}", config_path);
                Self::from_yaml_file(config_path)?
            }
            None => {
                tracing::warn!("No configuration file found in standard locations. Using defaults.");
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DASHVAULT_HOME_BASE") {
            tracing::info!("Environment override: DASHVAULT_HOME_BASE={}", val);
            self.home_base = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("DASHVAULT_TRASH_BASE") {
            tracing::info!("Environment override: DASHVAULT_TRASH_BASE={}", val);
            self.trash_base = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("DASHVAULT_MAX_CONTENT_BYTES") {
            match val.parse::<u64>() {
                Ok(bytes) => {
                    tracing::info!("Environment override: DASHVAULT_MAX_CONTENT_BYTES={}", bytes);
                    self.max_content_bytes = bytes;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for DASHVAULT_MAX_CONTENT_BYTES: '{}'. Expected a byte count. Ignoring.",
                    val
                ),
            }
        }

        if let Ok(val) = std::env::var("DASHVAULT_DATABASE_URL") {
            self.database_url = Some(val);
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.home_base.is_absolute() {
            anyhow::bail!("home_base must be an absolute path: {:?}", self.home_base);
        }

        if !self.trash_base.is_absolute() {
            anyhow::bail!("trash_base must be an absolute path: {:?}", self.trash_base);
        }

        if self.home_base == self.trash_base {
            anyhow::bail!("home_base and trash_base must differ");
        }

        if self.trash_base.starts_with(&self.home_base) {
            anyhow::bail!(
                "trash_base {:?} must not be inside home_base {:?}",
                self.trash_base,
                self.home_base
            );
        }

        if self.max_content_bytes == 0 {
            anyhow::bail!("max_content_bytes must be greater than zero");
        }

        if self.max_archive_entry_bytes == 0 {
            anyhow::bail!("max_archive_entry_bytes must be greater than zero");
        }

        if self.max_package_bytes == 0 {
            anyhow::bail!("max_package_bytes must be greater than zero");
        }

        for dir in &self.default_home_dirs {
            if dir.is_empty() || dir.contains('/') || dir == ".." || dir == "." {
                anyhow::bail!("Invalid default home directory name: '{}'", dir);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_existing_installs() {
        let config = VfsConfig::default();
        assert_eq!(config.home_base, PathBuf::from("/data/home"));
        assert_eq!(config.trash_base, PathBuf::from("/data/.trash"));
        assert_eq!(config.max_content_bytes, 5 * 1024 * 1024);
        assert_eq!(config.max_package_bytes, 1024 * 1024 * 1024);
        assert_eq!(config.default_home_dirs.len(), 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config = VfsConfig::from_yaml_str("home_base: /srv/homes\n").unwrap();
        assert_eq!(config.home_base, PathBuf::from("/srv/homes"));
        assert_eq!(config.trash_base, PathBuf::from("/data/.trash"));
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_trash_inside_home_rejected() {
        let config = VfsConfig {
            trash_base: PathBuf::from("/data/home/.trash"),
            ..VfsConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_relative_base_rejected() {
        let config = VfsConfig {
            home_base: PathBuf::from("homes"),
            ..VfsConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_file_round_trip() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("dashvault-config.yaml");
        let config = VfsConfig {
            max_content_bytes: 1024,
            ..VfsConfig::default()
        };
        config.to_yaml_file(&path).unwrap();
        assert_eq!(VfsConfig::from_yaml_file(&path).unwrap(), config);
    }
}
