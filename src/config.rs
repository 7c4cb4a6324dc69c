//! Server configuration.
//!
//! Loaded once at start-up from a TOML file (default `notquests.toml`).
//! A missing file falls back to defaults; a malformed file is an error.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Which optional host integrations are available.
///
/// Variables and conditions backed by a disabled integration are not
/// registered, and conditions referencing them report the missing plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationsConfig {
    #[serde(default = "default_true")]
    pub economy: bool,
    #[serde(default = "default_true")]
    pub towny: bool,
    #[serde(default = "default_true")]
    pub ultimate_clans: bool,
    #[serde(default = "default_true")]
    pub placeholder_api: bool,
}

impl Default for IntegrationsConfig {
    fn default() -> Self {
        Self {
            economy: true,
            towny: true,
            ultimate_clans: true,
            placeholder_api: true,
        }
    }
}

/// Top-level server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default = "default_autosave_interval")]
    pub autosave_interval_secs: u64,
    /// Watch quests.toml / actions.toml and reload on change
    #[serde(default)]
    pub hot_reload: bool,
    #[serde(default)]
    pub integrations: IntegrationsConfig,
}

fn default_bind_address() -> String {
    "0.0.0.0:2568".to_string()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_database_url() -> String {
    "sqlite:notquests.db?mode=rwc".to_string()
}
fn default_log_filter() -> String {
    "notquests_server=info".to_string()
}
fn default_autosave_interval() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            data_dir: default_data_dir(),
            database_url: default_database_url(),
            log_filter: default_log_filter(),
            autosave_interval_secs: default_autosave_interval(),
            hot_reload: false,
            integrations: IntegrationsConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load the config file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            warn!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {:?}: {}", path, e))?;
        let config: ServerConfig = toml::from_str(&content)
            .map_err(|e| format!("Failed to parse {:?}: {}", path, e))?;

        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn quests_path(&self) -> PathBuf {
        self.data_dir.join("quests.toml")
    }

    pub fn actions_path(&self) -> PathBuf {
        self.data_dir.join("actions.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ServerConfig::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.autosave_interval_secs, 30);
        assert!(config.integrations.economy);
    }

    #[test]
    fn test_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notquests.toml");
        std::fs::write(
            &path,
            r#"
bind_address = "127.0.0.1:9000"
hot_reload = true

[integrations]
towny = false
"#,
        )
        .unwrap();

        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert!(config.hot_reload);
        assert!(!config.integrations.towny);
        assert!(config.integrations.ultimate_clans);
        assert_eq!(config.quests_path(), PathBuf::from("data").join("quests.toml"));
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "bind_address = [").unwrap();
        assert!(ServerConfig::load(&path).is_err());
    }
}
