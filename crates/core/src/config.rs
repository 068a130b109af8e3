//! Application configuration.
//!
//! Values are layered from serde defaults, an optional TOML file under the
//! user's config directory and `TRADEUP_`-prefixed environment variables.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// Directory under the user's config directory that holds our files.
pub const CONFIG_DIR: &str = "tradeup";

const DEFAULT_CATALOG_BASE_URL: &str =
    "https://raw.githubusercontent.com/ByMykel/CSGO-API/main/public/api/en";

const DEFAULT_CONFIG: &str = r#"# tradeup configuration

# Base URL the catalog documents (skins.json, crates.json, ...) are fetched from.
catalog_base_url = "https://raw.githubusercontent.com/ByMykel/CSGO-API/main/public/api/en"
catalog_fetch_timeout_secs = 20

# Seconds to wait for a trade-up completion before giving up.
craft_timeout_secs = 30

# Delay between consecutive storage container commands.
container_stagger_ms = 100

# accounts_path = "/path/to/accounts.json"
"#;

/// Runtime configuration shared by the core components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the external catalog provider.
    #[serde(default = "default_catalog_base_url")]
    pub catalog_base_url: String,
    /// Per-document HTTP timeout.
    #[serde(default = "default_catalog_fetch_timeout_secs")]
    pub catalog_fetch_timeout_secs: u64,
    /// Location of the persisted account store.
    #[serde(default = "default_accounts_path")]
    pub accounts_path: PathBuf,
    /// Bound on how long a craft waits for its completion event.
    #[serde(default = "default_craft_timeout_secs")]
    pub craft_timeout_secs: u64,
    /// Pause between successive container commands.
    #[serde(default = "default_container_stagger_ms")]
    pub container_stagger_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            catalog_base_url: default_catalog_base_url(),
            catalog_fetch_timeout_secs: default_catalog_fetch_timeout_secs(),
            accounts_path: default_accounts_path(),
            craft_timeout_secs: default_craft_timeout_secs(),
            container_stagger_ms: default_container_stagger_ms(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file location and environment.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Load configuration from an explicit file path (missing files are allowed).
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix("TRADEUP"))
            .build()
            .with_context(|| format!("failed to read configuration {}", path.display()))?;
        settings
            .try_deserialize()
            .context("failed to parse configuration")
    }

    /// Craft completion bound as a [`Duration`].
    pub fn craft_timeout(&self) -> Duration {
        Duration::from_secs(self.craft_timeout_secs)
    }

    /// Container command stagger as a [`Duration`].
    pub fn container_stagger(&self) -> Duration {
        Duration::from_millis(self.container_stagger_ms)
    }

    /// Catalog fetch timeout as a [`Duration`].
    pub fn catalog_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.catalog_fetch_timeout_secs)
    }
}

/// Root directory for configuration and account data.
pub fn config_root() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR)
}

/// Default configuration file path.
pub fn config_path() -> PathBuf {
    config_root().join("config.toml")
}

/// Write the commented default configuration if no file exists yet.
pub fn ensure_default_config() -> Result<PathBuf> {
    let path = config_path();
    write_default_config(&path)?;
    Ok(path)
}

fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write {}", path.display()))
}

fn default_catalog_base_url() -> String {
    DEFAULT_CATALOG_BASE_URL.to_string()
}

fn default_catalog_fetch_timeout_secs() -> u64 {
    20
}

fn default_accounts_path() -> PathBuf {
    config_root().join("accounts.json")
}

fn default_craft_timeout_secs() -> u64 {
    30
}

fn default_container_stagger_ms() -> u64 {
    100
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() -> Result<()> {
        let dir = tempdir()?;
        let config = AppConfig::load_from(dir.path().join("absent.toml"))?;
        assert_eq!(config.craft_timeout_secs, 30);
        assert_eq!(config.container_stagger(), Duration::from_millis(100));
        assert_eq!(config.catalog_base_url, DEFAULT_CATALOG_BASE_URL);
        Ok(())
    }

    #[test]
    fn default_file_round_trips_and_overrides_apply() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested/config.toml");
        write_default_config(&path)?;
        assert!(path.exists());

        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.catalog_fetch_timeout_secs, 20);

        fs::write(&path, "craft_timeout_secs = 5\ncontainer_stagger_ms = 10\n")?;
        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.craft_timeout(), Duration::from_secs(5));
        assert_eq!(config.container_stagger_ms, 10);
        Ok(())
    }
}
