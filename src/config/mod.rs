//! Server configuration.
//!
//! Resolution order, later wins: built-in defaults, `config.toml`,
//! environment variables, command-line flags (applied by the binary).

pub mod schema;

pub use schema::{AuthConfig, Config, GatewayConfig, StorageConfig};

use anyhow::{Context, Result};
use directories::UserDirs;
use std::path::{Path, PathBuf};

/// Directory under the home folder holding the default config file.
pub const CONFIG_DIR_NAME: &str = ".watchlist";

/// Environment variables read by [`Config::apply_env_overrides`].
pub const ENV_PORT: &str = "PORT";
pub const ENV_HOST: &str = "WATCHLIST_HOST";
pub const ENV_DATA_DIR: &str = "WATCHLIST_DATA_DIR";
pub const ENV_TOKEN_SECRET: &str = "WATCHLIST_TOKEN_SECRET";

/// `~/.watchlist/config.toml`, if a home directory can be found.
pub fn default_config_path() -> Option<PathBuf> {
    UserDirs::new().map(|u| u.home_dir().join(CONFIG_DIR_NAME).join("config.toml"))
}

impl Config {
    /// Load from an explicit path (must exist) or from the default
    /// location (optional). Falls back to defaults when nothing is found.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match default_config_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => {
                tracing::debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        tracing::info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup. Blank values are ignored; an
    /// unparsable port is logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        if let Some(port) = var(ENV_PORT) {
            match port.parse() {
                Ok(port) => self.gateway.port = port,
                Err(e) => tracing::warn!("Invalid {ENV_PORT} value {port:?}: {e}"),
            }
        }
        if let Some(host) = var(ENV_HOST) {
            self.gateway.host = host;
        }
        if let Some(dir) = var(ENV_DATA_DIR) {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(secret) = var(ENV_TOKEN_SECRET) {
            self.auth.token_secret = Some(secret);
        }
    }

    /// The configured token secret, if it is set and non-blank.
    pub fn token_secret(&self) -> Option<&str> {
        self.auth
            .token_secret
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
