use crate::auth::{DEFAULT_HASH_ITERATIONS, DEFAULT_TOKEN_TTL_SECS};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level server configuration (`config.toml`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
}

/// `[gateway]`: listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

/// `[storage]`: where accounts and lists are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

/// `[auth]`: token signing and password hashing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for bearer tokens. When unset a random secret is
    /// generated at startup and tokens do not survive restarts.
    pub token_secret: Option<String>,
    pub token_ttl_secs: u64,
    pub hash_iterations: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: None,
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            hash_iterations: DEFAULT_HASH_ITERATIONS,
        }
    }
}
