// server/src/config.rs

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use rest_api::config::RestApiConfig;

pub const DEFAULT_DATA_DIRECTORY: &str = "data/portal";

/// Enum for the supported storage engine types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageEngineType {
    Memory,
    Sled,
}

impl FromStr for StorageEngineType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StorageEngineType::Memory),
            "sled" => Ok(StorageEngineType::Sled),
            _ => Err(anyhow!("Unknown storage engine type: {}", s)),
        }
    }
}

/// Mirrors the content under `storage:` in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_engine")]
    pub engine: StorageEngineType,
    #[serde(default = "default_data_directory")]
    pub data_directory: PathBuf,
}

fn default_engine() -> StorageEngineType {
    StorageEngineType::Sled
}

fn default_data_directory() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIRECTORY)
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            engine: default_engine(),
            data_directory: default_data_directory(),
        }
    }
}

/// Mirrors the content under `auth:` in the config file. The single fixed
/// admin credential pair lives here, never inside the core services.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_admin_username")]
    pub username: String,
    #[serde(default = "default_admin_password")]
    pub password: String,
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_admin_password() -> String {
    "admin123".to_string()
}

fn default_jwt_secret() -> String {
    "fallback_secret_for_development".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            username: default_admin_username(),
            password: default_admin_password(),
            jwt_secret: default_jwt_secret(),
        }
    }
}

/// Top-level portal configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PortalConfig {
    #[serde(default)]
    pub server: RestApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Loads the portal configuration from a YAML file, falling back to
/// defaults when no file is supplied, then applies environment overrides
/// (PORT, ADMIN_USERNAME, ADMIN_PASSWORD, JWT_SECRET).
pub fn load_config(config_file_path: Option<&Path>) -> Result<PortalConfig> {
    let mut config = match config_file_path {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_yaml2::from_str(&content)
                .map_err(|e| anyhow!("Failed to parse config file {}: {}", path.display(), e))?
        }
        None => PortalConfig::default(),
    };

    if let Ok(port) = env::var("PORT") {
        config.server.port = port
            .parse()
            .with_context(|| format!("Invalid PORT value: {}", port))?;
    }
    if let Ok(username) = env::var("ADMIN_USERNAME") {
        config.auth.username = username;
    }
    if let Ok(password) = env::var("ADMIN_PASSWORD") {
        config.auth.password = password;
    }
    if let Ok(secret) = env::var("JWT_SECRET") {
        config.auth.jwt_secret = secret;
    }

    Ok(config)
}
