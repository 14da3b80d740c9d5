//! Configuration management for the EPP toolkit

mod session;
mod tls;
mod tunnel;
pub mod serde_utils;

pub use session::{Credentials, SessionOptions, PASSWORD_ENV};
pub use tls::{
    ClientCertificate, PeerVerification, SecureChannelConfig, TlsVersion, LEGACY_CIPHER_POLICY,
};
pub use tunnel::{TunnelConfig, DEFAULT_CHUNK_SIZE};

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Whole configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EppConfig {
    /// Remote server and TLS parameters
    pub server: SecureChannelConfig,

    /// Login credentials
    pub credentials: Credentials,

    /// Session behaviour
    pub session: SessionOptions,

    /// Local relay tunnel
    pub tunnel: TunnelConfig,
}

impl EppConfig {
    /// Load from `path`, or fall back to defaults when the file is absent
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match load_config(path) {
            Ok(config) => Ok(config),
            Err(ConfigError::NotFound(_)) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }
}

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("epp-toolkit")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to a file
pub fn save_config<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Invalid(format!("Failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, content)
        .map_err(|e| ConfigError::Invalid(format!("Failed to write config: {}", e)))?;

    Ok(())
}
