//! Configuration file values merged with command-line flags

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use epp_core::config::{self, ClientCertificate, EppConfig};
use epp_protocol::ResultPolicy;

/// Flags that take precedence over the configuration file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub server: Option<String>,
    pub port: Option<u16>,
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
    pub client_id: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: Option<u64>,
    pub result_policy: Option<ResultPolicy>,
    pub via: Option<String>,
}

/// How a session reaches the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// TLS straight to `[server]`
    Direct,
    /// Plain TCP to a running local relay tunnel
    Via(String),
}

/// Effective settings for one invocation
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: EppConfig,
    pub route: Route,
}

impl Settings {
    /// Load the file at `path` (or the default location) and apply `overrides`
    ///
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(config::default_config_path);
        let file = EppConfig::load_or_default(&path)
            .with_context(|| format!("Failed to load config from {:?}", path))?;
        Ok(Self::resolve(file, overrides))
    }

    /// Apply `overrides` on top of `config`
    ///
    /// The password comes from the flag, then the file, then `EPP_PASSWORD`.
    pub fn resolve(mut config: EppConfig, overrides: Overrides) -> Self {
        if let Some(server) = overrides.server {
            config.server.server_name = server;
        }
        if let Some(port) = overrides.port {
            config.server.port = port;
        }
        match (overrides.cert, overrides.key) {
            (Some(certificate), key) => {
                config.server.client_certificate = Some(ClientCertificate { certificate, key });
            }
            (None, Some(key)) => {
                if let Some(existing) = config.server.client_certificate.as_mut() {
                    existing.key = Some(key);
                } else {
                    tracing::warn!("--key given without a client certificate, ignoring");
                }
            }
            (None, None) => {}
        }
        if let Some(secs) = overrides.timeout_secs {
            config.server.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(policy) = overrides.result_policy {
            config.session.result_policy = policy;
        }
        if let Some(client_id) = overrides.client_id {
            config.credentials.client_id = client_id;
        }
        if overrides.password.is_some() {
            config.credentials.password = overrides.password;
        }
        config.credentials = config.credentials.with_env_password();

        let route = match overrides.via {
            Some(addr) => Route::Via(addr),
            None => Route::Direct,
        };

        Self { config, route }
    }

    /// Reject settings no connection could succeed with
    pub fn validate(&self) -> Result<()> {
        if self.route == Route::Direct {
            self.config
                .server
                .validate()
                .context("Invalid server configuration")?;
        }
        Ok(())
    }

    /// Human-readable destination
    pub fn destination(&self) -> String {
        match &self.route {
            Route::Direct => self.config.server.address(),
            Route::Via(addr) => format!("{} (via tunnel)", addr),
        }
    }
}
