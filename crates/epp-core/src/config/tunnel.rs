//! Relay tunnel configuration

use serde::{Deserialize, Serialize};

/// Default bytes copied per read in each relay direction
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Configuration for the local relay tunnel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// Local address accepting plaintext clients
    pub listen_address: String,

    /// Read size of each pump
    pub chunk_size: usize,

    /// Dial the remote over plain TCP instead of TLS
    pub plain_remote: bool,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            listen_address: "127.0.0.1:7777".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            plain_remote: false,
        }
    }
}
