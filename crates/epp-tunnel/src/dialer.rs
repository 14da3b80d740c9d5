//! Outbound leg of a relay session

use async_trait::async_trait;
use epp_core::{EppError, SecureChannel, SecureChannelConfig, Transport};
use std::io;
use std::time::Duration;
use tokio::net::TcpStream;

/// Opens a fresh connection to the fixed remote for every relay session
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    /// Stream produced by a successful dial
    type Stream: Transport + 'static;

    /// Connect to the remote
    async fn dial(&self) -> Result<Self::Stream, EppError>;

    /// Remote address, for logging
    fn remote(&self) -> String;
}

/// Dials the remote over TLS
#[derive(Debug, Clone)]
pub struct SecureDialer {
    config: SecureChannelConfig,
}

impl SecureDialer {
    pub fn new(config: SecureChannelConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Dialer for SecureDialer {
    type Stream = SecureChannel;

    async fn dial(&self) -> Result<SecureChannel, EppError> {
        SecureChannel::open(&self.config).await
    }

    fn remote(&self) -> String {
        self.config.address()
    }
}

/// Dials the remote over plain TCP (for staging against a stub server)
#[derive(Debug, Clone)]
pub struct PlainDialer {
    address: String,
    connect_timeout: Duration,
}

impl PlainDialer {
    pub fn new(address: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            address: address.into(),
            connect_timeout,
        }
    }
}

#[async_trait]
impl Dialer for PlainDialer {
    type Stream = TcpStream;

    async fn dial(&self) -> Result<TcpStream, EppError> {
        tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.address))
            .await
            .map_err(|_| EppError::Connect {
                address: self.address.clone(),
                source: io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
            })?
            .map_err(|source| EppError::Connect {
                address: self.address.clone(),
                source,
            })
    }

    fn remote(&self) -> String {
        self.address.clone()
    }
}
