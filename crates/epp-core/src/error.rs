//! Core error types for the EPP toolkit

use epp_protocol::{ProtocolError, ResultCode};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::types::SessionState;

/// Top-level error type shared by the client, the tunnel and the CLI
#[derive(Error, Debug)]
pub enum EppError {
    /// Malformed frame on the wire
    #[error("Framing error: {0}")]
    Framing(ProtocolError),

    /// Peer closed the stream in the middle of a frame
    #[error("Connection closed after {received} of {expected} bytes")]
    ConnectionClosed { expected: usize, received: usize },

    /// TCP connect failed or timed out
    #[error("Failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// TLS negotiation failed or timed out
    #[error("TLS handshake with {server} failed: {message}")]
    Handshake { server: String, message: String },

    /// Unexpected or unparseable EPP content
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// I/O error on an established channel
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation not allowed in the current session state
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    /// Server answered with a failure code where success was required
    #[error("Command rejected with {code}: {message}")]
    CommandRejected { code: ResultCode, message: String },

    /// Client certificate or trust anchor could not be loaded
    #[error("Certificate error for {}: {message}", path.display())]
    Certificate { path: PathBuf, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<ProtocolError> for EppError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::ConnectionClosed { expected, received } => {
                EppError::ConnectionClosed { expected, received }
            }
            ProtocolError::Io(e) => EppError::Io(e),
            e if e.is_framing() => EppError::Framing(e),
            e => EppError::Protocol(e.to_string()),
        }
    }
}

/// Coarse error category, cheap to copy and match on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Framing,
    ConnectionClosed,
    Connect,
    Handshake,
    Protocol,
    Io,
    InvalidState,
    CommandRejected,
    Certificate,
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Framing => "framing",
            ErrorKind::ConnectionClosed => "connection-closed",
            ErrorKind::Connect => "connect",
            ErrorKind::Handshake => "handshake",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Io => "io",
            ErrorKind::InvalidState => "invalid-state",
            ErrorKind::CommandRejected => "command-rejected",
            ErrorKind::Certificate => "certificate",
            ErrorKind::Config => "config",
        };
        f.write_str(name)
    }
}

impl EppError {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            EppError::Framing(_) => ErrorKind::Framing,
            EppError::ConnectionClosed { .. } => ErrorKind::ConnectionClosed,
            EppError::Connect { .. } => ErrorKind::Connect,
            EppError::Handshake { .. } => ErrorKind::Handshake,
            EppError::Protocol(_) => ErrorKind::Protocol,
            EppError::Io(_) => ErrorKind::Io,
            EppError::InvalidState { .. } => ErrorKind::InvalidState,
            EppError::CommandRejected { .. } => ErrorKind::CommandRejected,
            EppError::Certificate { .. } => ErrorKind::Certificate,
            EppError::Config(_) => ErrorKind::Config,
        }
    }

    /// Whether the underlying channel can no longer be used
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::InvalidState | ErrorKind::CommandRejected | ErrorKind::Config
        )
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),
}
