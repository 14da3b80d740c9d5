//! epp-core: Configuration, errors and the secure channel for the EPP toolkit
//!
//! This crate provides the shared configuration structures, the error
//! taxonomy, and the TLS channel used by the session client, the relay
//! tunnel, and the CLI.

pub mod channel;
pub mod config;
pub mod error;
pub mod types;

pub use channel::{SecureChannel, Transport};
pub use config::{EppConfig, SecureChannelConfig};
pub use error::{ConfigError, EppError, ErrorKind};
pub use types::SessionState;
