//! epp-tunnel: Local relay to a remote EPP server
//!
//! The tunnel accepts plaintext connections on a local port and bridges
//! each one to a freshly dialed TLS connection, copying bytes both ways
//! without interpreting them. A stub EPP server is included for staging
//! clients and tunnels without a real registry.

pub mod dialer;
pub mod listener;
pub mod relay;
pub mod stub;

pub use dialer::{Dialer, PlainDialer, SecureDialer};
pub use listener::RelayTunnel;
pub use relay::{relay, Direction, RelayStats};
pub use stub::{StubConfig, StubServer};
