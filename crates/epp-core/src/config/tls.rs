//! Secure channel configuration

use openssl::ssl::SslVersion;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::serde_utils::duration_secs;
use crate::error::ConfigError;

/// Cipher string accepted by registries that still run legacy stacks
pub const LEGACY_CIPHER_POLICY: &str = "DEFAULT:@SECLEVEL=0";

/// TLS protocol version bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TlsVersion {
    #[serde(rename = "tls1.0")]
    Tls10,
    #[serde(rename = "tls1.1")]
    Tls11,
    #[serde(rename = "tls1.2")]
    Tls12,
    #[serde(rename = "tls1.3")]
    Tls13,
}

impl TlsVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            TlsVersion::Tls10 => "tls1.0",
            TlsVersion::Tls11 => "tls1.1",
            TlsVersion::Tls12 => "tls1.2",
            TlsVersion::Tls13 => "tls1.3",
        }
    }
}

impl fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TlsVersion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tls1.0" | "tls10" | "tls1_0" | "1.0" => Ok(TlsVersion::Tls10),
            "tls1.1" | "tls11" | "tls1_1" | "1.1" => Ok(TlsVersion::Tls11),
            "tls1.2" | "tls12" | "tls1_2" | "1.2" => Ok(TlsVersion::Tls12),
            "tls1.3" | "tls13" | "tls1_3" | "1.3" => Ok(TlsVersion::Tls13),
            _ => Err(ConfigError::Invalid(format!("unknown TLS version: {}", s))),
        }
    }
}

impl From<TlsVersion> for SslVersion {
    fn from(v: TlsVersion) -> Self {
        match v {
            TlsVersion::Tls10 => SslVersion::TLS1,
            TlsVersion::Tls11 => SslVersion::TLS1_1,
            TlsVersion::Tls12 => SslVersion::TLS1_2,
            TlsVersion::Tls13 => SslVersion::TLS1_3,
        }
    }
}

/// Whether the server certificate chain is checked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerVerification {
    #[default]
    None,
    Full,
}

impl FromStr for PeerVerification {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(PeerVerification::None),
            "full" | "on" => Ok(PeerVerification::Full),
            _ => Err(ConfigError::Invalid(format!(
                "unknown peer verification mode: {}",
                s
            ))),
        }
    }
}

/// Client certificate presented during the handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCertificate {
    /// PEM certificate chain
    pub certificate: PathBuf,

    /// PEM private key; when absent the key is read from `certificate`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<PathBuf>,
}

impl ClientCertificate {
    /// Certificate and key stored together in one PEM bundle
    pub fn bundle(path: impl Into<PathBuf>) -> Self {
        Self {
            certificate: path.into(),
            key: None,
        }
    }

    /// File holding the private key
    pub fn key_path(&self) -> &PathBuf {
        self.key.as_ref().unwrap_or(&self.certificate)
    }
}

/// Parameters for opening a TLS channel to an EPP server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecureChannelConfig {
    /// Server host name (also sent as SNI)
    pub server_name: String,

    /// Server TCP port
    pub port: u16,

    /// Lowest protocol version offered
    pub min_tls_version: TlsVersion,

    /// Highest protocol version offered
    pub max_tls_version: TlsVersion,

    /// OpenSSL cipher list
    pub cipher_policy: String,

    /// Permit legacy server connect and unsafe renegotiation
    pub allow_legacy_renegotiation: bool,

    /// Do not match the certificate against `server_name`
    pub skip_hostname_verification: bool,

    /// Server certificate chain checking
    pub peer_verification: PeerVerification,

    /// Extra trust anchors used with full verification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<PathBuf>,

    /// Bound on TCP connect and on the TLS handshake (seconds)
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Optional client certificate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_certificate: Option<ClientCertificate>,
}

impl Default for SecureChannelConfig {
    fn default() -> Self {
        Self::legacy_compatible("localhost", 700)
    }
}

impl SecureChannelConfig {
    /// Parameters accepted by registries running old TLS stacks:
    /// TLS 1.2 only, security level 0 ciphers, legacy renegotiation,
    /// no certificate or host name checks, 15 second timeout
    pub fn legacy_compatible(server_name: impl Into<String>, port: u16) -> Self {
        Self {
            server_name: server_name.into(),
            port,
            client_certificate: None,
            min_tls_version: TlsVersion::Tls12,
            max_tls_version: TlsVersion::Tls12,
            cipher_policy: LEGACY_CIPHER_POLICY.to_string(),
            allow_legacy_renegotiation: true,
            skip_hostname_verification: true,
            peer_verification: PeerVerification::None,
            ca_file: None,
            connect_timeout: Duration::from_secs(15),
        }
    }

    /// Set the client certificate
    pub fn with_client_certificate(mut self, cert: ClientCertificate) -> Self {
        self.client_certificate = Some(cert);
        self
    }

    /// Set the connect/handshake timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// `host:port` string for dialing
    pub fn address(&self) -> String {
        format!("{}:{}", self.server_name, self.port)
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_name.is_empty() {
            return Err(ConfigError::MissingField("server.server_name".into()));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("server.port must be non-zero".into()));
        }
        if self.min_tls_version > self.max_tls_version {
            return Err(ConfigError::Invalid(format!(
                "min_tls_version {} is above max_tls_version {}",
                self.min_tls_version, self.max_tls_version
            )));
        }
        if self.cipher_policy.trim().is_empty() {
            return Err(ConfigError::Invalid("cipher_policy is empty".into()));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::Invalid("connect_timeout must be non-zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_preset() {
        let config = SecureChannelConfig::legacy_compatible("epp.example.net", 700);
        assert_eq!(config.address(), "epp.example.net:700");
        assert_eq!(config.min_tls_version, TlsVersion::Tls12);
        assert_eq!(config.max_tls_version, TlsVersion::Tls12);
        assert_eq!(config.cipher_policy, "DEFAULT:@SECLEVEL=0");
        assert!(config.allow_legacy_renegotiation);
        assert!(config.skip_hostname_verification);
        assert_eq!(config.peer_verification, PeerVerification::None);
        assert_eq!(config.connect_timeout, Duration::from_secs(15));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_tls_version_parse() {
        assert_eq!("tls1.2".parse::<TlsVersion>().unwrap(), TlsVersion::Tls12);
        assert_eq!("TLS1_3".parse::<TlsVersion>().unwrap(), TlsVersion::Tls13);
        assert_eq!("1.0".parse::<TlsVersion>().unwrap(), TlsVersion::Tls10);
        assert!("ssl3".parse::<TlsVersion>().is_err());
        assert!(TlsVersion::Tls11 < TlsVersion::Tls12);
    }

    #[test]
    fn test_validate_rejects_inverted_versions() {
        let mut config = SecureChannelConfig::default();
        config.min_tls_version = TlsVersion::Tls13;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_empty_host() {
        let config = SecureChannelConfig::legacy_compatible("", 700);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField(_))
        ));
    }

    #[test]
    fn test_bundle_key_path() {
        let bundle = ClientCertificate::bundle("/etc/epp/client.pem");
        assert_eq!(bundle.key_path(), &PathBuf::from("/etc/epp/client.pem"));

        let split = ClientCertificate {
            certificate: "/etc/epp/cert.pem".into(),
            key: Some("/etc/epp/key.pem".into()),
        };
        assert_eq!(split.key_path(), &PathBuf::from("/etc/epp/key.pem"));
    }

    #[test]
    fn test_toml_roundtrip_uses_readable_names() {
        let config = SecureChannelConfig::legacy_compatible("epp.example.net", 700)
            .with_client_certificate(ClientCertificate::bundle("client.pem"));
        let text = toml::to_string(&config).unwrap();
        assert!(text.contains("min_tls_version = \"tls1.2\""));
        assert!(text.contains("peer_verification = \"none\""));
        assert!(text.contains("connect_timeout = 15"));

        let parsed: SecureChannelConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let parsed: SecureChannelConfig =
            toml::from_str("server_name = \"epp.example.org\"\nport = 7000\n").unwrap();
        assert_eq!(parsed.port, 7000);
        assert_eq!(parsed.cipher_policy, LEGACY_CIPHER_POLICY);
    }
}
