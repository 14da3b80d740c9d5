//! TLS channel to an EPP server
//!
//! Registries still run TLS stacks that modern OpenSSL defaults refuse to
//! talk to, so every knob that matters (protocol bounds, cipher string,
//! legacy renegotiation, verification) comes from [`SecureChannelConfig`].

use openssl::ssl::{SslConnector, SslFiletype, SslMethod, SslOptions, SslVerifyMode};
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_openssl::SslStream;

use crate::config::{PeerVerification, SecureChannelConfig};
use crate::error::{ConfigError, EppError};

/// Byte stream a session or relay can run over
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

/// Established TLS connection
pub struct SecureChannel {
    stream: SslStream<TcpStream>,
    server: String,
}

impl SecureChannel {
    /// Connect, then run the TLS handshake
    ///
    /// Both phases are bounded by `connect_timeout`. Settings OpenSSL refuses
    /// are [`EppError::Config`] and nothing is dialed. A failed or slow TCP
    /// connect is [`EppError::Connect`]; anything after that is
    /// [`EppError::Handshake`].
    pub async fn open(config: &SecureChannelConfig) -> Result<Self, EppError> {
        let address = config.address();
        let connector = build_connector(config)?;

        tracing::debug!("Connecting to {}", address);
        let tcp = tokio::time::timeout(config.connect_timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| EppError::Connect {
                address: address.clone(),
                source: io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
            })?
            .map_err(|source| EppError::Connect {
                address: address.clone(),
                source,
            })?;
        if let Err(e) = tcp.set_nodelay(true) {
            tracing::debug!("Failed to set TCP_NODELAY: {}", e);
        }

        let handshake_error = |message: String| EppError::Handshake {
            server: address.clone(),
            message,
        };

        let ssl = connector
            .configure()
            .map_err(|e| handshake_error(e.to_string()))?
            .verify_hostname(!config.skip_hostname_verification)
            .into_ssl(&config.server_name)
            .map_err(|e| handshake_error(e.to_string()))?;
        let mut stream = SslStream::new(ssl, tcp).map_err(|e| handshake_error(e.to_string()))?;

        tokio::time::timeout(config.connect_timeout, Pin::new(&mut stream).connect())
            .await
            .map_err(|_| handshake_error("handshake timed out".to_string()))?
            .map_err(|e| handshake_error(e.to_string()))?;

        let channel = Self {
            stream,
            server: address,
        };
        tracing::info!(
            cipher = channel.cipher().unwrap_or("unknown"),
            version = channel.protocol_version(),
            "TLS established with {}",
            channel.server
        );
        Ok(channel)
    }

    /// Negotiated cipher suite
    pub fn cipher(&self) -> Option<&'static str> {
        self.stream.ssl().current_cipher().map(|c| c.name())
    }

    /// Negotiated protocol version, e.g. `TLSv1.2`
    pub fn protocol_version(&self) -> &'static str {
        self.stream.ssl().version_str()
    }

    /// `host:port` of the peer
    pub fn server(&self) -> &str {
        &self.server
    }
}

impl std::fmt::Debug for SecureChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureChannel")
            .field("server", &self.server)
            .field("version", &self.protocol_version())
            .field("cipher", &self.cipher())
            .finish()
    }
}

/// Build the OpenSSL context for `config`
///
/// Certificate material is read here, so every `open` picks up the files
/// as they are on disk at that moment.
fn build_connector(config: &SecureChannelConfig) -> Result<SslConnector, EppError> {
    let setup_error = |e: openssl::error::ErrorStack| {
        EppError::Config(ConfigError::Invalid(format!(
            "TLS settings for {} rejected: {e}",
            config.address()
        )))
    };

    let mut builder = SslConnector::builder(SslMethod::tls_client()).map_err(setup_error)?;
    builder
        .set_min_proto_version(Some(config.min_tls_version.into()))
        .map_err(setup_error)?;
    builder
        .set_max_proto_version(Some(config.max_tls_version.into()))
        .map_err(setup_error)?;
    builder
        .set_cipher_list(&config.cipher_policy)
        .map_err(setup_error)?;

    if config.allow_legacy_renegotiation {
        builder.set_options(
            SslOptions::ALLOW_UNSAFE_LEGACY_RENEGOTIATION
                | SslOptions::from_bits_retain(openssl_sys::SSL_OP_LEGACY_SERVER_CONNECT),
        );
    }

    match config.peer_verification {
        PeerVerification::None => builder.set_verify(SslVerifyMode::NONE),
        PeerVerification::Full => {
            builder.set_verify(SslVerifyMode::PEER);
            if let Some(ca_file) = &config.ca_file {
                builder
                    .set_ca_file(ca_file)
                    .map_err(|e| certificate_error(ca_file, e))?;
            }
        }
    }

    if let Some(cert) = &config.client_certificate {
        builder
            .set_certificate_chain_file(&cert.certificate)
            .map_err(|e| certificate_error(&cert.certificate, e))?;
        builder
            .set_private_key_file(cert.key_path(), SslFiletype::PEM)
            .map_err(|e| certificate_error(cert.key_path(), e))?;
        builder
            .check_private_key()
            .map_err(|e| certificate_error(cert.key_path(), e))?;
        tracing::debug!("Loaded client certificate {}", cert.certificate.display());
    }

    Ok(builder.build())
}

fn certificate_error(path: &Path, e: openssl::error::ErrorStack) -> EppError {
    EppError::Certificate {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

impl AsyncRead for SecureChannel {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for SecureChannel {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientCertificate;
    use crate::error::ErrorKind;
    use std::time::Duration;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = SecureChannelConfig::legacy_compatible("127.0.0.1", port)
            .with_connect_timeout(Duration::from_secs(2));
        let err = SecureChannel::open(&config).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connect);
    }

    #[tokio::test]
    async fn test_handshake_timeout_against_silent_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let config = SecureChannelConfig::legacy_compatible("127.0.0.1", port)
            .with_connect_timeout(Duration::from_millis(300));
        let err = SecureChannel::open(&config).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Handshake);
        server.abort();
    }

    #[tokio::test]
    async fn test_handshake_fails_on_plaintext_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            let (mut socket, _) = listener.accept().await.unwrap();
            let _ = socket.write_all(b"this is not TLS at all\r\n").await;
        });

        let config = SecureChannelConfig::legacy_compatible("127.0.0.1", port)
            .with_connect_timeout(Duration::from_secs(2));
        let err = SecureChannel::open(&config).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Handshake);
    }

    #[tokio::test]
    async fn test_unknown_cipher_policy_is_config_error() {
        // Port is never dialed, the context is rejected first
        let mut config = SecureChannelConfig::legacy_compatible("127.0.0.1", 700);
        config.cipher_policy = "NO-SUCH-CIPHER".into();

        let err = SecureChannel::open(&config).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.to_string().contains("127.0.0.1:700"));
    }

    #[tokio::test]
    async fn test_missing_client_certificate() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = SecureChannelConfig::legacy_compatible("127.0.0.1", 700)
            .with_client_certificate(ClientCertificate::bundle(dir.path().join("missing.pem")));

        let err = SecureChannel::open(&config).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Certificate);
    }
}
