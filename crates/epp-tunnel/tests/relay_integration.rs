//! Relay tunnel integration tests
//!
//! Every test binds ephemeral ports, runs the tunnel in-process and talks
//! to it over real sockets.

use std::net::SocketAddr;
use std::pin::Pin;
use std::time::Duration;

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::ssl::{Ssl, SslAcceptor, SslMethod};
use openssl::x509::{X509NameBuilder, X509};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use epp_client::EppSession;
use epp_core::config::{Credentials, PeerVerification, SessionOptions};
use epp_core::{ErrorKind, SecureChannel, SecureChannelConfig, SessionState};
use epp_protocol::Classification;
use epp_tunnel::{Dialer, PlainDialer, RelayTunnel, SecureDialer, StubConfig, StubServer};

const WAIT: Duration = Duration::from_secs(5);

/// Remote that echoes every byte back
async fn spawn_echo_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let (mut rd, mut wr) = socket.split();
                let _ = tokio::io::copy(&mut rd, &mut wr).await;
            });
        }
    });
    addr
}

/// Start a tunnel in front of `dialer`, returning its local address
async fn spawn_tunnel<D: Dialer>(dialer: D, cancel: CancellationToken) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let tunnel = RelayTunnel::new(dialer, cancel);
    tokio::spawn(async move {
        tunnel.serve(listener).await.unwrap();
    });
    addr
}

fn plain(addr: SocketAddr) -> PlainDialer {
    PlainDialer::new(addr.to_string(), Duration::from_secs(2))
}

#[tokio::test]
async fn test_relay_echo_ping() {
    let cancel = CancellationToken::new();
    let echo = spawn_echo_server().await;
    let tunnel = spawn_tunnel(plain(echo), cancel.clone()).await;

    let mut client = TcpStream::connect(tunnel).await.unwrap();
    client.write_all(b"PING").await.unwrap();

    let mut buf = [0u8; 4];
    timeout(WAIT, client.read_exact(&mut buf))
        .await
        .expect("echo timed out")
        .unwrap();
    assert_eq!(&buf, b"PING");

    cancel.cancel();
}

#[tokio::test]
async fn test_relay_preserves_order_across_chunks() {
    let cancel = CancellationToken::new();
    let echo = spawn_echo_server().await;
    let tunnel = spawn_tunnel(plain(echo), cancel.clone()).await;

    let payload: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
    let client = TcpStream::connect(tunnel).await.unwrap();
    let (mut rd, mut wr) = client.into_split();

    let expected = payload.clone();
    let writer = tokio::spawn(async move {
        wr.write_all(&payload).await.unwrap();
        wr
    });

    let mut received = vec![0u8; expected.len()];
    timeout(WAIT, rd.read_exact(&mut received))
        .await
        .expect("echo timed out")
        .unwrap();
    assert_eq!(received, expected);

    let _ = writer.await.unwrap();
    cancel.cancel();
}

#[tokio::test]
async fn test_remote_close_propagates_to_local() {
    let cancel = CancellationToken::new();

    // Remote accepts and hangs up immediately
    let remote = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let remote_addr = remote.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((socket, _)) = remote.accept().await {
            drop(socket);
        }
    });

    let tunnel = spawn_tunnel(plain(remote_addr), cancel.clone()).await;
    let mut client = TcpStream::connect(tunnel).await.unwrap();

    let mut buf = [0u8; 16];
    let n = timeout(WAIT, client.read(&mut buf))
        .await
        .expect("local leg stayed open")
        .unwrap_or(0);
    assert_eq!(n, 0);

    cancel.cancel();
}

#[tokio::test]
async fn test_local_close_propagates_to_remote() {
    let cancel = CancellationToken::new();

    let remote = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let remote_addr = remote.local_addr().unwrap();
    let tunnel = spawn_tunnel(plain(remote_addr), cancel.clone()).await;

    let client = TcpStream::connect(tunnel).await.unwrap();
    let (mut remote_socket, _) = timeout(WAIT, remote.accept()).await.unwrap().unwrap();
    drop(client);

    let mut buf = Vec::new();
    let n = timeout(WAIT, remote_socket.read_to_end(&mut buf))
        .await
        .expect("remote leg stayed open")
        .unwrap();
    assert_eq!(n, 0);

    cancel.cancel();
}

#[tokio::test]
async fn test_dial_failure_is_isolated() {
    let cancel = CancellationToken::new();

    // Nothing listens on this port once the listener is dropped
    let unused = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = unused.local_addr().unwrap();
    drop(unused);

    let tunnel = spawn_tunnel(plain(dead_addr), cancel.clone()).await;

    for _ in 0..3 {
        let mut client = TcpStream::connect(tunnel).await.unwrap();
        let mut buf = [0u8; 1];
        let n = timeout(WAIT, client.read(&mut buf))
            .await
            .expect("local socket not dropped after dial failure")
            .unwrap_or(0);
        assert_eq!(n, 0);
    }

    cancel.cancel();
}

#[tokio::test]
async fn test_session_through_tunnel_to_stub() {
    let cancel = CancellationToken::new();

    let stub_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let stub_addr = stub_listener.local_addr().unwrap();
    let stub = StubServer::new(StubConfig::default(), cancel.clone());
    tokio::spawn(async move { stub.serve(stub_listener).await });

    let tunnel = spawn_tunnel(plain(stub_addr), cancel.clone()).await;

    let stream = TcpStream::connect(tunnel).await.unwrap();
    let mut session = EppSession::<TcpStream>::new(SessionOptions::default());
    let greeting = session.attach(stream).await.unwrap();
    assert_eq!(greeting.server_id, "TEST EPP Server");

    let login = session
        .login(&Credentials::new("registrar", "secret"))
        .await
        .unwrap();
    assert_eq!(login.classification, Classification::Success);

    let info = session.domain_info("example.com").await.unwrap();
    assert!(info.is_success());
    assert!(info
        .client_transaction_id
        .as_deref()
        .unwrap()
        .starts_with("CLI-"));

    let logout = session.logout().await.unwrap();
    assert_eq!(logout.code.as_u16(), 1500);
    assert_eq!(session.state(), SessionState::Closed);

    cancel.cancel();
}

fn self_signed() -> (PKey<Private>, X509) {
    let rsa = Rsa::generate(2048).unwrap();
    let key = PKey::from_rsa(rsa).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", "localhost").unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(1).unwrap())
        .unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();

    (key, builder.build())
}

/// TLS remote with a self-signed certificate that echoes every byte back
async fn spawn_tls_echo_server() -> SocketAddr {
    let (key, cert) = self_signed();
    let mut acceptor = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls_server()).unwrap();
    acceptor.set_private_key(&key).unwrap();
    acceptor.set_certificate(&cert).unwrap();
    let acceptor = acceptor.build();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let ssl = Ssl::new(acceptor.context()).unwrap();
            tokio::spawn(async move {
                let mut stream = tokio_openssl::SslStream::new(ssl, socket).unwrap();
                if Pin::new(&mut stream).accept().await.is_err() {
                    return;
                }
                let mut buf = [0u8; 1024];
                loop {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => {
                            if stream.write_all(&buf[..n]).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            });
        }
    });
    addr
}

#[tokio::test]
async fn test_relay_over_legacy_tls() {
    let cancel = CancellationToken::new();
    let remote = spawn_tls_echo_server().await;

    let config = SecureChannelConfig::legacy_compatible("127.0.0.1", remote.port())
        .with_connect_timeout(Duration::from_secs(5));
    let tunnel = spawn_tunnel(SecureDialer::new(config), cancel.clone()).await;

    let mut client = TcpStream::connect(tunnel).await.unwrap();
    client.write_all(b"PING").await.unwrap();

    let mut buf = [0u8; 4];
    timeout(WAIT, client.read_exact(&mut buf))
        .await
        .expect("TLS echo timed out")
        .unwrap();
    assert_eq!(&buf, b"PING");

    cancel.cancel();
}

#[tokio::test]
async fn test_secure_channel_reports_negotiated_parameters() {
    let remote = spawn_tls_echo_server().await;
    let config = SecureChannelConfig::legacy_compatible("127.0.0.1", remote.port())
        .with_connect_timeout(Duration::from_secs(5));

    let channel = SecureChannel::open(&config).await.unwrap();
    assert_eq!(channel.protocol_version(), "TLSv1.2");
    assert!(channel.cipher().is_some());
}

#[tokio::test]
async fn test_full_verification_rejects_self_signed_certificate() {
    let remote = spawn_tls_echo_server().await;
    let mut config = SecureChannelConfig::legacy_compatible("127.0.0.1", remote.port())
        .with_connect_timeout(Duration::from_secs(5));
    config.peer_verification = PeerVerification::Full;

    let err = SecureChannel::open(&config).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Handshake);
}

/// Plaintext remote that answers with junk and reports every byte it got
async fn spawn_plaintext_remote() -> (SocketAddr, mpsc::UnboundedReceiver<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let _ = socket.write_all(b"220 plain text service ready\r\n").await;
                let mut received = Vec::new();
                let _ = timeout(WAIT, socket.read_to_end(&mut received)).await;
                let _ = tx.send(received);
            });
        }
    });
    (addr, rx)
}

#[tokio::test]
async fn test_handshake_failure_drops_local_without_relaying() {
    let cancel = CancellationToken::new();
    let (remote, mut received) = spawn_plaintext_remote().await;

    let config = SecureChannelConfig::legacy_compatible("127.0.0.1", remote.port())
        .with_connect_timeout(Duration::from_secs(2));
    let tunnel = spawn_tunnel(SecureDialer::new(config), cancel.clone()).await;

    // The listener keeps accepting after each failed session
    for _ in 0..2 {
        let mut client = TcpStream::connect(tunnel).await.unwrap();
        let _ = client.write_all(b"PING").await;

        let mut buf = [0u8; 16];
        let n = timeout(WAIT, client.read(&mut buf))
            .await
            .expect("local socket not dropped after handshake failure")
            .unwrap_or(0);
        assert_eq!(n, 0);

        let bytes = timeout(WAIT, received.recv())
            .await
            .expect("remote leg stayed open")
            .unwrap();
        assert!(!bytes.windows(4).any(|w| w == b"PING"));
    }

    cancel.cancel();
}
