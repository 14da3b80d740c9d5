//! Long-running servers: the relay tunnel and the stub EPP server

use anyhow::{Context, Result};
use epp_tunnel::{Dialer, PlainDialer, RelayTunnel, SecureDialer, StubConfig, StubServer};
use tokio_util::sync::CancellationToken;

use crate::output::print_info;
use crate::settings::Settings;

/// Relay local plaintext clients to the configured server until Ctrl+C
pub async fn tunnel_command(
    settings: &Settings,
    listen: Option<String>,
    plain: bool,
) -> Result<()> {
    let config = &settings.config;
    let listen = listen.unwrap_or_else(|| config.tunnel.listen_address.clone());
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    if plain || config.tunnel.plain_remote {
        let dialer = PlainDialer::new(config.server.address(), config.server.connect_timeout);
        serve_tunnel(dialer, &listen, config.tunnel.chunk_size, cancel).await
    } else {
        config
            .server
            .validate()
            .context("Invalid server configuration")?;
        let dialer = SecureDialer::new(config.server.clone());
        serve_tunnel(dialer, &listen, config.tunnel.chunk_size, cancel).await
    }
}

async fn serve_tunnel<D: Dialer>(
    dialer: D,
    listen: &str,
    chunk_size: usize,
    cancel: CancellationToken,
) -> Result<()> {
    print_info(&format!("Relaying {} -> {} (Ctrl+C to stop)", listen, dialer.remote()));
    RelayTunnel::new(dialer, cancel)
        .with_chunk_size(chunk_size)
        .run(listen)
        .await
}

/// Serve the stub EPP server until Ctrl+C
pub async fn stub_server_command(listen: &str, config: StubConfig) -> Result<()> {
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    print_info(&format!(
        "Stub EPP server '{}' on {} (Ctrl+C to stop)",
        config.server_id, listen
    ));
    StubServer::new(config, cancel).run(listen).await
}

fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl+C, shutting down");
            cancel.cancel();
        }
    });
}
