//! Relay tunnel listener
//!
//! Accepts plaintext clients and bridges each one to a freshly dialed
//! remote connection.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use epp_core::config::DEFAULT_CHUNK_SIZE;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::dialer::Dialer;
use crate::relay::relay;

/// Local listener bridging every accepted connection to the remote
pub struct RelayTunnel<D: Dialer> {
    dialer: Arc<D>,
    chunk_size: usize,
    cancel: CancellationToken,
    next_session: AtomicU64,
}

impl<D: Dialer> RelayTunnel<D> {
    /// Create a tunnel that stops accepting when `cancel` fires
    pub fn new(dialer: D, cancel: CancellationToken) -> Self {
        Self {
            dialer: Arc::new(dialer),
            chunk_size: DEFAULT_CHUNK_SIZE,
            cancel,
            next_session: AtomicU64::new(1),
        }
    }

    /// Set the read size of each pump
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Bind `bind_addr` and accept until cancelled
    pub async fn run(&self, bind_addr: &str) -> Result<()> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .with_context(|| format!("Failed to bind to {}", bind_addr))?;
        self.serve(listener).await
    }

    /// Accept on an existing listener until cancelled
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        tracing::info!(
            "Relay tunnel listening on {} -> {}",
            local_addr,
            self.dialer.remote()
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("Relay tunnel shutting down");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((socket, peer_addr)) => self.handle_connection(socket, peer_addr),
                        Err(e) => tracing::error!("Failed to accept connection: {}", e),
                    }
                }
            }
        }

        Ok(())
    }

    /// Spawn one relay session; its failures stay inside its task
    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let dialer = Arc::clone(&self.dialer);
        let cancel = self.cancel.clone();
        let chunk_size = self.chunk_size;

        tracing::info!(session = id, "New connection from {}", peer_addr);

        tokio::spawn(async move {
            let remote = tokio::select! {
                _ = cancel.cancelled() => return,
                dialed = dialer.dial() => dialed,
            };
            let remote = match remote {
                Ok(remote) => remote,
                Err(e) => {
                    tracing::warn!(session = id, "Dial to {} failed: {}", dialer.remote(), e);
                    return;
                }
            };

            if let Err(e) = socket.set_nodelay(true) {
                tracing::debug!(session = id, "Failed to set TCP_NODELAY: {}", e);
            }

            let started = Instant::now();
            let stats = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(session = id, "Relay cancelled");
                    return;
                }
                stats = relay(socket, remote, chunk_size) => stats,
            };
            tracing::info!(
                session = id,
                "Relay for {} closed after {:?}: {}",
                peer_addr,
                started.elapsed(),
                stats
            );
        });
    }
}
