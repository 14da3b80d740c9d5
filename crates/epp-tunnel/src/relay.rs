//! Bidirectional byte pump between two streams
//!
//! The relay never looks at frames: the greeting and every command pass
//! through untouched.

use std::fmt;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use epp_core::Transport;

/// Bytes moved in each direction by one relay session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub local_to_remote: u64,
    pub remote_to_local: u64,
}

impl fmt::Display for RelayStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} bytes up, {} bytes down",
            self.local_to_remote, self.remote_to_local
        )
    }
}

/// Which pump stopped first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    LocalToRemote,
    RemoteToLocal,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::LocalToRemote => f.write_str("local->remote"),
            Direction::RemoteToLocal => f.write_str("remote->local"),
        }
    }
}

/// Copy bytes both ways until either side closes or fails
///
/// When the first pump stops, the write sides of both streams are shut
/// down and both streams are dropped, so the peer of each leg sees EOF.
pub async fn relay<L, R>(local: L, remote: R, chunk_size: usize) -> RelayStats
where
    L: Transport,
    R: Transport,
{
    let (mut local_rd, mut local_wr) = tokio::io::split(local);
    let (mut remote_rd, mut remote_wr) = tokio::io::split(remote);
    let mut stats = RelayStats::default();

    let (direction, result) = tokio::select! {
        r = pump(&mut local_rd, &mut remote_wr, chunk_size, &mut stats.local_to_remote) => {
            (Direction::LocalToRemote, r)
        }
        r = pump(&mut remote_rd, &mut local_wr, chunk_size, &mut stats.remote_to_local) => {
            (Direction::RemoteToLocal, r)
        }
    };

    match result {
        Ok(()) => tracing::debug!("{} reached EOF", direction),
        Err(e) => tracing::debug!("{} failed: {}", direction, e),
    }

    if let Err(e) = local_wr.shutdown().await {
        tracing::trace!("Local shutdown: {}", e);
    }
    if let Err(e) = remote_wr.shutdown().await {
        tracing::trace!("Remote shutdown: {}", e);
    }

    stats
}

async fn pump<Rd, Wr>(
    reader: &mut Rd,
    writer: &mut Wr,
    chunk_size: usize,
    counter: &mut u64,
) -> io::Result<()>
where
    Rd: AsyncRead + Unpin,
    Wr: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; chunk_size.max(1)];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        writer.write_all(&buf[..n]).await?;
        writer.flush().await?;
        *counter += n as u64;
    }
}
