//! Outbound TCP connections.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::net::TcpStream;

use crate::{ConnectError, ConnectionId, ServerAddress};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// An open TCP connection to a chat server.
///
/// This is a thin wrapper: it only adds an id (for log correlation) and
/// remembers which resolved address actually answered. The session layer
/// takes the stream out with [`into_stream`](Self::into_stream) and does
/// its own framing on top.
#[derive(Debug)]
pub struct TcpConnection {
    id: ConnectionId,
    peer: SocketAddr,
    stream: TcpStream,
}

impl TcpConnection {
    /// Returns the unique identifier for this connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// The socket address that accepted the connection.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Gives up the wrapper and returns the raw stream.
    pub fn into_stream(self) -> TcpStream {
        self.stream
    }
}

/// Opens a TCP connection to `address`.
///
/// Resolution and connection together must finish within `timeout`.
/// Each resolved address is tried in order; the first one that accepts
/// wins. `TCP_NODELAY` is set because chat messages are small and
/// latency-sensitive.
///
/// # Errors
/// - [`ConnectError::Resolution`] — DNS lookup failed
/// - [`ConnectError::Unreachable`] — every address refused or failed
/// - [`ConnectError::Timeout`] — `timeout` elapsed first
pub async fn connect(
    address: &ServerAddress,
    timeout: Duration,
) -> Result<TcpConnection, ConnectError> {
    let conn = with_timeout(timeout, connect_any(address)).await?;
    tracing::info!(
        conn_id = %conn.id,
        %address,
        peer = %conn.peer,
        "connected to chat server"
    );
    Ok(conn)
}

async fn connect_any(
    address: &ServerAddress,
) -> Result<TcpConnection, ConnectError> {
    let candidates = address.resolve().await?;

    let mut last_error = None;
    for peer in candidates {
        match TcpStream::connect(peer).await {
            Ok(stream) => {
                if let Err(e) = stream.set_nodelay(true) {
                    tracing::warn!(%peer, error = %e, "failed to set TCP_NODELAY");
                }
                let id = ConnectionId::new(
                    NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
                );
                return Ok(TcpConnection { id, peer, stream });
            }
            Err(e) => {
                tracing::debug!(%peer, error = %e, "connect attempt failed");
                last_error = Some(e);
            }
        }
    }

    Err(ConnectError::Unreachable {
        address: address.to_string(),
        source: last_error.unwrap_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no candidate addresses",
            )
        }),
    })
}

/// Runs a connect future under a deadline, mapping expiry to
/// [`ConnectError::Timeout`].
pub(crate) async fn with_timeout<T>(
    timeout: Duration,
    fut: impl Future<Output = Result<T, ConnectError>>,
) -> Result<T, ConnectError> {
    tokio::time::timeout(timeout, fut)
        .await
        .unwrap_or_else(|_| Err(ConnectError::Timeout(timeout)))
}
