//! The tunnel proper: paired endpoints, pre-connect buffering,
//! bidirectional piping, symmetric teardown.
//!
//! # State machine
//! ```text
//! Connecting ──(far connected, buffer flushed)──▶ Piping ──▶ Closed
//!     │                                                        ▲
//!     └──(resolve/connect failure, destroy)────────────────────┘
//! ```
//!
//! Invariant: no byte received on the near endpoint while Connecting is
//! ever dropped; the buffer is flushed to the far endpoint in arrival
//! order exactly once on the transition to Piping.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{watch, Notify};

use crate::error::RelayError;
use crate::observability::metrics;
use crate::tunnel::{connect_target, ConnectMeta, TargetResolver};

/// Read size for the pre-connect buffer loop.
const CHUNK_CAPACITY: usize = 8 * 1024;

/// Tunnel lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelState {
    /// Far endpoint not yet connected; near-side data is being buffered.
    Connecting,
    /// Both endpoints wired; bytes pass straight through.
    Piping,
    /// Both endpoints destroyed.
    Closed,
}

/// Handle to a running tunnel.
///
/// The tunnel itself runs in its own task, which exclusively owns both
/// endpoints and the buffer. The handle only observes state and carries
/// the destroy signal; dropping it does not stop the tunnel.
pub struct Tunnel {
    state_rx: watch::Receiver<TunnelState>,
    destroy: Arc<Notify>,
}

impl Tunnel {
    /// Pair `near` with the endpoint produced by `connect`.
    ///
    /// Buffering of near-side data starts immediately; `connect` runs
    /// concurrently. On success the buffer is flushed and the tunnel
    /// transitions to Piping. On failure the near endpoint is destroyed
    /// without ever having written partial data to either side.
    pub fn open<N, F, T>(near: N, connect: F) -> Tunnel
    where
        N: AsyncRead + AsyncWrite + Unpin + Send + 'static,
        F: std::future::Future<Output = Result<T, RelayError>> + Send + 'static,
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (state_tx, state_rx) = watch::channel(TunnelState::Connecting);
        let destroy = Arc::new(Notify::new());
        let signal = destroy.clone();
        tokio::spawn(async move {
            drive(near, connect, state_tx, signal).await;
        });
        Tunnel { state_rx, destroy }
    }

    /// Open a tunnel whose far endpoint comes from a target resolver
    /// (the raw TCP relay path).
    pub fn open_tcp(near: TcpStream, resolver: Arc<dyn TargetResolver>, meta: ConnectMeta) -> Tunnel {
        Tunnel::open(near, async move { connect_target(resolver.as_ref(), &meta).await })
    }

    /// Current state snapshot.
    pub fn state(&self) -> TunnelState {
        *self.state_rx.borrow()
    }

    /// Destroy the tunnel: both endpoints are torn down and the state
    /// moves to Closed. Safe to call any number of times, from any task;
    /// repeated calls are no-ops.
    pub fn destroy(&self) {
        self.destroy.notify_one();
    }

    /// Wait until the tunnel reaches Closed.
    pub async fn closed(&self) {
        let mut rx = self.state_rx.clone();
        // An error means the driving task is gone, which only happens
        // after it published Closed.
        let _ = rx.wait_for(|state| *state == TunnelState::Closed).await;
    }
}

/// The single task that owns both endpoints for the tunnel's lifetime.
async fn drive<N, F, T>(
    mut near: N,
    connect: F,
    state_tx: watch::Sender<TunnelState>,
    destroy: Arc<Notify>,
) where
    N: AsyncRead + AsyncWrite + Unpin,
    F: std::future::Future<Output = Result<T, RelayError>>,
    T: AsyncRead + AsyncWrite + Unpin,
{
    metrics::record_tunnel_opened();

    let mut buffer: Vec<Bytes> = Vec::new();
    let mut near_eof = false;
    tokio::pin!(connect);

    // Connecting: buffer near-side data until the far endpoint is ready.
    let mut far = loop {
        let mut chunk = BytesMut::with_capacity(CHUNK_CAPACITY);
        tokio::select! {
            result = &mut connect => match result {
                Ok(far) => break far,
                Err(error) => {
                    tracing::warn!(%error, "far endpoint unavailable, destroying near endpoint");
                    let _ = near.shutdown().await;
                    finish(&state_tx);
                    return;
                }
            },
            read = near.read_buf(&mut chunk), if !near_eof => match read {
                // Half-close while connecting: stop reading but keep the
                // buffered bytes; they still must reach the far endpoint.
                Ok(0) => near_eof = true,
                Ok(_) => buffer.push(chunk.freeze()),
                Err(error) => {
                    tracing::debug!(%error, "near endpoint failed before far connected");
                    finish(&state_tx);
                    return;
                }
            },
            _ = destroy.notified() => {
                let _ = near.shutdown().await;
                finish(&state_tx);
                return;
            }
        }
    };

    // Flushing: swap the buffer out, then drain. The swap happens before
    // any further read is issued, so newly arriving data cannot
    // interleave with the flush.
    let pending = std::mem::take(&mut buffer);
    let flushed = pending.len();
    for chunk in pending {
        if let Err(error) = far.write_all(&chunk).await {
            tracing::warn!(%error, "flush to far endpoint failed");
            let _ = near.shutdown().await;
            let _ = far.shutdown().await;
            finish(&state_tx);
            return;
        }
    }

    let _ = state_tx.send(TunnelState::Piping);
    tracing::debug!(flushed_chunks = flushed, "tunnel piping");

    // Piping: direct pass-through until either side closes or errors, or
    // the tunnel is destroyed.
    tokio::select! {
        result = tokio::io::copy_bidirectional(&mut near, &mut far) => match result {
            Ok((to_far, to_near)) => {
                metrics::record_tunnel_bytes(to_far, to_near);
                tracing::debug!(to_far, to_near, "tunnel drained");
            }
            Err(error) => {
                tracing::debug!(%error, "tunnel endpoint failed");
            }
        },
        _ = destroy.notified() => {}
    }

    // Teardown symmetry: whichever side ended, both endpoints go down.
    let _ = near.shutdown().await;
    let _ = far.shutdown().await;
    finish(&state_tx);
}

fn finish(state_tx: &watch::Sender<TunnelState>) {
    let _ = state_tx.send(TunnelState::Closed);
    metrics::record_tunnel_closed();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::io::{duplex, DuplexStream};
    use tokio::sync::oneshot;

    /// A connect future the test completes on demand.
    fn deferred_connect(
        rx: oneshot::Receiver<DuplexStream>,
    ) -> impl std::future::Future<Output = Result<DuplexStream, RelayError>> + Send {
        async move {
            rx.await
                .map_err(|_| RelayError::Resolve("connect aborted".to_string()))
        }
    }

    #[tokio::test]
    async fn buffers_pre_connect_bytes_in_order() {
        let (near_peer, near) = duplex(64);
        let (far, far_peer) = duplex(64);
        let (connect_tx, connect_rx) = oneshot::channel();

        let tunnel = Tunnel::open(near, deferred_connect(connect_rx));
        let (mut client, mut upstream) = (near_peer, far_peer);

        // Data sent before the far endpoint exists.
        client.write_all(b"first ").await.unwrap();
        client.write_all(b"second ").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(tunnel.state(), TunnelState::Connecting);

        // Far endpoint comes up; buffered bytes must arrive first, in
        // arrival order, then post-connect bytes.
        connect_tx.send(far).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(tunnel.state(), TunnelState::Piping);
        client.write_all(b"third").await.unwrap();

        let mut received = vec![0u8; b"first second third".len()];
        upstream.read_exact(&mut received).await.unwrap();
        assert_eq!(&received, b"first second third");
    }

    #[tokio::test]
    async fn piping_is_bidirectional() {
        let (mut client, near) = duplex(64);
        let (far, mut upstream) = duplex(64);
        let (connect_tx, connect_rx) = oneshot::channel();
        let tunnel = Tunnel::open(near, deferred_connect(connect_rx));
        connect_tx.send(far).unwrap();

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        upstream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        upstream.write_all(b"pong").await.unwrap();
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");

        drop(client);
        tunnel.closed().await;
        assert_eq!(tunnel.state(), TunnelState::Closed);
    }

    #[tokio::test]
    async fn near_close_tears_down_far() {
        let (client, near) = duplex(64);
        let (far, mut upstream) = duplex(64);
        let (connect_tx, connect_rx) = oneshot::channel();
        let tunnel = Tunnel::open(near, deferred_connect(connect_rx));
        connect_tx.send(far).unwrap();

        drop(client);
        tunnel.closed().await;

        // The far peer observes EOF once its endpoint is destroyed.
        let mut buf = [0u8; 1];
        assert_eq!(upstream.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn far_close_tears_down_near() {
        let (mut client, near) = duplex(64);
        let (far, upstream) = duplex(64);
        let (connect_tx, connect_rx) = oneshot::channel();
        let tunnel = Tunnel::open(near, deferred_connect(connect_rx));
        connect_tx.send(far).unwrap();

        drop(upstream);
        tunnel.closed().await;

        let mut buf = [0u8; 1];
        assert_eq!(client.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn destroy_is_idempotent() {
        let (_client, near) = duplex(64);
        let (far, _upstream) = duplex(64);
        let (connect_tx, connect_rx) = oneshot::channel();
        let tunnel = Tunnel::open(near, deferred_connect(connect_rx));
        connect_tx.send(far).unwrap();

        tunnel.destroy();
        tunnel.destroy();
        tunnel.closed().await;
        tunnel.destroy();
        assert_eq!(tunnel.state(), TunnelState::Closed);
    }

    #[tokio::test]
    async fn connect_failure_closes_without_partial_writes() {
        let (mut client, near) = duplex(64);
        let (connect_tx, connect_rx) = oneshot::channel::<DuplexStream>();
        let tunnel = Tunnel::open(near, deferred_connect(connect_rx));

        client.write_all(b"never delivered").await.unwrap();
        drop(connect_tx);
        tunnel.closed().await;

        // Near endpoint was destroyed.
        let mut buf = [0u8; 1];
        assert_eq!(client.read(&mut buf).await.unwrap(), 0);
    }
}
