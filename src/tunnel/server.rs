//! Raw TCP relay server: one tunnel per accepted connection.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::net::listener::{Listener, ListenerError};
use crate::tunnel::{ConnectMeta, TargetResolver, Tunnel};

/// Accept loop for the raw TCP listener mode.
///
/// Every accepted connection gets its own tunnel; tunnels proceed fully
/// independently and share no mutable state. The connection permit is
/// held until the tunnel closes, so backpressure covers tunnel lifetime,
/// not just accept time.
pub struct TcpRelayServer {
    resolver: Arc<dyn TargetResolver>,
}

impl TcpRelayServer {
    pub fn new(resolver: Arc<dyn TargetResolver>) -> Self {
        Self { resolver }
    }

    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        let addr = listener.local_addr().map_err(ListenerError::Bind)?;
        tracing::info!(address = %addr, "TCP relay listening");

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                accepted = listener.accept() => {
                    let (stream, remote_addr, permit) = accepted?;
                    let resolver = self.resolver.clone();
                    let tunnel = Tunnel::open_tcp(stream, resolver, ConnectMeta { remote_addr });
                    tokio::spawn(async move {
                        let _permit = permit;
                        tunnel.closed().await;
                    });
                }
            }
        }

        tracing::info!("TCP relay stopped");
        Ok(())
    }
}
