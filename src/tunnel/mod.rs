//! Socket tunneling subsystem.
//!
//! # Data Flow
//! ```text
//! Near endpoint accepted
//!     → relay.rs (Tunnel::open, state = Connecting)
//!         reads arriving on near  → ordered chunk buffer
//!         resolver + far connect  → far endpoint
//!     → flush buffer to far, in arrival order, exactly once
//!     → state = Piping: direct bidirectional pass-through
//!     → close/error on either side → destroy both → state = Closed
//!
//! TCP relay mode (server.rs):
//!     accept loop → one Tunnel per connection → tunnels fully independent
//! ```
//!
//! # Design Decisions
//! - One two-slot structure with a single state enum, never two
//!   independently tracked endpoints
//! - Buffer flush is swap-then-drain inside the owning task, so newly
//!   arriving data cannot interleave with the flush
//! - Teardown is symmetric and idempotent; destroying an endpoint is the
//!   only cancellation primitive

pub mod relay;
pub mod server;

use std::net::SocketAddr;

use futures_util::future::BoxFuture;
use tokio::net::TcpStream;

use crate::error::RelayError;

pub use relay::{Tunnel, TunnelState};
pub use server::TcpRelayServer;

/// Connection metadata handed to a target resolver.
#[derive(Debug, Clone)]
pub struct ConnectMeta {
    pub remote_addr: SocketAddr,
}

/// Where a tunnel's far endpoint should connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetAddr {
    pub host: String,
    pub port: u16,
}

/// Caller-supplied policy hook producing the far endpoint's address.
///
/// May suspend (policy lookups, discovery); its result is trusted
/// verbatim. Any retry policy belongs here, never in the tunnel.
pub trait TargetResolver: Send + Sync {
    fn resolve<'a>(&'a self, meta: &'a ConnectMeta) -> BoxFuture<'a, Result<TargetAddr, RelayError>>;
}

/// Resolver returning a fixed target from configuration.
#[derive(Debug, Clone)]
pub struct StaticResolver {
    target: TargetAddr,
}

impl StaticResolver {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            target: TargetAddr { host: host.into(), port },
        }
    }
}

impl TargetResolver for StaticResolver {
    fn resolve<'a>(&'a self, _meta: &'a ConnectMeta) -> BoxFuture<'a, Result<TargetAddr, RelayError>> {
        Box::pin(async move { Ok(self.target.clone()) })
    }
}

/// Resolve and open the far endpoint for a tunnel.
pub(crate) async fn connect_target(
    resolver: &dyn TargetResolver,
    meta: &ConnectMeta,
) -> Result<TcpStream, RelayError> {
    let target = resolver.resolve(meta).await?;
    tracing::debug!(
        remote_addr = %meta.remote_addr,
        host = %target.host,
        port = target.port,
        "opening far endpoint"
    );
    TcpStream::connect((target.host.as_str(), target.port))
        .await
        .map_err(RelayError::Connect)
}
