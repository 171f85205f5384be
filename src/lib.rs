//! Connection-handling core for an embedded HTTP/TCP relay.
//!
//! ```text
//!                     ┌──────────────────────────────────────────────┐
//!                     │                 RELAY PROXY                   │
//!                     │                                               │
//!   Client ───────────┼─▶ net::listener ──▶ http::server ──▶ pipeline │
//!                     │                                        │      │
//!                     │                              routing (trie)   │
//!                     │                                        │      │
//!                     │          ┌─────────────┬───────────────┤      │
//!                     │          ▼             ▼               ▼      │
//!                     │   forward (one-shot)  upgrade (101)  terminal │
//!                     │          │             │                      │
//!   Upstream ◀────────┼──────────┘             └──▶ tunnel (bridge)   │
//!                     │                                               │
//!   Raw TCP mode: net::listener ──▶ tunnel (buffer → flush → pipe)    │
//!                     └──────────────────────────────────────────────┘
//! ```
//!
//! The hard part lives in [`tunnel`]: pairing two byte-stream endpoints,
//! buffering data that arrives before the far side is connected, flushing
//! it exactly once in arrival order, and tearing both endpoints down
//! symmetrically when either side fails.

pub mod config;
pub mod error;
pub mod forward;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod pipeline;
pub mod routing;
pub mod tunnel;
pub mod upgrade;

pub use config::RelayConfig;
pub use error::RelayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pipeline::{Pipeline, RequestContext, Responder};
pub use routing::Router;
pub use tunnel::{Tunnel, TunnelState};
