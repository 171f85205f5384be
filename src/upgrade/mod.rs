//! Upgrade handshake subsystem.
//!
//! # Data Flow
//! ```text
//! Upgrade request (method, headers)
//!     → handshake.rs (validate version + key, negotiate sub-protocol,
//!                     compute accept value)
//!     → 101 response written through the pipeline
//!     → bridge.rs (await hyper upgrade, hand the socket to the frame
//!                  transport or bridge it to an upstream tunnel)
//!
//! Failure at any step before the 101:
//!     → error status, connection closes, no handoff
//! ```
//!
//! # Design Decisions
//! - The handshake consumes exactly the request head; hyper's upgrade
//!   machinery replays any bytes it read past the head, so the frame
//!   parser sees every post-head byte exactly once, in order
//! - The handshake record lives only for the exchange; it is dropped at
//!   handoff

pub mod bridge;
pub mod handshake;

pub use bridge::{EchoHandler, UpgradeHandler, UpgradeMode, UpgradeResponder, WsTransport};
pub use handshake::{accept_key, HandshakeError, HandshakeRecord, HANDSHAKE_GUID};
