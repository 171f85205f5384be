//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (id assignment, active-connection tracking)
//!     → Hand off to the HTTP layer or the TCP relay, per listener mode
//! ```
//!
//! # Design Decisions
//! - Bounded accept: a semaphore permit is acquired before accept and
//!   held for the connection's whole lifetime
//! - Each connection tracked for graceful drain at shutdown

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{ConnectionPermit, Listener, ListenerError};
