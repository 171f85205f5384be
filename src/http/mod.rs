//! HTTP serving subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (net::listener)
//!     → server.rs (hyper HTTP/1.1 connection, upgrades enabled)
//!     → one RequestContext per parsed request
//!     → pipeline (trace stage, then route dispatch)
//!     → matched responder produces the response
//! ```
//!
//! # Design Decisions
//! - HTTP parsing is hyper's job; this layer only consumes the parsed
//!   method, uri and headers
//! - Each connection runs in its own task; per-request ordering inside a
//!   connection follows HTTP/1.1 (one request at a time)

pub mod server;

pub use server::{BuildError, HttpServer, RouteDispatch};
