//! Request pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! Parsed request (method, uri, headers, body stream)
//!     → context.rs (RequestContext, one per request)
//!     → responder.rs (ordered responder execution)
//!     → first terminal responder produces the response
//!
//! Error in any responder:
//!     → remaining responders skipped
//!     → single designated error responder decides the client response
//! ```
//!
//! # Design Decisions
//! - Responders run strictly in registration order; the next one does not
//!   start until the previous one's future completes
//! - The context is exclusively owned by one pipeline invocation; no
//!   responder retains it past its own call
//! - Terminal flag short-circuits the remainder of the pipeline

pub mod context;
pub mod responder;

pub use context::{empty_body, full_body, RelayBody, RequestContext};
pub use responder::{BadGatewayResponder, ErrorResponder, Pipeline, Responder, ResponderFuture};
