//! Error taxonomy for the relay core.
//!
//! # Responsibilities
//! - One error type crossing responder boundaries (`RelayError`)
//! - Distinguish resolution, connect, upstream and internal failures
//!
//! # Design Decisions
//! - Routing misses and handshake rejections are handled locally with an
//!   error response; they never become a `RelayError`
//! - Setup-time failures (config, bind, route table) have their own types
//!   and abort startup instead of flowing through the pipeline

use std::time::Duration;
use thiserror::Error;

/// Per-request error surfaced to the pipeline's error responder.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The caller-supplied target resolver failed.
    #[error("target resolution failed: {0}")]
    Resolve(String),

    /// Opening the far endpoint failed (refused, unreachable, DNS).
    #[error("upstream connect failed: {0}")]
    Connect(#[source] std::io::Error),

    /// The outbound HTTP request failed.
    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    /// The outbound connection attempt exceeded the configured timeout.
    #[error("upstream timed out after {0:?}")]
    UpstreamTimeout(Duration),

    /// Socket-level failure on an endpoint we own.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Invariant violation inside the core (request body consumed twice,
    /// upgrade handle missing). Always a bug in responder wiring.
    #[error("internal error: {0}")]
    Internal(&'static str),
}
