//! Per-request mutable state threaded through all pipeline stages.
//!
//! # Responsibilities
//! - Hold the parsed request head (method, uri, headers)
//! - Hold the inbound body stream and the outbound response slot
//! - Carry cross-stage state (string map) and route captures
//! - Track the terminal flag that stops the pipeline

use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderMap, HeaderValue};
use hyper::upgrade::OnUpgrade;
use hyper::{Method, Request, Response, StatusCode, Uri};
use uuid::Uuid;

/// Response body type used throughout the pipeline.
pub type RelayBody = BoxBody<Bytes, hyper::Error>;

/// Build a body from a complete byte chunk.
pub fn full_body(chunk: impl Into<Bytes>) -> RelayBody {
    Full::new(chunk.into()).map_err(|never| match never {}).boxed()
}

/// Build an empty body.
pub fn empty_body() -> RelayBody {
    Empty::<Bytes>::new().map_err(|never| match never {}).boxed()
}

/// Mutable per-request record.
///
/// Created once per inbound request, owned exclusively by the pipeline
/// invocation that created it, and consumed by [`RequestContext::into_response`]
/// when the pipeline finishes.
pub struct RequestContext {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub remote_addr: SocketAddr,
    pub request_id: String,
    params: HashMap<String, String>,
    state: HashMap<String, String>,
    body: Option<Incoming>,
    on_upgrade: Option<OnUpgrade>,
    response: Option<Response<RelayBody>>,
    terminal: bool,
}

impl RequestContext {
    /// Wrap a parsed hyper request. The upgrade handle is captured here so
    /// an upgrade responder can claim it later.
    pub fn new(mut request: Request<Incoming>, remote_addr: SocketAddr) -> Self {
        let on_upgrade = hyper::upgrade::on(&mut request);
        let (parts, body) = request.into_parts();
        let mut ctx = Self::from_head(parts.method, parts.uri, parts.headers, remote_addr);
        ctx.body = Some(body);
        ctx.on_upgrade = Some(on_upgrade);
        ctx
    }

    /// Build a context from a request head alone, with no body stream or
    /// upgrade handle. Used for raw contexts and in tests.
    pub fn from_head(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        remote_addr: SocketAddr,
    ) -> Self {
        Self {
            method,
            uri,
            headers,
            remote_addr,
            request_id: Uuid::new_v4().to_string(),
            params: HashMap::new(),
            state: HashMap::new(),
            body: None,
            on_upgrade: None,
            response: None,
            terminal: false,
        }
    }

    /// Header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Route capture set by the router (e.g. the wildcard remainder).
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn set_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.params.insert(name.into(), value.into());
    }

    /// Arbitrary cross-stage state.
    pub fn state(&self, key: &str) -> Option<&str> {
        self.state.get(key).map(String::as_str)
    }

    pub fn set_state(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.state.insert(key.into(), value.into());
    }

    /// Take the inbound body stream. A second call returns `None`; only one
    /// responder may consume the body.
    pub fn take_body(&mut self) -> Option<Incoming> {
        self.body.take()
    }

    /// Take the upgrade handle for the connection, if not already claimed.
    pub fn take_upgrade(&mut self) -> Option<OnUpgrade> {
        self.on_upgrade.take()
    }

    /// Install the outbound response.
    pub fn set_response(&mut self, response: Response<RelayBody>) {
        self.response = Some(response);
    }

    pub fn response_status(&self) -> Option<StatusCode> {
        self.response.as_ref().map(|r| r.status())
    }

    /// Mark the context terminal: no further responder runs.
    pub fn set_terminal(&mut self) {
        self.terminal = true;
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Consume the context, yielding the response to write to the client.
    ///
    /// A pipeline that finished without installing a response yields a 404;
    /// the request ID is stamped on the way out.
    pub fn into_response(self) -> Response<RelayBody> {
        let mut response = self.response.unwrap_or_else(|| {
            Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(full_body("no matching route"))
                .expect("static response")
        });
        if let Ok(value) = HeaderValue::from_str(&self.request_id) {
            response.headers_mut().insert("x-request-id", value);
        }
        response
    }
}
