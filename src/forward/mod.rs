//! One-shot HTTP forwarding.
//!
//! # Data Flow
//! ```text
//! RequestContext (head + body stream)
//!     → resolver (target URL, method, header overrides)
//!     → outbound request, inbound body streamed through
//!     → outbound response head copied back (minus hop-by-hop)
//!     → response body streamed to the client
//! ```
//!
//! # Design Decisions
//! - No full buffering in either direction; bodies larger than memory
//!   stream through
//! - Outbound failure surfaces as a pipeline error; partial writes
//!   already flushed to the client are not retried
//! - No retries here; retry policy belongs to the caller's resolver

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::header::{HeaderMap, HeaderName, HeaderValue, HOST};
use hyper::{Method, Request, Response, Uri};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;

use crate::error::RelayError;
use crate::observability::metrics;
use crate::pipeline::{RequestContext, Responder, ResponderFuture};

/// Headers that describe one hop and must not be forwarded.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// Where and how to forward one request.
#[derive(Debug, Clone)]
pub struct ForwardTarget {
    /// Fully-formed outbound URI (scheme, authority, path, query).
    pub uri: Uri,
    /// Override for the outbound method; inbound method when `None`.
    pub method: Option<Method>,
    /// Headers set on the outbound request after the inbound copy,
    /// overriding any copied value.
    pub headers: Vec<(HeaderName, HeaderValue)>,
}

/// Caller-supplied hook producing the forward target for a request.
pub trait ForwardResolver: Send + Sync {
    fn resolve<'a>(
        &'a self,
        ctx: &'a RequestContext,
    ) -> BoxFuture<'a, Result<ForwardTarget, RelayError>>;
}

/// Resolver that rebases every request onto one upstream authority,
/// keeping the inbound path and query.
#[derive(Debug, Clone)]
pub struct UpstreamResolver {
    upstream: Uri,
}

impl UpstreamResolver {
    pub fn new(upstream: Uri) -> Self {
        Self { upstream }
    }
}

impl ForwardResolver for UpstreamResolver {
    fn resolve<'a>(
        &'a self,
        ctx: &'a RequestContext,
    ) -> BoxFuture<'a, Result<ForwardTarget, RelayError>> {
        Box::pin(async move {
            let mut parts = ctx.uri.clone().into_parts();
            parts.scheme = self.upstream.scheme().cloned();
            parts.authority = self.upstream.authority().cloned();
            let uri = Uri::from_parts(parts)
                .map_err(|e| RelayError::Resolve(format!("bad target uri: {}", e)))?;
            Ok(ForwardTarget {
                uri,
                method: None,
                headers: Vec::new(),
            })
        })
    }
}

/// Terminal responder that forwards the request to a resolved target,
/// streaming both bodies.
pub struct ForwardResponder {
    client: Client<HttpConnector, Incoming>,
    resolver: Arc<dyn ForwardResolver>,
    timeout: Duration,
}

impl ForwardResponder {
    pub fn new(resolver: Arc<dyn ForwardResolver>, timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            resolver,
            timeout,
        }
    }

    fn copy_headers(inbound: &HeaderMap, outbound: &mut HeaderMap) {
        for (name, value) in inbound {
            if name == HOST || HOP_BY_HOP.contains(&name.as_str()) {
                continue;
            }
            outbound.append(name.clone(), value.clone());
        }
    }

    fn append_forwarded_for(ctx: &RequestContext, outbound: &mut HeaderMap) {
        let client_ip = ctx.remote_addr.ip().to_string();
        let value = match outbound.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
            Some(existing) => format!("{}, {}", existing, client_ip),
            None => client_ip,
        };
        if let Ok(value) = HeaderValue::from_str(&value) {
            outbound.insert("x-forwarded-for", value);
        }
    }
}

impl Responder for ForwardResponder {
    fn respond<'a>(&'a self, ctx: &'a mut RequestContext) -> ResponderFuture<'a> {
        Box::pin(async move {
            let target = self.resolver.resolve(ctx).await?;
            let body = ctx
                .take_body()
                .ok_or(RelayError::Internal("request body already consumed"))?;

            let method = target.method.clone().unwrap_or_else(|| ctx.method.clone());
            let mut outbound = Request::builder()
                .method(method)
                .uri(target.uri.clone())
                .body(body)
                .map_err(|_| RelayError::Internal("failed to build outbound request"))?;

            Self::copy_headers(&ctx.headers, outbound.headers_mut());
            Self::append_forwarded_for(ctx, outbound.headers_mut());
            for (name, value) in target.headers {
                outbound.headers_mut().insert(name, value);
            }

            tracing::debug!(
                request_id = %ctx.request_id,
                target = %target.uri,
                "forwarding request"
            );

            let response = match tokio::time::timeout(self.timeout, self.client.request(outbound)).await
            {
                Err(_) => {
                    metrics::record_forward_failure("timeout");
                    return Err(RelayError::UpstreamTimeout(self.timeout));
                }
                Ok(Err(error)) => {
                    metrics::record_forward_failure("connect");
                    return Err(RelayError::Upstream(error));
                }
                Ok(Ok(response)) => response,
            };

            let (mut parts, body) = response.into_parts();
            for name in HOP_BY_HOP {
                parts.headers.remove(name);
            }

            ctx.set_response(Response::from_parts(parts, body.boxed()));
            ctx.set_terminal();
            Ok(())
        })
    }
}
