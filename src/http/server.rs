//! HTTP server: connection loop and pipeline wiring.
//!
//! # Responsibilities
//! - Serve accepted connections with hyper's HTTP/1.1 machinery,
//!   upgrades enabled
//! - Wrap each parsed request in a RequestContext and run the pipeline
//! - Compile the configured routes into the router and its responders
//! - Drain in-flight connections at shutdown

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::broadcast;

use crate::config::{RelayConfig, RouteAction};
use crate::forward::{ForwardResponder, UpstreamResolver};
use crate::net::{ConnectionGuard, ConnectionPermit, ConnectionTracker, Listener, ListenerError};
use crate::observability::metrics;
use crate::pipeline::{
    full_body, BadGatewayResponder, Pipeline, RequestContext, Responder, ResponderFuture,
};
use crate::routing::{MethodFilter, RouteLookup, Router, RouterError};
use crate::tunnel::StaticResolver;
use crate::upgrade::{EchoHandler, UpgradeMode, UpgradeResponder};

/// How long shutdown waits for in-flight connections before giving up.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Setup-time failure while compiling the configuration into a server.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("route table: {0}")]
    Router(#[from] RouterError),
    #[error("forward.upstream {0:?} is not a valid URI")]
    InvalidUpstream(String),
    #[error("route {pattern:?}: unknown method {method:?}")]
    InvalidMethod { pattern: String, method: String },
}

/// Pipeline stage that consults the route table and runs the matched
/// responder in place.
///
/// A routing miss is handled locally with a 404; it never reaches the
/// pipeline's error responder.
pub struct RouteDispatch {
    router: Arc<Router>,
}

impl RouteDispatch {
    pub fn new(router: Arc<Router>) -> Self {
        Self { router }
    }
}

impl Responder for RouteDispatch {
    fn respond<'a>(&'a self, ctx: &'a mut RequestContext) -> ResponderFuture<'a> {
        Box::pin(async move {
            match self.router.lookup(&ctx.method, ctx.uri.path()) {
                RouteLookup::Matched { responder, capture } => {
                    if let Some((name, value)) = capture {
                        ctx.set_param(name, value);
                    }
                    responder.respond(ctx).await
                }
                RouteLookup::NotFound => {
                    tracing::debug!(
                        request_id = %ctx.request_id,
                        method = %ctx.method,
                        path = %ctx.uri.path(),
                        "no matching route"
                    );
                    let response = Response::builder()
                        .status(StatusCode::NOT_FOUND)
                        .body(full_body("no matching route"))
                        .expect("static response");
                    ctx.set_response(response);
                    ctx.set_terminal();
                    Ok(())
                }
            }
        })
    }
}

/// First pipeline stage: log the parsed request head.
struct TraceRequests;

impl Responder for TraceRequests {
    fn respond<'a>(&'a self, ctx: &'a mut RequestContext) -> ResponderFuture<'a> {
        Box::pin(async move {
            tracing::debug!(
                request_id = %ctx.request_id,
                method = %ctx.method,
                path = %ctx.uri.path(),
                remote_addr = %ctx.remote_addr,
                "request received"
            );
            Ok(())
        })
    }
}

/// HTTP server for the relay's HTTP listener mode.
pub struct HttpServer {
    pipeline: Arc<Pipeline>,
    tracker: ConnectionTracker,
}

impl HttpServer {
    /// Wrap an already-assembled pipeline.
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            tracker: ConnectionTracker::new(),
        }
    }

    /// Compile the configured routes into a router-backed pipeline.
    ///
    /// Forward routes share one forwarding responder; upgrade routes
    /// share one upgrade responder whose post-handshake mode (frame
    /// transport or raw bridge) comes from the upgrade section.
    pub fn from_config(config: &RelayConfig) -> Result<Self, BuildError> {
        let upstream: Uri = config
            .forward
            .upstream
            .parse()
            .map_err(|_| BuildError::InvalidUpstream(config.forward.upstream.clone()))?;
        let timeout = Duration::from_secs(config.timeouts.upstream_secs);
        let forward: Arc<dyn Responder> = Arc::new(ForwardResponder::new(
            Arc::new(UpstreamResolver::new(upstream)),
            timeout,
        ));

        let mode = match &config.upgrade.bridge {
            Some(target) => UpgradeMode::Bridge(Arc::new(StaticResolver::new(
                target.host.clone(),
                target.port,
            ))),
            None => UpgradeMode::Frames(Arc::new(EchoHandler)),
        };
        let upgrade: Arc<dyn Responder> =
            Arc::new(UpgradeResponder::new(config.upgrade.protocols.clone(), mode));

        let mut router = Router::new();
        for route in &config.routes {
            let methods = if route.methods.is_empty() {
                MethodFilter::Any
            } else {
                let mut parsed = Vec::with_capacity(route.methods.len());
                for method in &route.methods {
                    parsed.push(Method::from_bytes(method.as_bytes()).map_err(|_| {
                        BuildError::InvalidMethod {
                            pattern: route.pattern.clone(),
                            method: method.clone(),
                        }
                    })?);
                }
                MethodFilter::Only(parsed)
            };
            let responder = match route.action {
                RouteAction::Forward => forward.clone(),
                RouteAction::Upgrade => upgrade.clone(),
            };
            router.add_route(&route.pattern, methods, responder)?;
        }

        let mut pipeline = Pipeline::new(Arc::new(BadGatewayResponder));
        pipeline.push(Arc::new(TraceRequests));
        pipeline.push(Arc::new(RouteDispatch::new(Arc::new(router))));
        Ok(Self::new(pipeline))
    }

    /// Accept loop. Stops accepting on shutdown, then drains.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        let addr = listener.local_addr().map_err(ListenerError::Bind)?;
        tracing::info!(address = %addr, "HTTP server listening");

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                accepted = listener.accept() => {
                    let (stream, remote_addr, permit) = accepted?;
                    let pipeline = self.pipeline.clone();
                    let guard = self.tracker.track();
                    let conn_shutdown = shutdown.resubscribe();
                    tokio::spawn(serve_connection(
                        stream,
                        remote_addr,
                        pipeline,
                        permit,
                        guard,
                        conn_shutdown,
                    ));
                }
            }
        }

        if tokio::time::timeout(DRAIN_TIMEOUT, self.tracker.drained())
            .await
            .is_err()
        {
            tracing::warn!(
                active = self.tracker.active_count(),
                "drain timeout expired, abandoning connections"
            );
        }
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// One connection's task: serve HTTP/1.1 requests until the peer closes,
/// an upgrade steals the socket, or shutdown drains us.
async fn serve_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
    pipeline: Arc<Pipeline>,
    permit: ConnectionPermit,
    guard: ConnectionGuard,
    mut shutdown: broadcast::Receiver<()>,
) {
    let connection_id = guard.id();
    let service = service_fn(move |request: Request<Incoming>| {
        let pipeline = pipeline.clone();
        async move {
            let start = Instant::now();
            let method = request.method().to_string();
            let mut ctx = RequestContext::new(request, remote_addr);
            pipeline.run(&mut ctx).await;
            let response = ctx.into_response();
            metrics::record_request(&method, response.status().as_u16(), start);
            Ok::<_, Infallible>(response)
        }
    });

    let io = TokioIo::new(stream);
    let mut conn = std::pin::pin!(http1::Builder::new()
        .serve_connection(io, service)
        .with_upgrades());

    tokio::select! {
        result = conn.as_mut() => {
            if let Err(error) = result {
                tracing::debug!(connection_id = %connection_id, %error, "connection ended with error");
            }
        }
        _ = shutdown.recv() => {
            conn.as_mut().graceful_shutdown();
            let _ = conn.await;
        }
    }

    drop(permit);
    drop(guard);
}
