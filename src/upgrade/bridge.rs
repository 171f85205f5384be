//! Post-handshake handoff: frame transport or raw bridge.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use hyper::header::HeaderValue;
use hyper::upgrade::Upgraded;
use hyper::{Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::observability::metrics;
use crate::pipeline::{empty_body, full_body, RequestContext, Responder, ResponderFuture};
use crate::tunnel::{connect_target, ConnectMeta, TargetResolver, Tunnel};
use crate::upgrade::handshake;
use crate::RelayError;

/// The frame-level transport an upgraded socket is handed to.
pub type WsTransport = WebSocketStream<TokioIo<Upgraded>>;

/// Receives the upgraded transport once the 101 exchange completes.
pub trait UpgradeHandler: Send + Sync {
    fn handle(&self, transport: WsTransport, protocol: Option<String>) -> BoxFuture<'static, ()>;
}

/// Default frame handler: echo text and binary frames until close.
pub struct EchoHandler;

impl UpgradeHandler for EchoHandler {
    fn handle(&self, mut transport: WsTransport, protocol: Option<String>) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            tracing::debug!(protocol = ?protocol, "echo transport started");
            while let Some(message) = transport.next().await {
                match message {
                    Ok(message @ (Message::Text(_) | Message::Binary(_))) => {
                        if transport.send(message).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        })
    }
}

/// What happens to the socket after the 101 response.
pub enum UpgradeMode {
    /// Hand the socket to the frame transport and run the handler.
    Frames(Arc<dyn UpgradeHandler>),
    /// Bridge the upgraded byte stream to an upstream target through a
    /// tunnel; bytes are never reframed.
    Bridge(Arc<dyn TargetResolver>),
}

/// Responder performing the upgrade handshake.
///
/// Walks Received → Validating → KeyComputed → ResponseSent → HandedOff,
/// or bails to Failed with an error status. Handshake failures are
/// handled locally; they never reach the pipeline's error responder.
pub struct UpgradeResponder {
    supported: Vec<String>,
    mode: UpgradeMode,
}

impl UpgradeResponder {
    pub fn new(supported: Vec<String>, mode: UpgradeMode) -> Self {
        Self { supported, mode }
    }

    fn reject(ctx: &mut RequestContext, error: handshake::HandshakeError) {
        tracing::warn!(
            request_id = %ctx.request_id,
            path = %ctx.uri.path(),
            %error,
            "upgrade rejected"
        );
        metrics::record_upgrade("rejected");
        // A failed handshake does not fall back to plain HTTP: close.
        let response = Response::builder()
            .status(StatusCode::BAD_REQUEST)
            .header("connection", "close")
            .body(full_body(error.to_string()))
            .expect("static response");
        ctx.set_response(response);
        ctx.set_terminal();
    }
}

impl Responder for UpgradeResponder {
    fn respond<'a>(&'a self, ctx: &'a mut RequestContext) -> ResponderFuture<'a> {
        Box::pin(async move {
            let record = match handshake::validate(&ctx.method, &ctx.headers, &self.supported) {
                Ok(record) => record,
                Err(error) => {
                    Self::reject(ctx, error);
                    return Ok(());
                }
            };

            let on_upgrade = ctx
                .take_upgrade()
                .ok_or(RelayError::Internal("upgrade handle already claimed"))?;

            // The handoff task waits for hyper to finish the 101 exchange,
            // then owns the socket. Any bytes hyper read past the request
            // head are replayed by Upgraded, so nothing is lost to the
            // frame parser.
            let negotiated = record.negotiated.clone();
            let mode = match &self.mode {
                UpgradeMode::Frames(handler) => UpgradeMode::Frames(handler.clone()),
                UpgradeMode::Bridge(resolver) => UpgradeMode::Bridge(resolver.clone()),
            };
            let remote_addr = ctx.remote_addr;
            let request_id = ctx.request_id.clone();
            tokio::spawn(async move {
                let upgraded = match on_upgrade.await {
                    Ok(upgraded) => upgraded,
                    Err(error) => {
                        tracing::warn!(request_id = %request_id, %error, "upgrade never completed");
                        return;
                    }
                };
                metrics::record_upgrade("completed");
                let io = TokioIo::new(upgraded);
                match mode {
                    UpgradeMode::Frames(handler) => {
                        let transport =
                            WebSocketStream::from_raw_socket(io, Role::Server, None).await;
                        handler.handle(transport, negotiated).await;
                    }
                    UpgradeMode::Bridge(resolver) => {
                        let meta = ConnectMeta { remote_addr };
                        let tunnel = Tunnel::open(io, async move {
                            connect_target(resolver.as_ref(), &meta).await
                        });
                        tunnel.closed().await;
                    }
                }
            });

            let mut builder = Response::builder()
                .status(StatusCode::SWITCHING_PROTOCOLS)
                .header("upgrade", "websocket")
                .header("connection", "Upgrade")
                .header("sec-websocket-accept", record.accept.as_str());
            if let Some(protocol) = &record.negotiated {
                if let Ok(value) = HeaderValue::from_str(protocol) {
                    builder = builder.header("sec-websocket-protocol", value);
                }
            }
            let response = builder
                .body(empty_body())
                .map_err(|_| RelayError::Internal("failed to build 101 response"))?;

            tracing::debug!(
                request_id = %ctx.request_id,
                protocol = ?record.negotiated,
                "switching protocols"
            );
            ctx.set_response(response);
            ctx.set_terminal();
            Ok(())
        })
    }
}
