//! Ordered, short-circuiting responder execution.
//!
//! # Responsibilities
//! - Invoke responders strictly in registration order
//! - Stop at the first responder that marks the context terminal
//! - Route any responder error to the single designated error responder

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use hyper::{Response, StatusCode};

use crate::error::RelayError;
use crate::pipeline::context::{full_body, RequestContext};

/// Boxed future returned by a responder invocation.
pub type ResponderFuture<'a> = Pin<Box<dyn Future<Output = Result<(), RelayError>> + Send + 'a>>;

/// A pipeline stage.
///
/// A responder reads and writes the shared [`RequestContext`]. It may
/// return normally (the next responder runs), mark the context terminal
/// (the pipeline stops), or return an error (remaining responders are
/// skipped and the error responder runs). Responders must not retain the
/// context beyond their own invocation.
pub trait Responder: Send + Sync {
    fn respond<'a>(&'a self, ctx: &'a mut RequestContext) -> ResponderFuture<'a>;
}

/// The pipeline's single error hook, invoked with the context and the
/// error that aborted it.
pub trait ErrorResponder: Send + Sync {
    fn handle<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        error: RelayError,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Default error hook: log, count, answer 502.
pub struct BadGatewayResponder;

impl ErrorResponder for BadGatewayResponder {
    fn handle<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        error: RelayError,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            tracing::error!(
                request_id = %ctx.request_id,
                method = %ctx.method,
                path = %ctx.uri.path(),
                %error,
                "responder failed"
            );
            crate::observability::metrics::record_pipeline_error();
            let response = Response::builder()
                .status(StatusCode::BAD_GATEWAY)
                .body(full_body("upstream request failed"))
                .expect("static response");
            ctx.set_response(response);
            ctx.set_terminal();
        })
    }
}

/// Ordered asynchronous middleware executor over a [`RequestContext`].
pub struct Pipeline {
    responders: Vec<Arc<dyn Responder>>,
    error_responder: Arc<dyn ErrorResponder>,
}

impl Pipeline {
    pub fn new(error_responder: Arc<dyn ErrorResponder>) -> Self {
        Self {
            responders: Vec::new(),
            error_responder,
        }
    }

    /// Append a responder. Registration order is execution order.
    pub fn push(&mut self, responder: Arc<dyn Responder>) -> &mut Self {
        self.responders.push(responder);
        self
    }

    /// Run the pipeline to completion over one context.
    ///
    /// Each responder's future is awaited before the next starts; there is
    /// no reordering and no parallel execution within one invocation.
    pub async fn run(&self, ctx: &mut RequestContext) {
        for responder in &self.responders {
            if ctx.is_terminal() {
                break;
            }
            if let Err(error) = responder.respond(ctx).await {
                self.error_responder.handle(ctx, error).await;
                return;
            }
        }
    }
}
