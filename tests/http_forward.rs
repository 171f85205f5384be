//! Integration tests for the HTTP listener mode and the forwarding
//! responder.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hyper::{Response, StatusCode};
use relay_proxy::config::{RelayConfig, RouteAction, RouteConfig};
use relay_proxy::forward::{ForwardResponder, UpstreamResolver};
use relay_proxy::http::RouteDispatch;
use relay_proxy::lifecycle::Shutdown;
use relay_proxy::net::Listener;
use relay_proxy::pipeline::{full_body, ErrorResponder, Pipeline, RequestContext};
use relay_proxy::routing::{MethodFilter, Router};
use relay_proxy::{HttpServer, RelayError};

mod common;

#[tokio::test]
async fn forwards_request_and_streams_response_back() {
    let upstream_addr: SocketAddr = "127.0.0.1:29101".parse().unwrap();
    let relay_addr: SocketAddr = "127.0.0.1:29102".parse().unwrap();

    common::start_mock_upstream(upstream_addr, "hello from upstream").await;

    let mut config = RelayConfig::default();
    config.listener.bind_address = relay_addr.to_string();
    config.forward.upstream = format!("http://{}", upstream_addr);
    config.routes.push(RouteConfig {
        pattern: "/api/*".to_string(),
        methods: vec![],
        action: RouteAction::Forward,
    });

    let shutdown = Shutdown::new();
    let server = HttpServer::from_config(&config).unwrap();
    let listener = Listener::bind(&config.listener).await.unwrap();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });
    tokio::time::sleep(Duration::from_millis(300)).await;

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let res = client
        .get(format!("http://{}/api/v1/things", relay_addr))
        .send()
        .await
        .expect("relay unreachable");

    assert_eq!(res.status(), 200);
    assert!(res.headers().get("x-request-id").is_some());
    assert_eq!(res.text().await.unwrap(), "hello from upstream");

    shutdown.trigger();
}

#[tokio::test]
async fn unrouted_path_answers_not_found() {
    let upstream_addr: SocketAddr = "127.0.0.1:29121".parse().unwrap();
    let relay_addr: SocketAddr = "127.0.0.1:29122".parse().unwrap();

    common::start_mock_upstream(upstream_addr, "unused").await;

    let mut config = RelayConfig::default();
    config.listener.bind_address = relay_addr.to_string();
    config.forward.upstream = format!("http://{}", upstream_addr);
    config.routes.push(RouteConfig {
        pattern: "/static/*".to_string(),
        methods: vec![],
        action: RouteAction::Forward,
    });

    let shutdown = Shutdown::new();
    let server = HttpServer::from_config(&config).unwrap();
    let listener = Listener::bind(&config.listener).await.unwrap();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });
    tokio::time::sleep(Duration::from_millis(300)).await;

    let client = reqwest::Client::builder().no_proxy().build().unwrap();

    // The wildcard needs a non-empty remainder; the bare prefix misses.
    let res = client
        .get(format!("http://{}/static", relay_addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    let res = client
        .get(format!("http://{}/elsewhere", relay_addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    shutdown.trigger();
}

/// Error hook that counts its invocations before answering 502.
struct CountingBadGateway(Arc<AtomicU32>);

impl ErrorResponder for CountingBadGateway {
    fn handle<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        _error: RelayError,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            self.0.fetch_add(1, Ordering::SeqCst);
            let response = Response::builder()
                .status(StatusCode::BAD_GATEWAY)
                .body(full_body("upstream request failed"))
                .unwrap();
            ctx.set_response(response);
            ctx.set_terminal();
        })
    }
}

#[tokio::test]
async fn unreachable_target_invokes_error_hook_exactly_once() {
    let relay_addr: SocketAddr = "127.0.0.1:29112".parse().unwrap();
    // Nothing listens here.
    let dead_upstream = "http://127.0.0.1:29110";

    let forward = Arc::new(ForwardResponder::new(
        Arc::new(UpstreamResolver::new(dead_upstream.parse().unwrap())),
        Duration::from_secs(2),
    ));
    let mut router = Router::new();
    router.add_route("/api/*", MethodFilter::Any, forward).unwrap();

    let errors = Arc::new(AtomicU32::new(0));
    let mut pipeline = Pipeline::new(Arc::new(CountingBadGateway(errors.clone())));
    pipeline.push(Arc::new(RouteDispatch::new(Arc::new(router))));

    let mut config = RelayConfig::default();
    config.listener.bind_address = relay_addr.to_string();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(pipeline);
    let listener = Listener::bind(&config.listener).await.unwrap();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });
    tokio::time::sleep(Duration::from_millis(300)).await;

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let res = client
        .get(format!("http://{}/api/anything", relay_addr))
        .send()
        .await
        .expect("relay unreachable");

    assert_eq!(res.status(), 502);
    assert_eq!(res.text().await.unwrap(), "upstream request failed");
    assert_eq!(errors.load(Ordering::SeqCst), 1);

    shutdown.trigger();
}
