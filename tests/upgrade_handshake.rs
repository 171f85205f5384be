//! Integration tests for the upgrade handshake over a real socket.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use relay_proxy::config::{RelayConfig, RelayTarget, RouteAction, RouteConfig};
use relay_proxy::lifecycle::Shutdown;
use relay_proxy::net::Listener;
use relay_proxy::HttpServer;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;

mod common;

/// RFC 6455 §1.3 sample nonce and its accept value.
const SAMPLE_KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";
const SAMPLE_ACCEPT: &str = "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=";

fn upgrade_config(relay_addr: SocketAddr) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.listener.bind_address = relay_addr.to_string();
    config.routes.push(RouteConfig {
        pattern: "/ws".to_string(),
        methods: vec!["GET".to_string()],
        action: RouteAction::Upgrade,
    });
    config
}

async fn spawn_relay(config: &RelayConfig) -> Shutdown {
    let shutdown = Shutdown::new();
    let server = HttpServer::from_config(config).unwrap();
    let listener = Listener::bind(&config.listener).await.unwrap();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });
    tokio::time::sleep(Duration::from_millis(300)).await;
    shutdown
}

fn handshake_request(host: SocketAddr, version: &str, protocols: Option<&str>) -> String {
    let mut head = format!(
        "GET /ws HTTP/1.1\r\nHost: {}\r\nConnection: Upgrade\r\nUpgrade: websocket\r\n\
         Sec-WebSocket-Version: {}\r\nSec-WebSocket-Key: {}\r\n",
        host, version, SAMPLE_KEY
    );
    if let Some(protocols) = protocols {
        head.push_str(&format!("Sec-WebSocket-Protocol: {}\r\n", protocols));
    }
    head.push_str("\r\n");
    head
}

#[tokio::test]
async fn handshake_answers_rfc_accept_value_and_protocol() {
    let relay_addr: SocketAddr = "127.0.0.1:29211".parse().unwrap();
    let mut config = upgrade_config(relay_addr);
    config.upgrade.protocols = vec!["json".to_string()];
    let shutdown = spawn_relay(&config).await;

    let mut stream = TcpStream::connect(relay_addr).await.unwrap();
    stream
        .write_all(handshake_request(relay_addr, "13", Some("graphql-ws, json")).as_bytes())
        .await
        .unwrap();

    let head = common::read_head(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 101"), "unexpected head: {head}");
    // The accept value is base64 and case-sensitive; match it verbatim.
    assert!(head.contains(SAMPLE_ACCEPT), "accept value missing: {head}");
    assert!(head.to_lowercase().contains("sec-websocket-protocol: json"));

    shutdown.trigger();
}

#[tokio::test]
async fn wrong_version_is_rejected_with_client_error() {
    let relay_addr: SocketAddr = "127.0.0.1:29221".parse().unwrap();
    let config = upgrade_config(relay_addr);
    let shutdown = spawn_relay(&config).await;

    let mut stream = TcpStream::connect(relay_addr).await.unwrap();
    stream
        .write_all(handshake_request(relay_addr, "8", None).as_bytes())
        .await
        .unwrap();

    let head = common::read_head(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 400"), "unexpected head: {head}");

    shutdown.trigger();
}

#[tokio::test]
async fn upgraded_transport_echoes_frames() {
    let relay_addr: SocketAddr = "127.0.0.1:29201".parse().unwrap();
    let config = upgrade_config(relay_addr);
    let shutdown = spawn_relay(&config).await;

    let stream = TcpStream::connect(relay_addr).await.unwrap();
    let (mut transport, response) =
        tokio_tungstenite::client_async(format!("ws://{}/ws", relay_addr), stream)
            .await
            .expect("handshake failed");
    assert_eq!(response.status(), 101);

    transport.send(Message::Text("ping".into())).await.unwrap();
    match transport.next().await.unwrap().unwrap() {
        Message::Text(text) => assert_eq!(text.as_str(), "ping"),
        other => panic!("expected text frame, got {other:?}"),
    }

    transport.close(None).await.unwrap();
    shutdown.trigger();
}

#[tokio::test]
async fn bridge_mode_passes_post_handshake_bytes_verbatim() {
    let relay_addr: SocketAddr = "127.0.0.1:29231".parse().unwrap();
    let bridge_addr: SocketAddr = "127.0.0.1:29232".parse().unwrap();

    common::start_echo_upstream(bridge_addr).await;

    let mut config = upgrade_config(relay_addr);
    config.upgrade.bridge = Some(RelayTarget {
        host: bridge_addr.ip().to_string(),
        port: bridge_addr.port(),
    });
    let shutdown = spawn_relay(&config).await;

    let mut stream = TcpStream::connect(relay_addr).await.unwrap();
    stream
        .write_all(handshake_request(relay_addr, "13", None).as_bytes())
        .await
        .unwrap();
    let head = common::read_head(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 101"), "unexpected head: {head}");

    // The bridge never reframes: whatever goes in comes back from the
    // echo upstream byte for byte.
    let payload = b"raw-bytes-through-bridge";
    stream.write_all(payload).await.unwrap();

    let mut received = vec![0u8; payload.len()];
    stream.read_exact(&mut received).await.unwrap();
    assert_eq!(&received, payload);

    shutdown.trigger();
}
