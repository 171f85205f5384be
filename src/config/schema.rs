//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the relay proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration (bind address, mode, backpressure).
    pub listener: ListenerConfig,

    /// Route definitions mapping requests to responders (HTTP mode).
    pub routes: Vec<RouteConfig>,

    /// Raw TCP relay target (TCP mode).
    pub relay: RelayTarget,

    /// HTTP forwarding settings.
    pub forward: ForwardConfig,

    /// Upgrade handshake settings.
    pub upgrade: UpgradeConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// What an accepted connection is handed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListenerMode {
    /// Parse HTTP requests and run them through the responder pipeline.
    Http,
    /// Install a proxy tunnel per connection; bytes are never interpreted.
    Tcp,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Listener mode.
    pub mode: ListenerMode,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            mode: ListenerMode::Http,
            max_connections: 10_000,
        }
    }
}

/// A host/port pair for tunnel targets.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayTarget {
    pub host: String,
    pub port: u16,
}

impl Default for RelayTarget {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9000,
        }
    }
}

/// What a matched route does with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteAction {
    /// One-shot streaming forward to the configured upstream.
    Forward,
    /// Upgrade handshake, then hand off to the frame transport or bridge.
    Upgrade,
}

/// Route configuration: pattern + methods + action.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Path pattern. Literal segments with at most one trailing wildcard
    /// (`/static/*` or `/user/:id`).
    pub pattern: String,

    /// HTTP methods this route accepts. Empty means any method.
    #[serde(default)]
    pub methods: Vec<String>,

    /// Responder installed for the route.
    pub action: RouteAction,
}

/// HTTP forwarding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ForwardConfig {
    /// Upstream base URL, e.g. "http://127.0.0.1:3000".
    pub upstream: String,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            upstream: "http://127.0.0.1:3000".to_string(),
        }
    }
}

/// Upgrade handshake configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct UpgradeConfig {
    /// Sub-protocol tokens this server supports, in preference order.
    pub protocols: Vec<String>,

    /// When set, the upgraded socket is bridged to this target as raw
    /// bytes instead of being served by the frame transport.
    pub bridge: Option<RelayTarget>,
}

/// Timeout configuration for outbound operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Outbound request timeout for the forwarding responder, in seconds.
    pub upstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { upstream_secs: 30 }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable the Prometheus metrics exporter.
    pub metrics_enabled: bool,

    /// Address the metrics endpoint binds to.
    pub metrics_address: String,

    /// Default log filter, overridden by RUST_LOG when set.
    pub log_filter: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
            log_filter: "relay_proxy=info".to_string(),
        }
    }
}
