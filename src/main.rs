//! Relay proxy binary: load config, start observability, serve.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use relay_proxy::config::{load_config, ListenerMode};
use relay_proxy::lifecycle::{signals, Shutdown};
use relay_proxy::net::Listener;
use relay_proxy::observability::{logging, metrics};
use relay_proxy::tunnel::{StaticResolver, TcpRelayServer};
use relay_proxy::{HttpServer, RelayConfig};

#[derive(Parser)]
#[command(name = "relay-proxy")]
#[command(about = "HTTP/TCP relay with tunneling and protocol upgrades", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address from the config.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RelayConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability.log_filter);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        mode = ?config.listener.mode,
        max_connections = config.listener.max_connections,
        "configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "failed to parse metrics address"
            ),
        }
    }

    let listener = Listener::bind(&config.listener).await?;
    let shutdown = Arc::new(Shutdown::new());
    signals::install(shutdown.clone());

    match config.listener.mode {
        ListenerMode::Http => {
            let server = HttpServer::from_config(&config)?;
            server.run(listener, shutdown.subscribe()).await?;
        }
        ListenerMode::Tcp => {
            let resolver = Arc::new(StaticResolver::new(
                config.relay.host.clone(),
                config.relay.port,
            ));
            let server = TcpRelayServer::new(resolver);
            server.run(listener, shutdown.subscribe()).await?;
        }
    }

    tracing::info!("shutdown complete");
    Ok(())
}
