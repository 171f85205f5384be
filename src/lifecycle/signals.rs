//! OS signal handling.

use std::sync::Arc;

use crate::lifecycle::Shutdown;

/// Spawn the task that translates Ctrl+C into a shutdown trigger.
pub fn install(shutdown: Arc<Shutdown>) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("shutdown signal received");
                shutdown.trigger();
            }
            Err(error) => {
                tracing::error!(%error, "failed to install Ctrl+C handler");
            }
        }
    });
}
