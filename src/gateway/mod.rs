// Edge gateway module.
// Serves the repository payload over HTTP with stale-while-revalidate caching.

pub mod handler;
pub mod swr;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::cache::MemoryStore;
use crate::config::{GatewayConfig, UpstreamConfig};
use crate::error::Result;
use crate::fetcher::UpstreamFetcher;

pub use handler::create_router;
pub use swr::{CacheStatus, Gateway, Served};

/// Bind the listener and serve until Ctrl-C.
pub async fn run(gateway_config: GatewayConfig, upstream: &UpstreamConfig) -> Result<()> {
    let fetcher = UpstreamFetcher::new(upstream)?;
    let listen = gateway_config.listen;
    let gateway = Gateway::new(
        Arc::new(MemoryStore::new()),
        Arc::new(fetcher),
        gateway_config,
    );

    let listener = TcpListener::bind(listen).await?;
    info!(%listen, user = %upstream.user, "gateway listening");

    axum::serve(listener, create_router(gateway))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; serve until the process is killed.
        std::future::pending::<()>().await;
    }
}
