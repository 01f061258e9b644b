//! offcache server entry point.
//!
//! Loads configuration, opens the cache database, installs the asset manifest
//! and activates the current namespaces, then serves MCP on stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

use offcache_client::OfflineService;
use offcache_core::{AppConfig, CacheDb};

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    tracing::info!(origin = %config.origin, version = %config.cache_version, db = %config.db_path.display(), "starting offcache");

    let db = CacheDb::open(&config.db_path).await.context("failed to open cache database")?;
    let service = OfflineService::from_config(&config, db.clone()).context("failed to build offline service")?;

    // Nothing is served until install and activation have both finished.
    service.start().await.context("install failed")?;

    let handler = handler::OffcacheServer::new(Arc::new(service));
    let server = serve_server(handler, stdio()).await?;

    server.waiting().await?;

    db.close().await.context("failed to close cache database")?;
    Ok(())
}
