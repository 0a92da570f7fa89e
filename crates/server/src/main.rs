//! upcache server entry point.
//!
//! Boots the MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;
use upcache_client::{CacheEngine, HttpUpstream, UpstreamConfig};
use upcache_core::AppConfig;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(store = ?config.store, namespaces = config.namespaces.len(), "starting upcache on stdio transport");

    let store = upcache_core::store::open(&config).await?;
    let upstream = HttpUpstream::new(&UpstreamConfig::from(&config))?;
    let engine = CacheEngine::new(store, Arc::new(upstream), config.cache_limits());

    let handler = handler::UpcacheServer::new(Arc::new(engine), Arc::new(config));
    let server = serve_server(handler, stdio()).await?;

    server.waiting().await?;

    Ok(())
}
