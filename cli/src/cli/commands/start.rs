use std::path::PathBuf;

use relaychat_core::config::load_config;
use relaychat_core::proxy::ProxyServer;

pub async fn run(config_path: Option<PathBuf>, port_override: Option<u16>) -> anyhow::Result<()> {
    // Load configuration
    let mut config = load_config(config_path)?;

    // Apply port override if provided
    if let Some(port) = port_override {
        config.server.port = port;
    }

    tracing::info!("Starting Relaychat Proxy...");
    tracing::info!("  Port: {}", config.server.port);
    tracing::info!("  Host: {}", config.server.host);
    tracing::info!("  Origin page: {}", config.upstream.origin_url);
    tracing::info!("  Chat endpoint: {}", config.upstream.chat_url);
    tracing::info!(
        "  Nonce TTL: {}s, retries: {}",
        config.nonce.ttl_secs,
        config.nonce.max_retries
    );

    // Create and start server
    let server = ProxyServer::new(&config);

    tracing::info!(
        "Proxy server starting on http://{}:{}",
        config.server.host,
        config.server.port
    );
    tracing::info!("Press Ctrl+C to stop");

    // Run server (blocks until shutdown)
    server.run().await?;

    Ok(())
}
