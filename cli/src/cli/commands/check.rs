use std::path::PathBuf;
use std::sync::Arc;

use relaychat_core::config::load_config;
use relaychat_core::proxy::{NonceFetcher, TokenCache};

/// One-shot nonce fetch against the configured origin. Useful to verify
/// the page still serves a token before starting the proxy.
pub async fn run(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    tracing::info!("Checking origin {}", config.upstream.origin_url);

    let cache = Arc::new(TokenCache::new());
    let fetcher = NonceFetcher::new(&config, cache);

    match fetcher.fetch().await {
        Ok(token) => {
            println!(
                "{}",
                serde_json::json!({
                    "ok": true,
                    "token_length": token.value.len(),
                    "ttl_secs": token.ttl.as_secs(),
                })
            );
            Ok(())
        }
        Err(e) => {
            println!("{}", serde_json::json!({ "ok": false, "error": e.to_string() }));
            anyhow::bail!("nonce check failed: {}", e)
        }
    }
}
