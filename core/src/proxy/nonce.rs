//! Nonce fetcher
//!
//! The chat backend wants a short-lived anti-automation token that only
//! exists inside the HTML of its public chat page. There is no contract:
//! we GET the page looking like a browser, pattern-match the token out of
//! the markup, and cache it with a conservative TTL. Transient failures
//! are retried with a backoff that grows per attempt.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{header, Client};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::proxy::error::ProxyError;
use crate::proxy::token_cache::{Token, TokenCache};

/// Cache key under which the current nonce lives.
pub const NONCE_CACHE_KEY: &str = "nonce";

pub(crate) const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// The token appears in an inline script blob as `"nonce":"<value>"`.
/// Kept behind this one regex so a layout change only touches extraction.
static NONCE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"nonce":"([^"]+)""#).expect("invalid nonce regex"));

/// Pull the first nonce out of a page body.
pub fn extract_nonce(body: &str) -> Option<&str> {
    NONCE_PATTERN
        .captures(body)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str())
}

pub struct NonceFetcher {
    http_client: Client,
    cache: Arc<TokenCache>,
    origin_url: String,
    ttl: Duration,
    max_retries: u32,
    retry_base: Duration,
    // Coalesces concurrent cache misses into one in-flight fetch.
    fetch_lock: tokio::sync::Mutex<()>,
}

impl NonceFetcher {
    pub fn new(config: &Config, cache: Arc<TokenCache>) -> Self {
        let http_client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(10))
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            cache,
            origin_url: config.upstream.origin_url.clone(),
            ttl: Duration::from_secs(config.nonce.ttl_secs),
            max_retries: config.nonce.max_retries,
            retry_base: Duration::from_millis(config.nonce.retry_base_ms),
            fetch_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Current token from the cache, fetching a fresh one on miss.
    ///
    /// Concurrent misses queue on the fetch lock and re-check the cache
    /// once they hold it, so a burst of cold requests costs one upstream
    /// GET instead of one per request.
    pub async fn acquire(&self) -> Result<Token, ProxyError> {
        if let Some(token) = self.cache.get(NONCE_CACHE_KEY) {
            return Ok(token);
        }

        let _guard = self.fetch_lock.lock().await;
        if let Some(token) = self.cache.get(NONCE_CACHE_KEY) {
            return Ok(token);
        }
        self.fetch().await
    }

    /// Fetch a fresh nonce, store it in the cache, and return it.
    ///
    /// Retries transient failures up to `max_retries` attempts total,
    /// sleeping attempt-number x base between tries (1s, 2s with the
    /// default base). Exhaustion wraps the last error.
    pub async fn fetch(&self) -> Result<Token, ProxyError> {
        let mut last_error: Option<ProxyError> = None;

        for attempt in 1..=self.max_retries {
            if attempt > 1 {
                let delay = self.retry_base * (attempt - 1);
                tracing::debug!("Nonce fetch attempt {} after {:?} backoff", attempt, delay);
                tokio::time::sleep(delay).await;
            }

            match self.fetch_once().await {
                Ok(value) => {
                    tracing::info!("Nonce acquired (attempt {})", attempt);
                    return Ok(self.cache.set(NONCE_CACHE_KEY, value, self.ttl));
                }
                Err(e) => {
                    tracing::warn!("Nonce fetch attempt {} failed: {}", attempt, e);
                    last_error = Some(e);
                }
            }
        }

        Err(ProxyError::NonceFetchExhausted {
            attempts: self.max_retries,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempts made".to_string()),
        })
    }

    /// One GET against the origin page. Every failure here is transient
    /// from the retry loop's point of view.
    async fn fetch_once(&self) -> Result<String, ProxyError> {
        let response = self
            .http_client
            .get(&self.origin_url)
            .header(
                header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header(header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| ProxyError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProxyError::UpstreamUnavailable(format!(
                "origin page returned {}",
                status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProxyError::UpstreamUnavailable(e.to_string()))?;

        extract_nonce(&body)
            .map(|s| s.to_string())
            .ok_or(ProxyError::TokenNotFound)
    }
}
