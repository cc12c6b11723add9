//! Chat proxy
//!
//! Takes a user message and system prompt, blends them into the single
//! text field the upstream accepts, attaches the current nonce, and POSTs
//! the form to the AJAX endpoint. The upstream JSON is relayed verbatim.

use reqwest::{header, Client};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::proxy::error::ProxyError;
use crate::proxy::nonce::{NonceFetcher, BROWSER_USER_AGENT, NONCE_CACHE_KEY};
use crate::proxy::token_cache::TokenCache;

/// Substitute the default when a field is absent or blank. Nothing empty
/// ever reaches the upstream.
fn effective_field<'a>(value: Option<&'a str>, default: &'a str) -> &'a str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => default,
    }
}

/// The upstream takes one blended text field, not separate roles.
fn blend_message(system: &str, user: &str) -> String {
    format!("System: {}\nUser: {}", system, user)
}

pub struct ChatProxy {
    http_client: Client,
    cache: Arc<TokenCache>,
    fetcher: Arc<NonceFetcher>,
    chat_url: String,
    chat_action: String,
    referer: String,
    default_user_message: String,
    default_system_prompt: String,
    invalidate_on_reject: bool,
}

impl ChatProxy {
    pub fn new(config: &Config, cache: Arc<TokenCache>, fetcher: Arc<NonceFetcher>) -> Self {
        // Generation is slow upstream, so the body timeout is generous.
        let http_client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            cache,
            fetcher,
            chat_url: config.upstream.chat_url.clone(),
            chat_action: config.upstream.chat_action.clone(),
            referer: config.upstream.referer.clone(),
            default_user_message: config.chat.default_user_message.clone(),
            default_system_prompt: config.chat.default_system_prompt.clone(),
            invalidate_on_reject: config.nonce.invalidate_on_reject,
        }
    }

    /// Relay one chat message upstream and return the response JSON.
    pub async fn send(
        &self,
        user_message: Option<&str>,
        system_prompt: Option<&str>,
    ) -> Result<Value, ProxyError> {
        let user = effective_field(user_message, &self.default_user_message);
        let system = effective_field(system_prompt, &self.default_system_prompt);
        let message = blend_message(system, user);

        let token = self.fetcher.acquire().await?;

        let form = [
            ("action", self.chat_action.as_str()),
            ("message", message.as_str()),
            ("_wpnonce", token.value.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.chat_url)
            .header(header::REFERER, &self.referer)
            .header(header::ACCEPT, "application/json, text/javascript, */*; q=0.01")
            .header("X-Requested-With", "XMLHttpRequest")
            .form(&form)
            .send()
            .await
            .map_err(|e| ProxyError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            // No retry here: a rejection is not assumed to be token-related.
            if self.invalidate_on_reject {
                tracing::info!("Chat endpoint returned {}, dropping cached nonce", status);
                self.cache.invalidate(NONCE_CACHE_KEY);
            } else {
                tracing::warn!("Chat endpoint returned {}", status);
            }
            return Err(ProxyError::UpstreamRejected {
                status: status.as_u16(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ProxyError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server_uri: &str) -> Config {
        let mut config = Config::default();
        config.upstream.origin_url = format!("{}/chat/", server_uri);
        config.upstream.chat_url = format!("{}/wp-admin/admin-ajax.php", server_uri);
        config.upstream.referer = format!("{}/chat/", server_uri);
        config.nonce.retry_base_ms = 10;
        config
    }

    fn build_proxy(config: &Config) -> (ChatProxy, Arc<TokenCache>) {
        let cache = Arc::new(TokenCache::new());
        let fetcher = Arc::new(NonceFetcher::new(config, cache.clone()));
        (ChatProxy::new(config, cache.clone(), fetcher), cache)
    }

    #[test]
    fn blank_fields_fall_back_to_defaults() {
        assert_eq!(effective_field(None, "Hello"), "Hello");
        assert_eq!(effective_field(Some(""), "Hello"), "Hello");
        assert_eq!(effective_field(Some("   "), "Hello"), "Hello");
        assert_eq!(effective_field(Some("hi"), "Hello"), "hi");
    }

    #[test]
    fn blended_message_carries_both_markers() {
        let message = blend_message("be terse", "what is rust?");
        assert_eq!(message, "System: be terse\nUser: what is rust?");
    }

    #[tokio::test]
    async fn full_relay_scenario() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/chat/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"<script>{"nonce":"abc123"}</script>"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/wp-admin/admin-ajax.php"))
            .and(body_string_contains("_wpnonce=abc123"))
            .and(body_string_contains("action=wpaicg_chat_shortcode_message"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "hi"})))
            .expect(1)
            .mount(&server)
            .await;

        let config = test_config(&server.uri());
        let (proxy, _cache) = build_proxy(&config);

        let data = proxy.send(Some("hello"), None).await.unwrap();
        assert_eq!(data, json!({"response": "hi"}));
    }

    #[tokio::test]
    async fn cached_token_is_reused_across_requests() {
        let server = MockServer::start().await;

        // One scrape serves both chat calls.
        Mock::given(method("GET"))
            .and(path("/chat/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"nonce":"once"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/wp-admin/admin-ajax.php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "ok"})))
            .expect(2)
            .mount(&server)
            .await;

        let config = test_config(&server.uri());
        let (proxy, _cache) = build_proxy(&config);

        proxy.send(Some("first"), None).await.unwrap();
        proxy.send(Some("second"), None).await.unwrap();
    }

    #[tokio::test]
    async fn rejection_surfaces_without_refetch_by_default() {
        let server = MockServer::start().await;

        // Origin must not be hit: the token is already cached.
        Mock::given(method("GET"))
            .and(path("/chat/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"nonce":"x"}"#))
            .expect(0)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/wp-admin/admin-ajax.php"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let config = test_config(&server.uri());
        let (proxy, cache) = build_proxy(&config);
        cache.set(NONCE_CACHE_KEY, "stale".to_string(), Duration::from_secs(3600));

        let err = proxy.send(Some("hi"), None).await.unwrap_err();
        match err {
            ProxyError::UpstreamRejected { status } => assert_eq!(status, 403),
            other => panic!("expected UpstreamRejected, got {:?}", other),
        }

        // Default policy keeps the cached token in place.
        assert!(cache.get(NONCE_CACHE_KEY).is_some());
    }

    #[tokio::test]
    async fn rejection_drops_token_when_configured() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/wp-admin/admin-ajax.php"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let mut config = test_config(&server.uri());
        config.nonce.invalidate_on_reject = true;
        let (proxy, cache) = build_proxy(&config);
        cache.set(NONCE_CACHE_KEY, "stale".to_string(), Duration::from_secs(3600));

        let err = proxy.send(Some("hi"), None).await.unwrap_err();
        assert!(matches!(err, ProxyError::UpstreamRejected { status: 401 }));
        assert!(cache.get(NONCE_CACHE_KEY).is_none());
    }

    #[tokio::test]
    async fn non_json_success_body_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/wp-admin/admin-ajax.php"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>cloudflare</html>"))
            .mount(&server)
            .await;

        let config = test_config(&server.uri());
        let (proxy, cache) = build_proxy(&config);
        cache.set(NONCE_CACHE_KEY, "tok".to_string(), Duration::from_secs(3600));

        let err = proxy.send(Some("hi"), None).await.unwrap_err();
        assert!(matches!(err, ProxyError::InvalidResponse(_)));
    }
}
