//! Proxy Server - Axum HTTP server

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::proxy::chat::ChatProxy;
use crate::proxy::nonce::NonceFetcher;
use crate::proxy::rate_limit::RateLimiter;
use crate::proxy::token_cache::TokenCache;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatProxy>,
    pub cache: Arc<TokenCache>,
    pub rate_limiter: Arc<RateLimiter>,
    pub expose_errors: bool,
    pub started_at: Instant,
}

/// Proxy server instance
pub struct ProxyServer {
    host: String,
    port: u16,
    state: AppState,
}

impl ProxyServer {
    pub fn new(config: &Config) -> Self {
        let cache = Arc::new(TokenCache::new());
        let fetcher = Arc::new(NonceFetcher::new(config, cache.clone()));
        let chat = Arc::new(ChatProxy::new(config, cache.clone(), fetcher));
        let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));

        let state = AppState {
            chat,
            cache,
            rate_limiter,
            expose_errors: config.server.expose_errors,
            started_at: Instant::now(),
        };

        Self {
            host: config.server.host.clone(),
            port: config.server.port,
            state,
        }
    }

    /// Run the proxy server (blocking)
    pub async fn run(self) -> anyhow::Result<()> {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let app = Router::new()
            // Health check
            .route("/healthz", get(health_check_handler))
            .route("/health", get(health_check_handler))
            // Cache counters
            .route("/metrics", get(metrics_handler))
            // Chat relay
            .route(
                "/api/chat",
                get(crate::proxy::handlers::chat::handle_chat_get)
                    .post(crate::proxy::handlers::chat::handle_chat_post),
            )
            .layer(SetResponseHeaderLayer::if_not_present(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                header::X_FRAME_OPTIONS,
                HeaderValue::from_static("DENY"),
            ))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state);

        let addr = format!("{}:{}", self.host, self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        tracing::info!("Proxy server listening on {}", addr);

        // Handle graceful shutdown
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        tracing::info!("Proxy server stopped");
        Ok(())
    }
}

/// Health check handler
async fn health_check_handler() -> Response {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))).into_response()
}

/// Cache stats handler
async fn metrics_handler(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Response {
    let stats = state.cache.stats();
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "uptime_secs": state.started_at.elapsed().as_secs(),
            "cache": stats,
        })),
    )
        .into_response()
}

/// Shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
