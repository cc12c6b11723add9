//! Chat endpoint handler
//! Handles GET /api/chat (query params) and POST /api/chat (JSON or form)

use axum::{
    extract::{ConnectInfo, FromRequest, Query, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    Form,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use uuid::Uuid;

use crate::proxy::server::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct ChatParams {
    pub user: Option<String>,
    pub system: Option<String>,
}

/// POST bodies arrive as JSON or form-encoded depending on the client;
/// accept both behind one extractor.
pub struct ChatInput(pub ChatParams);

#[axum::async_trait]
impl<S: Send + Sync> FromRequest<S> for ChatInput {
    type Rejection = (StatusCode, String);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if content_type.starts_with("application/json") {
            let Json(params) = Json::<ChatParams>::from_request(req, state)
                .await
                .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
            Ok(ChatInput(params))
        } else {
            let Form(params) = Form::<ChatParams>::from_request(req, state)
                .await
                .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
            Ok(ChatInput(params))
        }
    }
}

/// Handle GET /api/chat?user=&system=
pub async fn handle_chat_get(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(params): Query<ChatParams>,
) -> impl IntoResponse {
    relay(state, addr, params).await
}

/// Handle POST /api/chat
pub async fn handle_chat_post(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    input: ChatInput,
) -> impl IntoResponse {
    relay(state, addr, input.0).await
}

async fn relay(
    state: AppState,
    addr: SocketAddr,
    params: ChatParams,
) -> (StatusCode, Json<Value>) {
    let request_id = Uuid::new_v4();
    let client = addr.ip().to_string();

    if !state.rate_limiter.check(&client) {
        tracing::warn!(%request_id, %client, "Rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(error_envelope("rate limit exceeded")),
        );
    }

    tracing::info!(%request_id, %client, "Chat request received");

    match state
        .chat
        .send(params.user.as_deref(), params.system.as_deref())
        .await
    {
        Ok(data) => (StatusCode::OK, Json(success_envelope(data))),
        Err(e) => {
            tracing::error!(%request_id, "Chat relay failed: {}", e);
            let message = if state.expose_errors {
                e.to_string()
            } else {
                "upstream request failed".to_string()
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(error_envelope(&message)))
        }
    }
}

fn success_envelope(data: Value) -> Value {
    json!({
        "success": true,
        "data": data,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })
}

fn error_envelope(message: &str) -> Value {
    json!({
        "success": false,
        "error": message,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })
}
