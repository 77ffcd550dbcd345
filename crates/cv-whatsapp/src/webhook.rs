//! Webhook server for receiving WhatsApp messages from the Cloud API

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::dispatcher::Dispatcher;
use crate::error::{Result, WhatsAppError};
use crate::types::{is_valid_phone, WebhookPayload};

/// Webhook server state
pub struct WebhookState {
    pub dispatcher: Arc<Dispatcher>,
    /// Secret expected during subscription verification
    pub verify_token: String,
    /// The bot's own number; its messages are never handled
    pub phone_number_id: String,
    /// Bearer key for `/metrics`, if any
    pub metrics_key: Option<String>,
}

/// Subscription handshake parameters
#[derive(Debug, Default, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode", alias = "mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token", alias = "verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge", alias = "challenge")]
    pub challenge: Option<String>,
}

/// Quick-poll request body
#[derive(Debug, Deserialize)]
pub struct QuickPollRequest {
    pub phone: String,
    pub text: String,
}

/// Check a subscription request, returning the challenge to echo
pub fn verify_subscription(params: &VerifyParams, expected_token: &str) -> Result<String> {
    let subscribed = params.mode.as_deref() == Some("subscribe");
    let token_matches = params.verify_token.as_deref() == Some(expected_token);

    if subscribed && token_matches {
        Ok(params.challenge.clone().unwrap_or_default())
    } else {
        Err(WhatsAppError::WebhookVerificationFailed)
    }
}

/// Simple API key validation
pub fn validate_api_key(provided: Option<&str>, expected: Option<&str>) -> bool {
    match (provided, expected) {
        (Some(p), Some(e)) => p == e,
        (_, None) => true,        // No key configured, allow
        (None, Some(_)) => false, // Key required but not provided
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// Build the HTTP router
pub fn router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/webhook/whatsapp", get(handle_verify).post(handle_webhook))
        .route("/webhook", post(handle_quick_poll))
        .route("/metrics", get(handle_metrics))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Webhook server
pub struct WebhookServer {
    addr: SocketAddr,
    state: Arc<WebhookState>,
}

impl WebhookServer {
    /// Create a new webhook server
    pub fn new(addr: SocketAddr, state: Arc<WebhookState>) -> Self {
        Self { addr, state }
    }

    /// Serve until `shutdown` resolves
    pub async fn start<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!("Starting WhatsApp webhook server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| WhatsAppError::Config(format!("Failed to bind {}: {}", self.addr, e)))?;

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| WhatsAppError::Http(e.to_string()))?;

        Ok(())
    }
}

/// Handle subscription verification
async fn handle_verify(
    State(state): State<Arc<WebhookState>>,
    query: std::result::Result<Query<VerifyParams>, QueryRejection>,
) -> Response {
    let verified = match query {
        Ok(Query(params)) => verify_subscription(&params, &state.verify_token),
        Err(rejection) => {
            warn!("Malformed verification query: {}", rejection);
            Err(WhatsAppError::WebhookVerificationFailed)
        }
    };

    match verified {
        Ok(challenge) => {
            info!("Webhook subscription verified");
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/plain")],
                challenge,
            )
                .into_response()
        }
        Err(e) => {
            warn!("{}", e);
            (
                StatusCode::FORBIDDEN,
                Json(json!({ "status": "forbidden" })),
            )
                .into_response()
        }
    }
}

/// Handle incoming webhook deliveries. Always acknowledged.
async fn handle_webhook(State(state): State<Arc<WebhookState>>, body: Bytes) -> Response {
    match WebhookPayload::parse(&body) {
        Ok(payload) => {
            for message in payload.text_messages(&state.phone_number_id) {
                info!("Received WhatsApp message from {}", message.phone);
                state.dispatcher.submit(message);
            }
        }
        Err(e) => warn!("Ignoring webhook delivery: {}", e),
    }

    Json(json!({ "status": "ok" })).into_response()
}

/// Handle keyword poll requests
async fn handle_quick_poll(
    State(state): State<Arc<WebhookState>>,
    Json(request): Json<QuickPollRequest>,
) -> Response {
    if !is_valid_phone(&request.phone) {
        warn!("Quick poll with invalid phone {:?}", request.phone);
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": "invalid_phone" })),
        )
            .into_response();
    }

    let handler = state.dispatcher.handler();

    match handler.handle_quick_poll(&request.phone, &request.text).await {
        Ok(reply) => Json(json!({ "respuesta": reply })).into_response(),
        Err(e) => {
            error!("Quick poll failed for {}: {}", request.phone, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error" })),
            )
                .into_response()
        }
    }
}

async fn handle_metrics(State(state): State<Arc<WebhookState>>, headers: HeaderMap) -> Response {
    if !validate_api_key(bearer_token(&headers), state.metrics_key.as_deref()) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "status": "unauthorized" })),
        )
            .into_response();
    }

    match state.dispatcher.handler().repository().metrics().await {
        Ok(report) => Json(report).into_response(),
        Err(e) => {
            error!("Failed to compute metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error" })),
            )
                .into_response()
        }
    }
}

async fn handle_health(State(state): State<Arc<WebhookState>>) -> Response {
    Json(json!({
        "status": "healthy",
        "dispatch": state.dispatcher.stats(),
    }))
    .into_response()
}
