//! HTTP surface for the WhatsApp webhook.
//!
//! - `GET  /webhook`   subscription handshake (200 + challenge, or 403)
//! - `POST /webhook`   message deliveries (always 200 `{"status":"received"}`)
//! - `GET  /test-send` sends a fixed message to the configured test recipient
//! - `GET  /health`

use std::sync::Arc;

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{Query, State, rejection::QueryRejection},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::channels::ReplySender;
use crate::channels::whatsapp_types::SkipReason;
use crate::config::WhatsAppConfig;
use crate::pipeline::dispatcher::{DeliveryReport, InboundDispatcher};

type HmacSha256 = Hmac<Sha256>;

/// Body returned on a failed handshake.
pub const VERIFICATION_MISMATCH: &str = "Verification token mismatch";

/// Text sent by `/test-send`.
pub const TEST_MESSAGE: &str = "Test from support-relay";

const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Largest delivery body read; anything bigger is acknowledged and dropped.
pub const MAX_DELIVERY_BYTES: usize = 1024 * 1024;

// ── Subscription handshake ──────────────────────────────────────────

/// Query parameters of the subscription handshake.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookChallenge {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Outcome of the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Echo this challenge back with 200.
    Verified(String),
    Rejected,
}

/// Check a handshake against the configured verify token.
///
/// Verified iff mode is `subscribe`, the token matches and a non-empty
/// challenge is present.
pub fn verify_subscription(query: &WebhookChallenge, verify_token: &str) -> Verification {
    let mode_ok = query.mode.as_deref() == Some("subscribe");
    let token_ok = query
        .token
        .as_deref()
        .is_some_and(|token| constant_time_eq(token, verify_token));

    match query.challenge.as_deref() {
        Some(challenge) if mode_ok && token_ok && !challenge.is_empty() => {
            Verification::Verified(challenge.to_string())
        }
        _ => Verification::Rejected,
    }
}

impl IntoResponse for Verification {
    fn into_response(self) -> Response {
        let plain = [(header::CONTENT_TYPE, "text/plain; charset=utf-8")];
        match self {
            Self::Verified(challenge) => (StatusCode::OK, plain, challenge).into_response(),
            Self::Rejected => (StatusCode::FORBIDDEN, plain, VERIFICATION_MISMATCH).into_response(),
        }
    }
}

// ── Delivery signature ──────────────────────────────────────────────

/// Verify `X-Hub-Signature-256: sha256=<hex>` over the raw body.
pub fn verify_signature(body: &[u8], signature_header: &str, app_secret: &str) -> bool {
    let Some(expected) = signature_header.strip_prefix("sha256=") else {
        warn!("invalid signature header format (missing sha256= prefix)");
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(app_secret.as_bytes()) else {
        warn!("failed to create HMAC");
        return false;
    };

    mac.update(body);
    let computed = hex::encode(mac.finalize().into_bytes());

    constant_time_eq(&computed, &expected.to_ascii_lowercase())
}

/// Constant-time string comparison.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

// ── Router ──────────────────────────────────────────────────────────

/// Shared state for the webhook handlers.
#[derive(Clone)]
pub struct WebhookState {
    pub dispatcher: Arc<InboundDispatcher>,
    pub sender: Arc<dyn ReplySender>,
    pub verify_token: SecretString,
    /// When set, deliveries must carry a valid `X-Hub-Signature-256`.
    pub app_secret: Option<SecretString>,
    pub test_recipient: Option<String>,
}

impl WebhookState {
    pub fn new(
        dispatcher: Arc<InboundDispatcher>,
        sender: Arc<dyn ReplySender>,
        config: &WhatsAppConfig,
    ) -> Self {
        Self {
            dispatcher,
            sender,
            verify_token: config.verify_token.clone(),
            app_secret: config.app_secret.clone(),
            test_recipient: config.test_recipient.clone(),
        }
    }
}

/// Build the Axum router with the webhook, diagnostic and health routes.
pub fn webhook_routes(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook", get(verify_handler).post(receive_handler))
        .route("/test-send", get(test_send_handler))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "support-relay"
    }))
}

async fn verify_handler(
    State(state): State<WebhookState>,
    query: Result<Query<WebhookChallenge>, QueryRejection>,
) -> Verification {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => {
            warn!(error = %rejection, "Undecodable webhook verification query");
            return Verification::Rejected;
        }
    };

    let verification = verify_subscription(&query, state.verify_token.expose_secret());
    info!(
        mode = query.mode.as_deref().unwrap_or(""),
        has_challenge = query.challenge.is_some(),
        verified = matches!(verification, Verification::Verified(_)),
        "Webhook verification"
    );
    verification
}

async fn receive_handler(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Body,
) -> impl IntoResponse {
    let report = match read_delivery(body).await {
        Ok(body) => match signature_check(&state, &headers, &body) {
            Ok(()) => state.dispatcher.handle_body(&body).await,
            Err(reason) => {
                warn!(reason = %reason, "Dropping webhook delivery");
                DeliveryReport::Skipped(reason)
            }
        },
        Err(reason) => {
            warn!(reason = %reason, "Dropping webhook delivery");
            DeliveryReport::Skipped(reason)
        }
    };
    info!(report = report.label(), "Webhook delivery acknowledged");

    Json(serde_json::json!({ "status": "received" }))
}

/// Read the body up to `MAX_DELIVERY_BYTES`.
async fn read_delivery(body: Body) -> Result<Bytes, SkipReason> {
    axum::body::to_bytes(body, MAX_DELIVERY_BYTES)
        .await
        .map_err(|e| SkipReason::Malformed(format!("unreadable body: {e}")))
}

fn signature_check(state: &WebhookState, headers: &HeaderMap, body: &[u8]) -> Result<(), SkipReason> {
    let Some(secret) = state.app_secret.as_ref() else {
        return Ok(());
    };
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(SkipReason::BadSignature)?;
    if verify_signature(body, signature, secret.expose_secret()) {
        Ok(())
    } else {
        Err(SkipReason::BadSignature)
    }
}

async fn test_send_handler(State(state): State<WebhookState>) -> impl IntoResponse {
    let Some(recipient) = state.test_recipient.as_deref() else {
        warn!("Test send requested but no test recipient is configured");
        return Json(serde_json::json!({ "status": "test_recipient_not_configured" }));
    };

    let outcome = state.sender.send_text(recipient, TEST_MESSAGE).await;
    info!(
        to = recipient,
        transport = outcome.label(),
        status = ?outcome.status(),
        "Test message dispatched"
    );
    Json(serde_json::json!({ "status": "sent_test_message" }))
}
