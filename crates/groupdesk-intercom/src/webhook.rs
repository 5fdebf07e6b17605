// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound webhook server for Intercom notifications.
//!
//! Verifies the `X-Hub-Signature` header, keeps admin replies only, and
//! publishes them as [`BridgeEvent::Message`] on the router channel.

use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use groupdesk_core::error::RelayError;
use groupdesk_core::types::{
    Attachment, AttachmentKind, BridgeEvent, EventSender, Message, Platform, Sender,
};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::types::{ConversationPart, Notification, PartAttachment, attribute_string};

/// Topic Intercom sends when a teammate replies in a conversation.
pub const ADMIN_REPLIED: &str = "conversation.admin.replied";

/// Header carrying `sha1=<hex>` of the raw request body.
pub const SIGNATURE_HEADER: &str = "x-hub-signature";

/// Wrap width for rendered reply bodies; wide enough that chat text is
/// never wrapped.
const TEXT_WIDTH: usize = 4096;

/// Renders the Prometheus exposition text for `GET /metrics`.
pub type MetricsRender = Arc<dyn Fn() -> String + Send + Sync>;

/// Shared state for the webhook handlers.
#[derive(Clone)]
pub struct WebhookState {
    /// Router channel.
    pub events: EventSender,
    /// App client secret. Signatures are not checked when unset.
    pub client_secret: Option<String>,
    pub metrics: Option<MetricsRender>,
}

/// Builds the webhook router:
/// - POST /webhooks/intercom
/// - GET /health
/// - GET /metrics (only when a renderer is configured)
pub fn router(state: WebhookState) -> Router {
    let mut app = Router::new()
        .route("/webhooks/intercom", post(receive_notification))
        .route("/health", get(health));
    if state.metrics.is_some() {
        app = app.route("/metrics", get(metrics));
    }
    app.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Binds `host:port` and serves the webhook router until `cancel` fires.
pub async fn serve(
    host: &str,
    port: u16,
    state: WebhookState,
    cancel: CancellationToken,
) -> Result<(), RelayError> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| RelayError::Platform {
            platform: Platform::Intercom,
            message: format!("failed to bind webhook server to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    info!("webhook server listening on {addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| RelayError::Platform {
            platform: Platform::Intercom,
            message: format!("webhook server error: {e}"),
            source: Some(Box::new(e)),
        })
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn metrics(State(state): State<WebhookState>) -> impl IntoResponse {
    match state.metrics {
        Some(render) => (StatusCode::OK, render()),
        None => (StatusCode::NOT_FOUND, String::new()),
    }
}

/// Intercom retries non-2xx deliveries, so ignored notifications still get
/// 200. Only bad signatures and unparseable bodies are rejected.
async fn receive_notification(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if let Some(secret) = state.client_secret.as_deref() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if let Err(reason) = verify_signature(&body, signature, secret) {
            warn!(reason, "rejecting webhook with invalid signature");
            return StatusCode::UNAUTHORIZED;
        }
    }

    let notification: Notification = match serde_json::from_slice(&body) {
        Ok(n) => n,
        Err(e) => {
            warn!(error = %e, "malformed webhook payload");
            return StatusCode::BAD_REQUEST;
        }
    };

    let Some(message) = to_message(&notification) else {
        debug!(topic = %notification.topic, "ignoring webhook notification");
        return StatusCode::OK;
    };

    if state.events.send(BridgeEvent::Message(message)).await.is_err() {
        warn!("event channel closed, dropping webhook message");
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::OK
}

/// Checks a `sha1=<hex>` signature against the HMAC-SHA1 of `payload`.
pub fn verify_signature(payload: &[u8], header: &str, secret: &str) -> Result<(), &'static str> {
    let digest_hex = header
        .trim()
        .strip_prefix("sha1=")
        .ok_or("signature must use sha1=<hex> format")?;
    let expected = hex::decode(digest_hex).map_err(|_| "signature is not valid hex")?;
    let mut mac =
        Hmac::<Sha1>::new_from_slice(secret.as_bytes()).map_err(|_| "invalid signing key")?;
    mac.update(payload);
    mac.verify_slice(&expected)
        .map_err(|_| "signature verification failed")
}

/// Converts an admin-reply notification into a relay message.
///
/// Returns `None` for other topics, for parts not authored by a human
/// teammate, and for replies with neither text nor attachments.
pub fn to_message(notification: &Notification) -> Option<Message> {
    if notification.topic != ADMIN_REPLIED {
        return None;
    }
    let conversation = &notification.data.as_ref()?.item;
    let part = conversation
        .conversation_parts
        .as_ref()?
        .conversation_parts
        .iter()
        .rev()
        .find(|p| is_admin_comment(p))?;

    let text = part.body.as_deref().map(html_to_text).unwrap_or_default();
    let attachments: Vec<Attachment> = part.attachments.iter().map(to_attachment).collect();
    if text.is_empty() && attachments.is_empty() {
        return None;
    }

    let timestamp = part
        .created_at
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now);

    Some(Message {
        id: part.id.clone(),
        text,
        sender: Sender {
            id: part.author.id.clone().unwrap_or_default(),
            platform: Platform::Intercom,
            display_name: part.author.name.clone().unwrap_or_else(|| "Support".into()),
            handle: None,
        },
        group_id: attribute_string(&conversation.custom_attributes, "group_id"),
        group_name: attribute_string(&conversation.custom_attributes, "group_name"),
        conversation_id: Some(conversation.id.clone()),
        attachments,
        timestamp,
    })
}

/// Human teammate comments only. Bot and operator parts have author type
/// `bot`; notes and assignments have other part types.
fn is_admin_comment(part: &ConversationPart) -> bool {
    part.author.kind == "admin" && part.part_type.as_deref().is_none_or(|t| t == "comment")
}

fn to_attachment(attachment: &PartAttachment) -> Attachment {
    let content_type = attachment.content_type.as_deref().unwrap_or_default();
    let kind = match content_type.split('/').next().unwrap_or_default() {
        "image" => AttachmentKind::Image,
        "audio" => AttachmentKind::Audio,
        "video" => AttachmentKind::Video,
        _ => AttachmentKind::Document,
    };
    Attachment {
        kind,
        url: attachment.url.clone(),
        name: attachment.name.clone(),
    }
}

/// Renders an Intercom HTML body as plain text.
pub fn html_to_text(html: &str) -> String {
    match html2text::from_read(html.as_bytes(), TEXT_WIDTH) {
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            warn!(error = %e, "failed to render HTML body, relaying raw markup");
            html.trim().to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, payload: &[u8]) -> String {
        let mut mac = Hmac::<Sha1>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(payload);
        format!("sha1={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn notification(author_type: &str, body: &str) -> Notification {
        serde_json::from_value(serde_json::json!({
            "type": "notification_event",
            "topic": ADMIN_REPLIED,
            "data": {
                "item": {
                    "type": "conversation",
                    "id": "conv-9",
                    "custom_attributes": {"group_id": "-100123", "group_name": "Acme Ops"},
                    "conversation_parts": {
                        "conversation_parts": [{
                            "id": "part-1",
                            "part_type": "comment",
                            "body": body,
                            "created_at": 1700000000,
                            "author": {"type": author_type, "id": "7", "name": "Sam"},
                            "attachments": [],
                        }],
                    },
                },
            },
        }))
        .unwrap()
    }

    #[test]
    fn valid_signature_passes() {
        let payload = br#"{"topic":"ping"}"#;
        let header = sign("s3cret", payload);
        assert!(verify_signature(payload, &header, "s3cret").is_ok());
    }

    #[test]
    fn tampered_payload_fails() {
        let header = sign("s3cret", b"original");
        assert!(verify_signature(b"tampered", &header, "s3cret").is_err());
    }

    #[test]
    fn malformed_signature_header_fails() {
        assert!(verify_signature(b"x", "sha256=abcd", "s").is_err());
        assert!(verify_signature(b"x", "sha1=zz", "s").is_err());
        assert!(verify_signature(b"x", "", "s").is_err());
    }

    #[test]
    fn admin_reply_becomes_message() {
        let msg = to_message(&notification("admin", "<p>Restart the router</p>")).unwrap();
        assert_eq!(msg.id, "part-1");
        assert_eq!(msg.text, "Restart the router");
        assert_eq!(msg.conversation_id.as_deref(), Some("conv-9"));
        assert_eq!(msg.group_id.as_deref(), Some("-100123"));
        assert_eq!(msg.sender.platform, Platform::Intercom);
        assert_eq!(msg.sender.display_name, "Sam");
        assert_eq!(msg.timestamp.timestamp(), 1700000000);
    }

    #[test]
    fn bot_replies_are_ignored() {
        assert!(to_message(&notification("bot", "<p>Automated answer</p>")).is_none());
    }

    #[test]
    fn other_topics_are_ignored() {
        let mut n = notification("admin", "<p>hi</p>");
        n.topic = "conversation.user.replied".into();
        assert!(to_message(&n).is_none());
    }

    #[test]
    fn empty_reply_is_ignored() {
        assert!(to_message(&notification("admin", "<p></p>")).is_none());
    }

    #[test]
    fn attachments_are_classified_by_content_type() {
        let n: Notification = serde_json::from_value(serde_json::json!({
            "topic": ADMIN_REPLIED,
            "data": {"item": {
                "id": "conv-1",
                "conversation_parts": {"conversation_parts": [{
                    "id": "p",
                    "author": {"type": "admin", "id": "1"},
                    "attachments": [
                        {"url": "https://files.test/a.png", "name": "a.png", "content_type": "image/png"},
                        {"url": "https://files.test/b.pdf", "name": "b.pdf", "content_type": "application/pdf"},
                    ],
                }]},
            }},
        }))
        .unwrap();

        let msg = to_message(&n).unwrap();
        assert!(msg.text.is_empty());
        assert_eq!(msg.attachments.len(), 2);
        assert_eq!(msg.attachments[0].kind, AttachmentKind::Image);
        assert_eq!(msg.attachments[1].kind, AttachmentKind::Document);
        assert!(msg.group_id.is_none());
    }
}
