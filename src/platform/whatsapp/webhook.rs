//! WhatsApp webhook handling.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::platform::whatsapp::types::{WaMessage, WebhookPayload};
use crate::platform::{MessageKind, ReplySender};
use crate::relay::Relay;

pub const VERIFICATION_FAILED: &str = "Verification failed";

/// Sent instead of the model's answer when the backend call fails.
pub const FALLBACK_REPLY: &str = "Sorry, I encountered an error while processing your request.";

#[derive(Clone)]
pub struct WebhookState {
    pub verify_token: Arc<str>,
    pub relay: Arc<Relay>,
    pub sender: Arc<dyn ReplySender>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Acknowledgement body for `POST /webhook`. Always sent with HTTP 200.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WebhookStatus {
    #[serde(rename = "ok")]
    Ok,
    #[serde(rename = "no entry")]
    NoEntry,
    #[serde(rename = "error")]
    Error,
}

#[derive(Debug, Serialize)]
pub struct StatusBody {
    pub status: WebhookStatus,
}

impl VerifyParams {
    /// Meta registers the webhook with `hub.mode=subscribe` and the token we
    /// configured; anything else is refused. A missing `hub.challenge` does
    /// not fail the handshake, it is echoed back as an empty body.
    pub fn is_subscription_for(&self, verify_token: &str) -> bool {
        self.mode.as_deref() == Some("subscribe")
            && self.verify_token.as_deref() == Some(verify_token)
    }
}

pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook", get(verify).post(receive))
        .with_state(state)
}

async fn verify(
    State(state): State<WebhookState>,
    Query(params): Query<VerifyParams>,
) -> (StatusCode, String) {
    if params.is_subscription_for(&state.verify_token) {
        info!("Webhook verified successfully");
        return (StatusCode::OK, params.challenge.unwrap_or_default());
    }

    warn!(
        "Webhook verification failed (mode: {:?})",
        params.mode.as_deref()
    );
    (StatusCode::FORBIDDEN, VERIFICATION_FAILED.to_string())
}

async fn receive(State(state): State<WebhookState>, body: Bytes) -> Json<StatusBody> {
    let status = match parse_payload(&body) {
        Ok(Some(payload)) => {
            process_payload(&state, payload).await;
            WebhookStatus::Ok
        }
        Ok(None) => WebhookStatus::NoEntry,
        Err(e) => {
            error!("Webhook processing error: {:#}", e);
            WebhookStatus::Error
        }
    };
    Json(StatusBody { status })
}

/// `Ok(None)` when the body has no `entry` field.
fn parse_payload(body: &[u8]) -> anyhow::Result<Option<WebhookPayload>> {
    let raw: serde_json::Value = serde_json::from_slice(body)?;
    debug!("Webhook received: {}", raw);
    Ok(WebhookPayload::from_json(&raw)?)
}

/// Walk entry → changes → value → messages, relaying each text message in order.
pub async fn process_payload(state: &WebhookState, payload: WebhookPayload) {
    for entry in payload.entry {
        for change in entry.changes {
            let messages = match change.value.messages {
                Some(messages) => messages,
                None => continue,
            };
            for raw in &messages {
                match WaMessage::from_json(raw) {
                    Ok(message) => handle_message(state, &message).await,
                    Err(e) => warn!("Unreadable message ({}), ignoring: {}", e, raw),
                }
            }
        }
    }
}

async fn handle_message(state: &WebhookState, message: &WaMessage) {
    let incoming = match message.to_incoming() {
        Ok(incoming) => incoming,
        Err(reason) => {
            warn!("Malformed text message ({:?}), ignoring", reason);
            return;
        }
    };

    if incoming.kind == MessageKind::Other {
        info!(
            "Non-text message ({}) received, ignoring",
            message.message_type.as_deref().unwrap_or("unknown")
        );
    } else {
        info!("Message from {}: {}", incoming.sender, incoming.text);
    }

    let reply = match state
        .relay
        .respond(&incoming, |_| FALLBACK_REPLY.to_string())
        .await
    {
        Some(reply) => reply,
        None => return,
    };

    info!("Reply to {}: {}", reply.recipient, reply.text);

    if let Err(e) = state.sender.send(&reply).await {
        warn!("Send message error for {}: {:#}", reply.recipient, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::OutboundMessage;
    use crate::relay::tests::FakeBackend;
    use anyhow::Result;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use std::sync::Mutex;
    use tower::util::ServiceExt;

    struct RecordingSender {
        fail: bool,
        sent: Mutex<Vec<OutboundMessage>>,
    }

    impl RecordingSender {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                fail,
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<OutboundMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReplySender for RecordingSender {
        async fn send(&self, message: &OutboundMessage) -> Result<()> {
            self.sent.lock().unwrap().push(message.clone());
            if self.fail {
                anyhow::bail!("WhatsApp API error (500 Internal Server Error)");
            }
            Ok(())
        }
    }

    fn app(backend: Arc<FakeBackend>, sender: Arc<RecordingSender>) -> Router {
        router(WebhookState {
            verify_token: Arc::from("secret"),
            relay: Arc::new(Relay::new(backend, Some("persona"))),
            sender,
        })
    }

    fn text_message(from: &str, body: &str) -> serde_json::Value {
        json!({ "from": from, "type": "text", "text": { "body": body } })
    }

    fn payload(messages: Vec<serde_json::Value>) -> serde_json::Value {
        json!({ "entry": [{ "changes": [{ "value": { "messages": messages } }] }] })
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn post(app: Router, body: impl Into<Body>) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_subscription_requires_mode_and_token() {
        let params = VerifyParams {
            mode: Some("subscribe".into()),
            verify_token: Some("secret".into()),
            challenge: None,
        };
        assert!(params.is_subscription_for("secret"));
        assert!(!params.is_subscription_for("other"));
        assert!(!VerifyParams::default().is_subscription_for("secret"));
    }

    #[tokio::test]
    async fn test_get_echoes_challenge() {
        let app = app(FakeBackend::replying("x"), RecordingSender::new(false));
        let (status, body) = get(
            app,
            "/webhook?hub.mode=subscribe&hub.verify_token=secret&hub.challenge=1158201444",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "1158201444");
    }

    #[tokio::test]
    async fn test_get_wrong_token_is_forbidden() {
        let app = app(FakeBackend::replying("x"), RecordingSender::new(false));
        let (status, body) = get(
            app,
            "/webhook?hub.mode=subscribe&hub.verify_token=guess&hub.challenge=X",
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, VERIFICATION_FAILED);
    }

    #[tokio::test]
    async fn test_get_wrong_mode_is_forbidden() {
        let app = app(FakeBackend::replying("x"), RecordingSender::new(false));
        let (status, body) = get(
            app,
            "/webhook?hub.mode=unsubscribe&hub.verify_token=secret&hub.challenge=X",
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, VERIFICATION_FAILED);
    }

    #[tokio::test]
    async fn test_get_without_challenge_echoes_empty_body() {
        let app = app(FakeBackend::replying("x"), RecordingSender::new(false));
        let (status, body) = get(app, "/webhook?hub.mode=subscribe&hub.verify_token=secret").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "");
    }

    #[tokio::test]
    async fn test_get_without_params_is_forbidden() {
        let app = app(FakeBackend::replying("x"), RecordingSender::new(false));
        let (status, _) = get(app, "/webhook").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_post_without_entry() {
        let backend = FakeBackend::replying("hello");
        let sender = RecordingSender::new(false);
        let app = app(backend.clone(), sender.clone());

        let (status, body) = post(app, json!({ "object": "whatsapp_business_account" }).to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "no entry" }));
        assert_eq!(backend.calls(), 0);
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_post_text_message_relays_reply() {
        let backend = FakeBackend::replying("hello");
        let sender = RecordingSender::new(false);
        let app = app(backend.clone(), sender.clone());

        let (status, body) = post(app, payload(vec![text_message("123", "hi")]).to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));

        assert_eq!(
            sender.sent(),
            vec![OutboundMessage {
                recipient: "123".to_string(),
                text: "hello".to_string(),
            }]
        );
        let requests = backend.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].prompt, "hi");
        assert_eq!(requests[0].system.as_deref(), Some("persona"));
    }

    #[tokio::test]
    async fn test_post_non_text_message_sends_nothing() {
        let backend = FakeBackend::replying("hello");
        let sender = RecordingSender::new(false);
        let app = app(backend.clone(), sender.clone());

        let image = json!({ "from": "123", "type": "image", "image": { "id": "m1" } });
        let (status, body) = post(app, payload(vec![image]).to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
        assert_eq!(backend.calls(), 0);
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_post_status_update_is_skipped() {
        let backend = FakeBackend::replying("hello");
        let sender = RecordingSender::new(false);
        let app = app(backend.clone(), sender.clone());

        let receipt = json!({
            "entry": [{
                "changes": [{ "value": { "statuses": [{ "status": "read" }] } }]
            }]
        });
        let (_, body) = post(app, receipt.to_string()).await;
        assert_eq!(body, json!({ "status": "ok" }));
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_post_backend_failure_sends_fallback() {
        let sender = RecordingSender::new(false);
        let app = app(FakeBackend::failing(), sender.clone());

        let (_, body) = post(app, payload(vec![text_message("77", "hi")]).to_string()).await;
        assert_eq!(body, json!({ "status": "ok" }));

        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "77");
        assert_eq!(sent[0].text, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_post_send_failure_still_ok() {
        let sender = RecordingSender::new(true);
        let app = app(FakeBackend::replying("hello"), sender.clone());

        let (status, body) = post(app, payload(vec![text_message("123", "hi")]).to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
        assert_eq!(sender.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_post_multiple_messages_in_order() {
        let backend = FakeBackend::replying("pong");
        let sender = RecordingSender::new(false);
        let app = app(backend.clone(), sender.clone());

        let messages = vec![
            text_message("1", "a"),
            json!({ "from": "2", "type": "sticker" }),
            text_message("3", "c"),
        ];
        post(app, payload(messages).to_string()).await;

        let recipients: Vec<String> = sender.sent().into_iter().map(|m| m.recipient).collect();
        assert_eq!(recipients, vec!["1", "3"]);
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn test_post_odd_message_does_not_block_siblings() {
        let backend = FakeBackend::replying("hello");
        let sender = RecordingSender::new(false);
        let app = app(backend.clone(), sender.clone());

        let messages = vec![
            text_message("1", "hi"),
            json!({ "from": "2", "type": 7 }),
            json!({ "from": "3", "type": "text", "text": "oops" }),
        ];
        let (status, body) = post(app, payload(messages).to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
        assert_eq!(
            sender.sent(),
            vec![OutboundMessage {
                recipient: "1".to_string(),
                text: "hello".to_string(),
            }]
        );
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_post_null_entry_reports_error() {
        let sender = RecordingSender::new(false);
        let app = app(FakeBackend::replying("hello"), sender.clone());

        let (status, body) = post(app, json!({ "entry": null }).to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "error" }));
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_post_invalid_json_reports_error() {
        let sender = RecordingSender::new(false);
        let app = app(FakeBackend::replying("hello"), sender.clone());

        let (status, body) = post(app, "not json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "error" }));
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_post_unexpected_shape_reports_error() {
        let app = app(FakeBackend::replying("hello"), RecordingSender::new(false));

        let (status, body) = post(app, json!({ "entry": "oops" }).to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "error" }));
    }
}
