use std::sync::Arc;

use beacon_core::{Headers, InboundRequest, SlackVerifier};
use beacon_slack::{events::is_truthy, CommandRegistry};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    channel::{PublishError, QueuePublisher},
    message::QueuedMessage,
};

pub const INVALID_SIGNATURE_BODY: &str = "Invalid signature";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to publish slack message: {0}")]
    Publish(#[from] PublishError),
    #[error("failed to encode queue body: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
    Empty,
}

/// What the HTTP adapter should answer Slack with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayResponse {
    pub status: u16,
    pub body: ResponseBody,
}

impl GatewayResponse {
    fn json(status: u16, body: Value) -> Self {
        Self { status, body: ResponseBody::Json(body) }
    }

    pub fn invalid_signature() -> Self {
        Self { status: 403, body: ResponseBody::Text(INVALID_SIGNATURE_BODY.to_owned()) }
    }
}

/// Verifies inbound requests, queues them, and computes the immediate ack.
pub struct QueueGateway {
    verifier: SlackVerifier,
    registry: Arc<CommandRegistry>,
    publisher: Arc<dyn QueuePublisher>,
}

impl QueueGateway {
    pub fn new(
        verifier: SlackVerifier,
        registry: Arc<CommandRegistry>,
        publisher: Arc<dyn QueuePublisher>,
    ) -> Self {
        Self { verifier, registry, publisher }
    }

    pub fn publisher(&self) -> &Arc<dyn QueuePublisher> {
        &self.publisher
    }

    /// Signature check alone, for requests whose body could not be decoded.
    pub fn is_authentic(&self, headers: &Headers, raw_body: &str) -> bool {
        self.verifier.verify(headers, raw_body.as_bytes())
    }

    pub async fn handle_request(
        &self,
        request: &InboundRequest,
    ) -> Result<GatewayResponse, GatewayError> {
        if let Some(challenge) = request.body.get("challenge").filter(|value| is_truthy(value)) {
            info!(event_name = "ingress.slack.challenge", "responding to url verification");
            return Ok(GatewayResponse::json(200, json!({ "challenge": challenge })));
        }

        if !self.verifier.verify(&request.headers, request.raw_body.as_bytes()) {
            warn!(
                event_name = "ingress.slack.bad_request",
                body = %request.body,
                "got a request with a bad signature"
            );
            return Ok(GatewayResponse::invalid_signature());
        }

        let (canonical, queue_body) = unwrap_payload(&request.body)?;
        let message = QueuedMessage::slack(queue_body);
        let message_id = message.id;
        self.publisher.publish(message).await?;

        info!(
            event_name = "ingress.slack.queued",
            message_id = %message_id,
            "queued slack message"
        );

        Ok(match self.registry.ack_message_for(&canonical) {
            Some(text) => GatewayResponse::json(200, json!({ "text": text })),
            None => GatewayResponse { status: 201, body: ResponseBody::Empty },
        })
    }
}

/// Splits a body into the value used for classification and the text queued.
///
/// Interactive payloads arrive as a form whose `payload` field holds the real
/// JSON; that string is queued verbatim. Anything else is queued as JSON.
pub fn unwrap_payload(body: &Value) -> Result<(Value, String), serde_json::Error> {
    if let Some(payload) = body.get("payload").and_then(Value::as_str) {
        if let Ok(parsed @ Value::Object(_)) = serde_json::from_str::<Value>(payload) {
            return Ok((parsed, payload.to_owned()));
        }
    }

    Ok((body.clone(), serde_json::to_string(body)?))
}
