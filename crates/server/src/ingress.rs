//! HTTP adapter in front of [`QueueGateway`].
//!
//! Decodes the raw body, hands the request to the gateway and maps its
//! answer (or failure) onto an axum response. An undecodable body is only
//! reported as such once the signature checks out.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use beacon_core::{decode_body, ApplicationError, Headers, InboundRequest, InterfaceError};
use beacon_queue::{GatewayError, GatewayResponse, QueueGateway, ResponseBody};
use serde_json::json;
use tracing::{error, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct IngressState {
    gateway: Arc<QueueGateway>,
}

pub fn router(gateway: Arc<QueueGateway>) -> Router {
    Router::new()
        .route("/slack/events", post(slack_events))
        .route("/", post(slack_events))
        .with_state(IngressState { gateway })
}

pub async fn slack_events(
    State(state): State<IngressState>,
    header_map: HeaderMap,
    raw_body: String,
) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    let headers = collect_headers(&header_map);

    let body = match decode_body(&headers, &raw_body) {
        Ok(body) => body,
        Err(_) if !state.gateway.is_authentic(&headers, &raw_body) => {
            return gateway_response(GatewayResponse::invalid_signature());
        }
        Err(decode_error) => {
            warn!(
                event_name = "ingress.slack.decode_failed",
                correlation_id = %correlation_id,
                error = %decode_error,
                "could not decode request body"
            );
            return interface_response(
                ApplicationError::Decode(decode_error.to_string()).into_interface(correlation_id),
            );
        }
    };

    let request = InboundRequest::new(raw_body, headers, body);
    match state.gateway.handle_request(&request).await {
        Ok(response) => gateway_response(response),
        Err(gateway_error) => {
            error!(
                event_name = "ingress.slack.failed",
                correlation_id = %correlation_id,
                error = %gateway_error,
                "could not queue slack request"
            );
            let application_error = match gateway_error {
                GatewayError::Publish(source) => ApplicationError::Queue(source.to_string()),
                GatewayError::Encode(source) => ApplicationError::Decode(source.to_string()),
            };
            interface_response(application_error.into_interface(correlation_id))
        }
    }
}

fn collect_headers(header_map: &HeaderMap) -> Headers {
    let mut headers = Headers::new();
    for (name, value) in header_map {
        if let Ok(value) = value.to_str() {
            headers.insert(name.as_str(), value);
        }
    }
    headers
}

fn gateway_response(response: GatewayResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    match response.body {
        ResponseBody::Json(body) => (status, Json(body)).into_response(),
        ResponseBody::Text(text) => (status, text).into_response(),
        ResponseBody::Empty => status.into_response(),
    }
}

fn interface_response(error: InterfaceError) -> Response {
    let status = match error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = json!({
        "error": error.user_message(),
        "correlation_id": error.correlation_id(),
    });
    (status, Json(body)).into_response()
}
