use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use beacon_queue::QueuePublisher;
use chrono::Utc;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    publisher: Arc<dyn QueuePublisher>,
    queue_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub queue: HealthCheck,
    pub checked_at: String,
}

pub fn router(publisher: Arc<dyn QueuePublisher>, queue_name: impl Into<String>) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(HealthState { publisher, queue_name: queue_name.into() })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let queue = queue_check(&state);
    let ready = queue.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "beacon-server accepting slack requests".to_string(),
        },
        queue,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn queue_check(state: &HealthState) -> HealthCheck {
    if state.publisher.is_open() {
        HealthCheck { status: "ready", detail: format!("queue `{}` has a consumer", state.queue_name) }
    } else {
        HealthCheck {
            status: "degraded",
            detail: format!("queue `{}` consumer has stopped", state.queue_name),
        }
    }
}
