use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Extension, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use linkbot_core::{SIGNATURE_HEADER, WebhookError, parse_request};
use linkbot_telemetry::{record_delivery, start_delivery_span};
use serde_json::{Value, json};
use tracing::{Instrument, info, warn};

use crate::request_id::{RequestId, with_request_id};
use crate::router::EventRouter;

/// Upper bound on a webhook body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

pub const LIVENESS_BODY: &str = "hello world";

#[derive(Clone)]
pub struct AppState {
    pub channel_secret: Arc<str>,
    pub router: Arc<EventRouter>,
}

#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error(transparent)]
    Webhook(#[from] WebhookError),
}

impl CallbackError {
    pub fn status(&self) -> StatusCode {
        match self {
            CallbackError::Webhook(WebhookError::InvalidSignature) => StatusCode::BAD_REQUEST,
            CallbackError::Webhook(WebhookError::MalformedRequest(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn label(&self) -> &'static str {
        match self {
            CallbackError::Webhook(WebhookError::InvalidSignature) => "invalid_signature",
            CallbackError::Webhook(WebhookError::MalformedRequest(_)) => "malformed",
        }
    }
}

impl IntoResponse for CallbackError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "error": self.label() }));
        (status, body).into_response()
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/callback", post(callback))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn(with_request_id))
        .with_state(state)
}

async fn liveness() -> &'static str {
    LIVENESS_BODY
}

async fn callback(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, CallbackError> {
    let request_id = request_id
        .map(|Extension(RequestId(id))| id)
        .unwrap_or_else(|| "n/a".into());
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let request = parse_request(&state.channel_secret, signature, &body).map_err(|err| {
        let err = CallbackError::from(err);
        record_delivery(err.label());
        warn!(request_id = %request_id, error = %err, "webhook delivery rejected");
        err
    })?;

    let span = start_delivery_span(
        &request_id,
        request.destination.as_deref(),
        request.events.len(),
    );
    async {
        info!("handling webhook delivery");
        state.router.handle_batch(&request.events).await;
    }
    .instrument(span)
    .await;

    record_delivery("accepted");
    Ok(Json(json!({ "ok": true })))
}
