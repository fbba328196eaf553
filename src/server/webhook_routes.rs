use super::AppState;
use crate::webhook::signature::{self, SIGNATURE_HEADER};
use crate::webhook::WebhookPayload;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, instrument, warn};

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.verify_token")]
    hub_verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    hub_challenge: Option<String>,
}

pub async fn verify_webhook(
    State(state): State<AppState>,
    Query(params): Query<VerifyQuery>,
) -> Response {
    match params.hub_verify_token {
        Some(token) if token == *state.verify_token => {
            info!("Webhook verification succeeded");
            (StatusCode::OK, params.hub_challenge.unwrap_or_default()).into_response()
        }
        _ => {
            warn!("Webhook verification failed: token mismatch");
            (StatusCode::FORBIDDEN, "Invalid token").into_response()
        }
    }
}

#[instrument(name = "webhook.delivery", skip_all, fields(events = tracing::field::Empty))]
pub async fn handle_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(secret) = &state.signature_secret {
        let sig = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok());
        match sig {
            Some(sig) if signature::verify(secret, &body, sig) => {}
            Some(_) => {
                warn!("Invalid webhook signature");
                return StatusCode::UNAUTHORIZED.into_response();
            }
            None => {
                warn!("Missing X-Hub-Signature-256 header");
                return StatusCode::UNAUTHORIZED.into_response();
            }
        }
    }

    match process_delivery(&state, &body).await {
        Ok(()) => (StatusCode::OK, Json(json!({"status": "success"}))).into_response(),
        Err(message) => {
            error!("Webhook processing error: {message}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"status": "error", "message": message})),
            )
                .into_response()
        }
    }
}

/// Logs the raw delivery and runs the pipeline for every message event.
/// Per-event failures are contained; only parsing and logging errors escape.
async fn process_delivery(state: &AppState, body: &[u8]) -> Result<(), String> {
    let raw: Value = serde_json::from_slice(body).map_err(|e| e.to_string())?;
    info!("Webhook payload received");

    state
        .audit_log
        .append(&raw)
        .await
        .map_err(|e| e.to_string())?;

    let payload = WebhookPayload::from_value(raw).map_err(|e| e.to_string())?;

    let mut handled = 0usize;
    for event in payload.message_events() {
        let event = match event {
            Ok(event) if event.is_echo() => continue,
            Ok(event) => event,
            Err(e) => {
                error!("Message processing error: {e}");
                continue;
            }
        };
        match event.to_inbound() {
            Ok(message) => {
                state.pipeline.handle(&message).await;
                handled += 1;
            }
            Err(e) => error!("Message processing error: {e}"),
        }
    }
    tracing::Span::current().record("events", handled);

    Ok(())
}
