use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

use super::AppState;
use crate::billing::{
    verify_signature, EventDisposition, WebhookError, WebhookEvent, DEFAULT_TOLERANCE_SECS,
};
use crate::errors::AppError;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Stripe events. The raw body is verified before it is parsed.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let secret = state
        .webhook_secret
        .as_deref()
        .ok_or(WebhookError::MissingSecret)?;
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingSignature)?;

    verify_signature(
        &body,
        signature,
        secret,
        Utc::now().timestamp(),
        DEFAULT_TOLERANCE_SECS,
    )?;
    let event = WebhookEvent::parse(&body)?;

    let handled = match state.billing.handle_event(&event).await? {
        EventDisposition::Handled(_) => true,
        EventDisposition::Ignored => false,
    };
    Ok(Json(json!({ "received": true, "handled": handled })))
}
