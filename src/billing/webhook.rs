//! Stripe webhook envelope, signature check and the payload shapes we mirror.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed timestamp, in seconds.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Webhook secret is not configured")]
    MissingSecret,
    #[error("Missing Stripe-Signature header")]
    MissingSignature,
    #[error("Malformed Stripe-Signature header: {0}")]
    MalformedHeader(String),
    #[error("Signature timestamp is outside the tolerance window")]
    Expired,
    #[error("No signature matches the payload")]
    SignatureMismatch,
    #[error("Invalid event payload: {0}")]
    InvalidPayload(String),
    #[error("Handler for {event} failed: {message}")]
    HandlerFailed { event: String, message: String },
}

/// Checks a `t=..,v1=..` header against the raw body. Any one matching
/// `v1` entry is enough; other schemes are ignored.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
    tolerance_secs: i64,
) -> Result<(), WebhookError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        let (key, value) = part
            .trim()
            .split_once('=')
            .ok_or_else(|| WebhookError::MalformedHeader(part.to_string()))?;
        match key {
            "t" => timestamp = Some(value),
            "v1" => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| WebhookError::MalformedHeader("no timestamp".into()))?;
    let issued: i64 = timestamp
        .parse()
        .map_err(|_| WebhookError::MalformedHeader(format!("bad timestamp '{}'", timestamp)))?;
    if signatures.is_empty() {
        return Err(WebhookError::MalformedHeader("no v1 signature".into()));
    }
    let within_window = now
        .checked_sub(issued)
        .map(i64::unsigned_abs)
        .is_some_and(|age| age <= tolerance_secs.unsigned_abs());
    if !within_window {
        return Err(WebhookError::Expired);
    }

    let mac = signed_payload_mac(payload, timestamp, secret)?;
    for signature in signatures {
        let Ok(expected) = hex::decode(signature) else {
            continue;
        };
        // verify_slice compares in constant time
        if mac.clone().verify_slice(&expected).is_ok() {
            return Ok(());
        }
    }
    Err(WebhookError::SignatureMismatch)
}

/// Builds a header Stripe would send for `payload` at `timestamp`.
pub fn signature_header(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, WebhookError> {
    let mac = signed_payload_mac(payload, &timestamp.to_string(), secret)?;
    Ok(format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    ))
}

fn signed_payload_mac(payload: &[u8], timestamp: &str, secret: &str) -> Result<HmacSha256, WebhookError> {
    if secret.is_empty() {
        return Err(WebhookError::MissingSecret);
    }
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| WebhookError::MalformedHeader(e.to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

impl WebhookEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, WebhookError> {
        serde_json::from_slice(payload).map_err(|e| WebhookError::InvalidPayload(e.to_string()))
    }

    pub fn object<T: serde::de::DeserializeOwned>(&self) -> Result<T, WebhookError> {
        serde_json::from_value(self.data.object.clone()).map_err(|e| {
            WebhookError::InvalidPayload(format!("{} object: {}", self.event_type, e))
        })
    }
}

/// Event types that are mirrored locally. Anything else is acknowledged and
/// ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelevantEvent {
    ProductCreated,
    ProductUpdated,
    ProductDeleted,
    PriceCreated,
    PriceUpdated,
    PriceDeleted,
    CheckoutSessionCompleted,
    SubscriptionCreated,
    SubscriptionUpdated,
    SubscriptionDeleted,
}

impl RelevantEvent {
    pub const ALL: [RelevantEvent; 10] = [
        RelevantEvent::ProductCreated,
        RelevantEvent::ProductUpdated,
        RelevantEvent::ProductDeleted,
        RelevantEvent::PriceCreated,
        RelevantEvent::PriceUpdated,
        RelevantEvent::PriceDeleted,
        RelevantEvent::CheckoutSessionCompleted,
        RelevantEvent::SubscriptionCreated,
        RelevantEvent::SubscriptionUpdated,
        RelevantEvent::SubscriptionDeleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelevantEvent::ProductCreated => "product.created",
            RelevantEvent::ProductUpdated => "product.updated",
            RelevantEvent::ProductDeleted => "product.deleted",
            RelevantEvent::PriceCreated => "price.created",
            RelevantEvent::PriceUpdated => "price.updated",
            RelevantEvent::PriceDeleted => "price.deleted",
            RelevantEvent::CheckoutSessionCompleted => "checkout.session.completed",
            RelevantEvent::SubscriptionCreated => "customer.subscription.created",
            RelevantEvent::SubscriptionUpdated => "customer.subscription.updated",
            RelevantEvent::SubscriptionDeleted => "customer.subscription.deleted",
        }
    }

    pub fn parse(event_type: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.as_str() == event_type)
    }
}

// Stripe object shapes. Only the fields that are mirrored are declared.

#[derive(Debug, Clone, Deserialize)]
pub struct StripeProduct {
    pub id: String,
    #[serde(default)]
    pub active: bool,
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeRecurring {
    pub interval: Option<String>,
    pub interval_count: Option<i64>,
    pub trial_period_days: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePrice {
    pub id: String,
    pub product: String,
    #[serde(default)]
    pub active: bool,
    pub nickname: Option<String>,
    pub unit_amount: Option<i64>,
    pub currency: Option<String>,
    #[serde(rename = "type")]
    pub price_type: Option<String>,
    pub recurring: Option<StripeRecurring>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemPrice {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItem {
    pub price: ItemPrice,
    pub quantity: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionItems {
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

/// Timestamps are seconds, as Stripe sends them.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: String,
    pub status: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub items: SubscriptionItems,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    pub created: Option<i64>,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub ended_at: Option<i64>,
    pub cancel_at: Option<i64>,
    pub canceled_at: Option<i64>,
    pub trial_start: Option<i64>,
    pub trial_end: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub mode: Option<String>,
    pub customer: Option<String>,
    pub client_reference_id: Option<String>,
    pub subscription: Option<String>,
}
