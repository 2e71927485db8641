use serde::{Deserialize, Serialize};

/// The only event kind this API acts on; every other kind is acknowledged
/// and dropped.
pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

#[derive(Debug, Clone, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment provider is not configured")]
    NotConfigured,

    #[error("Payment provider error: {message}")]
    Provider { message: String },

    #[error("Malformed signature header: {0}")]
    MalformedSignatureHeader(String),
}

/// Inputs for a hosted checkout session. `unit_amount` is in the currency's
/// minor units (a 500 BDT fee becomes 50000).
#[derive(Debug, Clone)]
pub struct CheckoutSessionParams {
    pub product_name: String,
    pub currency: String,
    pub unit_amount: u64,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: Vec<(String, String)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
    pub payment_intent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    pub id: String,
    pub status: String,
}

/// Event envelope delivered to the webhook endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

/// The `data.object` of a completed checkout session. `metadata` carries the
/// correlation ids attached at session creation.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    pub payment_status: String,
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}
