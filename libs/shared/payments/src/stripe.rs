use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha256;
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::models::{CheckoutSession, CheckoutSessionParams, PaymentError, Refund};

type HmacSha256 = Hmac<Sha256>;

/// Accepted clock skew between the signature timestamp and now, in seconds.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Stripe API client: hosted checkout sessions, refunds, and webhook
/// signature verification.
pub struct StripeClient {
    client: Client,
    secret_key: String,
    webhook_secret: String,
    base_url: String,
}

impl StripeClient {
    pub fn new(config: &AppConfig) -> Result<Self, PaymentError> {
        if !config.is_payments_configured() {
            return Err(PaymentError::NotConfigured);
        }

        Ok(Self {
            client: Client::new(),
            secret_key: config.stripe_secret_key.clone(),
            webhook_secret: config.stripe_webhook_secret.clone(),
            base_url: config.stripe_api_base.clone(),
        })
    }

    /// Open a hosted checkout session.
    /// POST /v1/checkout/sessions
    pub async fn create_checkout_session(
        &self,
        params: CheckoutSessionParams,
    ) -> Result<CheckoutSession, PaymentError> {
        info!("Creating checkout session for {}", params.product_name);

        let url = format!("{}/checkout/sessions", self.base_url);

        let mut form: Vec<(String, String)> = vec![
            ("mode".to_string(), "payment".to_string()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            (
                "line_items[0][price_data][currency]".to_string(),
                params.currency,
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                params.product_name,
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                params.unit_amount.to_string(),
            ),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("success_url".to_string(), params.success_url),
            ("cancel_url".to_string(), params.cancel_url),
        ];
        for (key, value) in params.metadata {
            form.push((format!("metadata[{}]", key), value));
        }

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| PaymentError::Provider {
                message: e.to_string(),
            })?;

        let status = response.status();
        let response_text = response.text().await.map_err(|e| PaymentError::Provider {
            message: e.to_string(),
        })?;

        debug!("Checkout session response: {} - {}", status, response_text);

        if !status.is_success() {
            error!("Checkout session creation failed: {} - {}", status, response_text);
            return Err(PaymentError::Provider {
                message: format!("HTTP {}: {}", status, response_text),
            });
        }

        let session: CheckoutSession =
            serde_json::from_str(&response_text).map_err(|e| PaymentError::Provider {
                message: format!("Failed to parse checkout session response: {}", e),
            })?;

        info!("Created checkout session {}", session.id);
        Ok(session)
    }

    /// Refund a captured payment by its payment-intent id.
    /// POST /v1/refunds
    pub async fn create_refund(&self, payment_intent: &str) -> Result<Refund, PaymentError> {
        info!("Creating refund for payment intent {}", payment_intent);

        let url = format!("{}/refunds", self.base_url);
        let form = [("payment_intent", payment_intent)];

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| PaymentError::Provider {
                message: e.to_string(),
            })?;

        let status = response.status();
        let response_text = response.text().await.map_err(|e| PaymentError::Provider {
            message: e.to_string(),
        })?;

        debug!("Refund response: {} - {}", status, response_text);

        if !status.is_success() {
            error!("Refund creation failed: {} - {}", status, response_text);
            return Err(PaymentError::Provider {
                message: format!("HTTP {}: {}", status, response_text),
            });
        }

        let refund: Refund =
            serde_json::from_str(&response_text).map_err(|e| PaymentError::Provider {
                message: format!("Failed to parse refund response: {}", e),
            })?;

        info!("Created refund {} ({})", refund.id, refund.status);
        Ok(refund)
    }

    /// Verify a `Stripe-Signature` header against the raw request body.
    ///
    /// The header carries `t=<unix ts>,v1=<hex hmac>` where the MAC is
    /// HMAC-SHA256 over `"{t}.{body}"` keyed with the webhook secret.
    /// Returns Ok(false) for a well-formed header that does not verify
    /// (wrong secret, tampered body, stale timestamp); Err only when the
    /// header cannot be parsed at all.
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<bool, PaymentError> {
        let mut timestamp: Option<&str> = None;
        let mut signature: Option<&str> = None;

        for part in signature_header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = Some(value),
                Some(("v1", value)) => signature = Some(value),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or_else(|| {
            PaymentError::MalformedSignatureHeader("missing timestamp".to_string())
        })?;
        let signature = signature.ok_or_else(|| {
            PaymentError::MalformedSignatureHeader("missing v1 signature".to_string())
        })?;

        let timestamp_secs: i64 = timestamp.parse().map_err(|_| {
            PaymentError::MalformedSignatureHeader("non-numeric timestamp".to_string())
        })?;

        let now = chrono::Utc::now().timestamp();
        if (now - timestamp_secs).abs() > SIGNATURE_TOLERANCE_SECS {
            debug!("Webhook signature timestamp outside tolerance");
            return Ok(false);
        }

        let provided = match hex::decode(signature) {
            Ok(bytes) => bytes,
            Err(_) => return Ok(false),
        };

        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|_| PaymentError::MalformedSignatureHeader("bad secret".to_string()))?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);

        Ok(mac.verify_slice(&provided).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_config::AppConfig;

    const WEBHOOK_SECRET: &str = "whsec_test123secret456";

    fn test_client() -> StripeClient {
        let config = AppConfig {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            stripe_secret_key: "sk_test_xxx".to_string(),
            stripe_webhook_secret: WEBHOOK_SECRET.to_string(),
            stripe_api_base: "http://localhost:12111".to_string(),
            payment_currency: "bdt".to_string(),
            frontend_base_url: "http://localhost:5173".to_string(),
        };
        StripeClient::new(&config).expect("payments configured")
    }

    fn sign(payload: &[u8], secret: &str, timestamp: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    fn current_timestamp() -> String {
        chrono::Utc::now().timestamp().to_string()
    }

    #[test]
    fn valid_signature_accepted() {
        let client = test_client();
        let payload = b"{\"type\":\"checkout.session.completed\"}";
        let timestamp = current_timestamp();
        let header = format!("t={},v1={}", timestamp, sign(payload, WEBHOOK_SECRET, &timestamp));

        assert!(client.verify_webhook_signature(payload, &header).unwrap());
    }

    #[test]
    fn wrong_secret_rejected() {
        let client = test_client();
        let payload = b"{\"type\":\"checkout.session.completed\"}";
        let timestamp = current_timestamp();
        let header = format!("t={},v1={}", timestamp, sign(payload, "wrong_secret", &timestamp));

        assert!(!client.verify_webhook_signature(payload, &header).unwrap());
    }

    #[test]
    fn tampered_payload_rejected() {
        let client = test_client();
        let original = b"{\"type\":\"checkout.session.completed\"}";
        let tampered = b"{\"type\":\"checkout.session.completed\",\"extra\":true}";
        let timestamp = current_timestamp();
        let header = format!("t={},v1={}", timestamp, sign(original, WEBHOOK_SECRET, &timestamp));

        assert!(!client.verify_webhook_signature(tampered, &header).unwrap());
    }

    #[test]
    fn stale_timestamp_rejected() {
        let client = test_client();
        let payload = b"{}";
        let timestamp = (chrono::Utc::now().timestamp() - 600).to_string();
        let header = format!("t={},v1={}", timestamp, sign(payload, WEBHOOK_SECRET, &timestamp));

        assert!(!client.verify_webhook_signature(payload, &header).unwrap());
    }

    #[test]
    fn missing_timestamp_errors() {
        let client = test_client();
        assert!(client
            .verify_webhook_signature(b"{}", "v1=deadbeef")
            .is_err());
    }

    #[test]
    fn missing_signature_errors() {
        let client = test_client();
        assert!(client
            .verify_webhook_signature(b"{}", "t=1234567890")
            .is_err());
    }

    #[test]
    fn garbage_header_errors() {
        let client = test_client();
        assert!(client.verify_webhook_signature(b"{}", "garbage").is_err());
    }

    #[test]
    fn non_hex_signature_rejected() {
        let client = test_client();
        let timestamp = current_timestamp();
        let header = format!("t={},v1=not-hex", timestamp);

        assert!(!client.verify_webhook_signature(b"{}", &header).unwrap());
    }
}
