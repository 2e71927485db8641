use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{is_conflict, SupabaseClient};
use shared_payments::{
    CheckoutSessionObject, PaymentError, StripeClient, WebhookEvent, CHECKOUT_SESSION_COMPLETED,
};

use crate::models::{Appointment, AppointmentError, AppointmentState, AppointmentType};

#[derive(Debug)]
pub enum WebhookOutcome {
    /// First delivery for this session id; the appointment now exists.
    Created(Appointment),
    /// A delivery for a session id we already booked. No-op.
    Duplicate,
    /// Authentic event we don't act on (other kinds, unpaid sessions).
    Ignored,
}

/// Consumes payment-provider callbacks and transitions appointment state
/// exactly once per real-world event.
pub struct PaymentWebhookService {
    supabase: SupabaseClient,
    stripe: StripeClient,
}

impl PaymentWebhookService {
    pub fn new(config: &AppConfig) -> Result<Self, AppointmentError> {
        let stripe = StripeClient::new(config)
            .map_err(|e| AppointmentError::PaymentProvider(e.to_string()))?;

        Ok(Self {
            supabase: SupabaseClient::new(config),
            stripe,
        })
    }

    pub async fn process_event(
        &self,
        payload: &[u8],
        signature_header: Option<&str>,
    ) -> Result<WebhookOutcome, AppointmentError> {
        let signature_header = signature_header.ok_or(AppointmentError::InvalidSignature)?;

        match self.stripe.verify_webhook_signature(payload, signature_header) {
            Ok(true) => {}
            Ok(false) => return Err(AppointmentError::InvalidSignature),
            Err(PaymentError::MalformedSignatureHeader(_)) => {
                return Err(AppointmentError::InvalidSignature)
            }
            Err(e) => return Err(AppointmentError::PaymentProvider(e.to_string())),
        }

        let event: WebhookEvent = serde_json::from_slice(payload)
            .map_err(|e| AppointmentError::InvalidPayload(e.to_string()))?;

        if event.event_type != CHECKOUT_SESSION_COMPLETED {
            info!("Ignoring webhook event of type {}", event.event_type);
            return Ok(WebhookOutcome::Ignored);
        }

        let session: CheckoutSessionObject = serde_json::from_value(event.data.object)
            .map_err(|e| AppointmentError::InvalidPayload(e.to_string()))?;

        if session.payment_status != "paid" {
            info!(
                "Ignoring completed session {} with payment status {}",
                session.id, session.payment_status
            );
            return Ok(WebhookOutcome::Ignored);
        }

        // The provider may deliver the same event more than once; exactly one
        // appointment must ever exist per session id.
        if self.session_already_booked(&session.id).await? {
            info!("Idempotent webhook for session {}", session.id);
            return Ok(WebhookOutcome::Duplicate);
        }

        let (patient_id, doctor_id, time_id, symptom) = self.extract_metadata(&session)?;
        self.verify_references(patient_id, doctor_id, time_id).await?;

        self.create_confirmed_appointment(&session, patient_id, doctor_id, time_id, symptom)
            .await
    }

    async fn session_already_booked(&self, session_id: &str) -> Result<bool, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?stripe_session_id=eq.{}&select=id",
            session_id
        );
        let existing: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        Ok(!existing.is_empty())
    }

    fn extract_metadata(
        &self,
        session: &CheckoutSessionObject,
    ) -> Result<(Uuid, Uuid, Uuid, String), AppointmentError> {
        Ok((
            metadata_uuid(session, "patient_id")?,
            metadata_uuid(session, "doctor_id")?,
            metadata_uuid(session, "time_id")?,
            metadata_str(session, "symptom")?.to_string(),
        ))
    }

    /// The metadata ids are only trustworthy as far as they still resolve:
    /// the patient or doctor may have been removed between checkout and
    /// confirmation.
    async fn verify_references(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        time_id: Uuid,
    ) -> Result<(), AppointmentError> {
        let checks = [
            format!("/rest/v1/patients?id=eq.{}&select=id", patient_id),
            format!("/rest/v1/doctors?id=eq.{}&select=id", doctor_id),
            format!(
                "/rest/v1/available_times?id=eq.{}&doctor_id=eq.{}&select=id",
                time_id, doctor_id
            ),
        ];

        for path in checks {
            let rows: Vec<Value> = self
                .supabase
                .request(Method::GET, &path, None, None)
                .await
                .map_err(|e| AppointmentError::Database(e.to_string()))?;

            if rows.is_empty() {
                error!("Webhook metadata references a missing record: {}", path);
                return Err(AppointmentError::InvalidMetadata(
                    "metadata references a missing record".to_string(),
                ));
            }
        }

        Ok(())
    }

    async fn create_confirmed_appointment(
        &self,
        session: &CheckoutSessionObject,
        patient_id: Uuid,
        doctor_id: Uuid,
        time_id: Uuid,
        symptom: String,
    ) -> Result<WebhookOutcome, AppointmentError> {
        let (status, payment, cancel) = AppointmentState::online_confirmed().into_parts();

        let appointment_data = json!({
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "time_id": time_id,
            "appointment_type": AppointmentType::Online,
            "appointment_status": status,
            "payment_status": payment,
            "stripe_session_id": session.id,
            "payment_intent_id": session.payment_intent,
            "symptom": symptom,
            "cancel": cancel,
            "created_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Result<Vec<Value>, _> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                None,
                Some(appointment_data),
                Some(headers),
            )
            .await;

        let rows = match result {
            Ok(rows) => rows,
            // Two deliveries raced past the lookup; the unique constraint on
            // stripe_session_id decides, and the loser is a duplicate.
            Err(e) if is_conflict(&e) => {
                info!("Concurrent webhook for session {}, treating as duplicate", session.id);
                return Ok(WebhookOutcome::Duplicate);
            }
            Err(e) => return Err(AppointmentError::Database(e.to_string())),
        };

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::Database("Insert returned no row".to_string()))?;

        let appointment: Appointment =
            serde_json::from_value(row).map_err(|e| AppointmentError::Database(e.to_string()))?;

        info!(
            "Created appointment {} from session {}",
            appointment.id, session.id
        );

        Ok(WebhookOutcome::Created(appointment))
    }
}

fn metadata_str<'a>(
    session: &'a CheckoutSessionObject,
    key: &str,
) -> Result<&'a str, AppointmentError> {
    session
        .metadata
        .get(key)
        .and_then(|value| value.as_str())
        .ok_or_else(|| {
            error!("Missing metadata key {} in session {}", key, session.id);
            AppointmentError::InvalidMetadata(format!("missing metadata key: {}", key))
        })
}

fn metadata_uuid(session: &CheckoutSessionObject, key: &str) -> Result<Uuid, AppointmentError> {
    metadata_str(session, key)?.parse().map_err(|_| {
        error!("Malformed metadata key {} in session {}", key, session.id);
        AppointmentError::InvalidMetadata(format!("malformed metadata key: {}", key))
    })
}
