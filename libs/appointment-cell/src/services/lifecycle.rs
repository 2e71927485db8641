use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use shared_payments::StripeClient;

use crate::models::{
    Appointment, AppointmentError, AppointmentListQuery, AppointmentState, AppointmentType,
    CreateAppointmentRequest,
};
use crate::services::validation::BookingValidator;

/// Direct creation (offline path), cancellation with conditional refund, and
/// ownership-scoped read access.
pub struct AppointmentLifecycleService {
    supabase: SupabaseClient,
    config: AppConfig,
}

impl AppointmentLifecycleService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            config: config.clone(),
        }
    }

    pub async fn list_appointments(
        &self,
        user: &User,
        query: AppointmentListQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        // Non-admins see their own appointments regardless of any filter.
        let path = if user.is_admin() {
            match query.patient_id {
                Some(patient_id) => format!(
                    "/rest/v1/appointments?patient_id=eq.{}&order=created_at.desc",
                    patient_id
                ),
                None => "/rest/v1/appointments?order=created_at.desc".to_string(),
            }
        } else {
            format!(
                "/rest/v1/appointments?patient_id=eq.{}&order=created_at.desc",
                user.id
            )
        };

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| AppointmentError::Database(e.to_string()))
            })
            .collect()
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(AppointmentError::NotFound)?;

        let appointment: Appointment =
            serde_json::from_value(row).map_err(|e| AppointmentError::Database(e.to_string()))?;

        if !user.is_admin() && appointment.patient_id.to_string() != user.id {
            return Err(AppointmentError::Unauthorized);
        }

        Ok(appointment)
    }

    /// Offline consultations are considered to start immediately upon
    /// booking, so the row is written directly in Running status with no
    /// payment gate.
    pub async fn create_offline(
        &self,
        user: &User,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        if request.appointment_type == AppointmentType::Online {
            return Err(AppointmentError::InvalidRequest(
                "Use the online checkout endpoint for online payments".to_string(),
            ));
        }

        let patient_id: Uuid = user
            .id
            .parse()
            .map_err(|_| AppointmentError::Unauthorized)?;

        let validator = BookingValidator::new(&self.supabase);
        validator
            .validate_booking(
                request.doctor_id,
                request.time_id,
                &request.symptom,
                Some(auth_token),
            )
            .await?;

        let (status, payment, cancel) = AppointmentState::offline_created().into_parts();

        let appointment_data = json!({
            "patient_id": patient_id,
            "doctor_id": request.doctor_id,
            "time_id": request.time_id,
            "appointment_type": AppointmentType::Offline,
            "appointment_status": status,
            "payment_status": payment,
            "stripe_session_id": null,
            "payment_intent_id": null,
            "symptom": request.symptom,
            "cancel": cancel,
            "created_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(appointment_data),
                Some(headers),
            )
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::Database("Insert returned no row".to_string()))?;

        let appointment: Appointment =
            serde_json::from_value(row).map_err(|e| AppointmentError::Database(e.to_string()))?;

        info!(
            "Offline appointment {} booked by patient {}",
            appointment.id, patient_id
        );

        Ok(appointment)
    }

    /// Cancellation with refund-before-commit: if a refund is owed and the
    /// provider rejects it, the appointment is left untouched and the error
    /// surfaces to the caller.
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(appointment_id, user, auth_token).await?;

        if !appointment.can_cancel(Utc::now()) {
            return Err(AppointmentError::CancellationNotAllowed);
        }

        let refund_issued = match appointment.refund_intent() {
            Some(payment_intent) => {
                let stripe = StripeClient::new(&self.config)
                    .map_err(|e| AppointmentError::PaymentProvider(e.to_string()))?;

                let refund = stripe.create_refund(payment_intent).await.map_err(|e| {
                    error!(
                        "Refund failed for appointment {} (intent {}): {}",
                        appointment.id, payment_intent, e
                    );
                    AppointmentError::PaymentProvider(e.to_string())
                })?;

                info!(
                    "Refund {} issued for appointment {} ({})",
                    refund.id, appointment.id, refund.status
                );
                true
            }
            None => false,
        };

        let state = appointment
            .state()
            .ok_or_else(|| AppointmentError::Database("Inconsistent appointment state".to_string()))?;
        let (status, payment, cancel) = state
            .cancelled(refund_issued)
            .ok_or(AppointmentError::CancellationNotAllowed)?
            .into_parts();

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(json!({
                    "appointment_status": status,
                    "payment_status": payment,
                    "cancel": cancel
                })),
                Some(headers),
            )
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::Database("Update returned no row".to_string()))?;

        let updated: Appointment =
            serde_json::from_value(row).map_err(|e| AppointmentError::Database(e.to_string()))?;

        info!("Appointment {} cancelled", updated.id);

        Ok(updated)
    }
}
