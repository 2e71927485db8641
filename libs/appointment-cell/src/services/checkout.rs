use tracing::{error, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use shared_payments::{CheckoutSessionParams, StripeClient};

use crate::models::{
    AppointmentError, AppointmentType, CheckoutSessionResponse, CreateAppointmentRequest,
};
use crate::services::validation::BookingValidator;

/// Builds hosted checkout sessions for online appointments. No appointment
/// row exists until the payment webhook confirms the session.
pub struct CheckoutService {
    supabase: SupabaseClient,
    stripe: StripeClient,
    currency: String,
    success_url: String,
    cancel_url: String,
}

impl CheckoutService {
    pub fn new(config: &AppConfig) -> Result<Self, AppointmentError> {
        let stripe = StripeClient::new(config)
            .map_err(|e| AppointmentError::PaymentProvider(e.to_string()))?;

        Ok(Self {
            supabase: SupabaseClient::new(config),
            stripe,
            currency: config.payment_currency.clone(),
            success_url: format!(
                "{}/success?session_id={{CHECKOUT_SESSION_ID}}",
                config.frontend_base_url
            ),
            cancel_url: format!("{}/cancel", config.frontend_base_url),
        })
    }

    pub async fn create_checkout(
        &self,
        user: &User,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<CheckoutSessionResponse, AppointmentError> {
        if request.appointment_type != AppointmentType::Online {
            return Err(AppointmentError::InvalidRequest(
                "Checkout only for online appointments".to_string(),
            ));
        }

        let patient_id: Uuid = user
            .id
            .parse()
            .map_err(|_| AppointmentError::Unauthorized)?;

        let validator = BookingValidator::new(&self.supabase);
        let doctor = validator
            .validate_booking(
                request.doctor_id,
                request.time_id,
                &request.symptom,
                Some(auth_token),
            )
            .await?;

        // Fee is validated positive above; the provider counts in minor units.
        let fee = doctor.fee.unwrap_or_default() as u64;
        let unit_amount = fee * 100;

        let params = CheckoutSessionParams {
            product_name: format!("Appointment with Dr. {}", doctor.full_name()),
            currency: self.currency.clone(),
            unit_amount,
            success_url: self.success_url.clone(),
            cancel_url: self.cancel_url.clone(),
            metadata: vec![
                ("patient_id".to_string(), patient_id.to_string()),
                ("doctor_id".to_string(), request.doctor_id.to_string()),
                ("time_id".to_string(), request.time_id.to_string()),
                ("symptom".to_string(), request.symptom.clone()),
            ],
        };

        let session = self
            .stripe
            .create_checkout_session(params)
            .await
            .map_err(|e| {
                error!("Stripe error: {}", e);
                AppointmentError::PaymentProvider(e.to_string())
            })?;

        info!(
            "Checkout session {} opened for patient {} with doctor {}",
            session.id, patient_id, request.doctor_id
        );

        Ok(CheckoutSessionResponse {
            session_id: session.id,
            session_url: session.url,
        })
    }
}
