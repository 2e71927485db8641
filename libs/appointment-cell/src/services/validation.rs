use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use doctor_cell::models::Doctor;
use shared_database::supabase::SupabaseClient;

use crate::models::{AppointmentError, SYMPTOM_MAX_CHARS};

/// Booking preconditions shared by the checkout and offline-create paths:
/// a usable symptom, a bookable doctor (positive fee), and a slot the doctor
/// actually offers.
pub struct BookingValidator<'a> {
    supabase: &'a SupabaseClient,
}

impl<'a> BookingValidator<'a> {
    pub fn new(supabase: &'a SupabaseClient) -> Self {
        Self { supabase }
    }

    pub async fn validate_booking(
        &self,
        doctor_id: Uuid,
        time_id: Uuid,
        symptom: &str,
        auth_token: Option<&str>,
    ) -> Result<Doctor, AppointmentError> {
        if symptom.trim().is_empty() {
            return Err(AppointmentError::ValidationError(
                "Symptom description is required".to_string(),
            ));
        }
        if symptom.chars().count() > SYMPTOM_MAX_CHARS {
            return Err(AppointmentError::ValidationError(format!(
                "Symptom description exceeds {} characters",
                SYMPTOM_MAX_CHARS
            )));
        }

        let doctor = self.fetch_doctor(doctor_id, auth_token).await?;

        if !doctor.has_positive_fee() {
            return Err(AppointmentError::ValidationError(
                "Appointments require a fee for this doctor".to_string(),
            ));
        }

        self.verify_slot_belongs_to_doctor(doctor_id, time_id, auth_token)
            .await?;

        Ok(doctor)
    }

    async fn fetch_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Doctor, AppointmentError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let doctor = result
            .into_iter()
            .next()
            .ok_or_else(|| {
                AppointmentError::ValidationError("Selected doctor does not exist".to_string())
            })?;

        serde_json::from_value(doctor).map_err(|e| AppointmentError::Database(e.to_string()))
    }

    async fn verify_slot_belongs_to_doctor(
        &self,
        doctor_id: Uuid,
        time_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<(), AppointmentError> {
        debug!("Verifying slot {} belongs to doctor {}", time_id, doctor_id);

        let path = format!(
            "/rest/v1/available_times?id=eq.{}&doctor_id=eq.{}",
            time_id, doctor_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        if result.is_empty() {
            return Err(AppointmentError::ValidationError(
                "Selected time is not available for this doctor".to_string(),
            ));
        }

        Ok(())
    }
}
