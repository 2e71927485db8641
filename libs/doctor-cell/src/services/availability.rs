use anyhow::{anyhow, Result};
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AvailableTime, CreateAvailableTimeRequest};

pub struct AvailabilityService {
    supabase: SupabaseClient,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn add_available_time(
        &self,
        request: CreateAvailableTimeRequest,
        auth_token: &str,
    ) -> Result<AvailableTime> {
        debug!(
            "Adding available time '{}' for doctor {}",
            request.time, request.doctor_id
        );

        // A doctor cannot offer the same slot label twice.
        let existing_path = format!(
            "/rest/v1/available_times?doctor_id=eq.{}&time=eq.{}",
            request.doctor_id,
            urlencoding::encode(&request.time)
        );
        let existing: Vec<Value> = self
            .supabase
            .request(Method::GET, &existing_path, Some(auth_token), None)
            .await?;

        if !existing.is_empty() {
            return Err(anyhow!("This time slot is already offered by the doctor"));
        }

        let slot_data = json!({
            "doctor_id": request.doctor_id,
            "time": request.time,
            "created_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/available_times",
                Some(auth_token),
                Some(slot_data),
                Some(headers),
            )
            .await?;

        if result.is_empty() {
            return Err(anyhow!("Failed to create available time"));
        }

        let slot: AvailableTime = serde_json::from_value(result[0].clone())?;
        Ok(slot)
    }

    pub async fn list_available_times(
        &self,
        doctor_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<AvailableTime>> {
        let path = match doctor_id {
            Some(doctor_id) => format!(
                "/rest/v1/available_times?doctor_id=eq.{}&order=created_at.asc",
                doctor_id
            ),
            None => "/rest/v1/available_times?order=created_at.asc".to_string(),
        };

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        let slots: Vec<AvailableTime> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(slots)
    }

    pub async fn remove_available_time(&self, time_id: Uuid, auth_token: &str) -> Result<()> {
        debug!("Removing available time {}", time_id);

        let path = format!("/rest/v1/available_times?id=eq.{}", time_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let _: Vec<Value> = self
            .supabase
            .request_with_headers(Method::DELETE, &path, Some(auth_token), None, Some(headers))
            .await?;

        Ok(())
    }
}
