use anyhow::{anyhow, Result};
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    CreateDoctorRequest, Doctor, DoctorSearchQuery, RoleTransition, UpdateDoctorRequest,
};

pub struct DoctorService {
    supabase: SupabaseClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Create a doctor profile. Role transition is NOT implied here; see
    /// `promote_to_doctor`.
    pub async fn create_doctor(
        &self,
        request: CreateDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor> {
        debug!("Creating new doctor profile for: {}", request.email);

        let existing_check_path = format!("/rest/v1/doctors?email=eq.{}", request.email);
        let existing: Vec<Value> = self
            .supabase
            .request(Method::GET, &existing_check_path, Some(auth_token), None)
            .await?;

        if !existing.is_empty() {
            return Err(anyhow!("Doctor with email {} already exists", request.email));
        }

        let doctor_data = json!({
            "user_id": request.user_id,
            "first_name": request.first_name,
            "last_name": request.last_name,
            "email": request.email,
            "designation": request.designation,
            "specialization": request.specialization,
            "fee": request.fee,
            "meet_link": request.meet_link,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
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
                "/rest/v1/doctors",
                Some(auth_token),
                Some(doctor_data),
                Some(headers),
            )
            .await?;

        if result.is_empty() {
            return Err(anyhow!("Failed to create doctor profile"));
        }

        let doctor: Doctor = serde_json::from_value(result[0].clone())?;
        debug!("Doctor profile created successfully with ID: {}", doctor.id);

        Ok(doctor)
    }

    pub async fn get_doctor(&self, doctor_id: &str, auth_token: &str) -> Result<Doctor> {
        debug!("Fetching doctor profile: {}", doctor_id);

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        if result.is_empty() {
            return Err(anyhow!("Doctor not found"));
        }

        let doctor: Doctor = serde_json::from_value(result[0].clone())?;
        Ok(doctor)
    }

    pub async fn search_doctors(
        &self,
        query: DoctorSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Doctor>> {
        debug!("Searching doctors with query: {:?}", query);

        let mut query_parts = vec![];

        if let Some(specialization) = query.specialization {
            let specialization = urlencoding::encode(&specialization).into_owned();
            query_parts.push(format!("specialization=cs.{{{}}}", specialization));
        }
        if let Some(name) = query.name {
            let name = urlencoding::encode(&name).into_owned();
            query_parts.push(format!(
                "or=(first_name.ilike.%{}%,last_name.ilike.%{}%)",
                name, name
            ));
        }

        let limit = query.limit.unwrap_or(10).min(50);
        let offset = query.offset.unwrap_or(0);
        query_parts.push(format!("limit={}&offset={}", limit, offset));

        let path = format!("/rest/v1/doctors?{}", query_parts.join("&"));

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        let doctors: Vec<Doctor> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(doctors)
    }

    pub async fn update_doctor(
        &self,
        doctor_id: &str,
        request: UpdateDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor> {
        debug!("Updating doctor profile: {}", doctor_id);

        let mut update_data = serde_json::Map::new();

        if let Some(first_name) = request.first_name {
            update_data.insert("first_name".to_string(), json!(first_name));
        }
        if let Some(last_name) = request.last_name {
            update_data.insert("last_name".to_string(), json!(last_name));
        }
        if let Some(designation) = request.designation {
            update_data.insert("designation".to_string(), json!(designation));
        }
        if let Some(specialization) = request.specialization {
            update_data.insert("specialization".to_string(), json!(specialization));
        }
        if let Some(fee) = request.fee {
            update_data.insert("fee".to_string(), json!(fee));
        }
        if let Some(meet_link) = request.meet_link {
            update_data.insert("meet_link".to_string(), json!(meet_link));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(update_data)),
                Some(headers),
            )
            .await?;

        if result.is_empty() {
            return Err(anyhow!("Failed to update doctor profile"));
        }

        let updated_doctor: Doctor = serde_json::from_value(result[0].clone())?;
        Ok(updated_doctor)
    }

    /// Promote an existing patient account to a doctor account: flips the
    /// user-profile role and retires the patient profile row. The actor is
    /// recorded in the returned transition and in the log.
    pub async fn promote_to_doctor(
        &self,
        user_id: Uuid,
        promoted_by: Uuid,
        auth_token: &str,
    ) -> Result<RoleTransition> {
        let profile_path = format!("/rest/v1/user_profiles?user_id=eq.{}", user_id);
        let profiles: Vec<Value> = self
            .supabase
            .request(Method::GET, &profile_path, Some(auth_token), None)
            .await?;

        let previous_role = profiles
            .first()
            .and_then(|p| p.get("role"))
            .and_then(|r| r.as_str())
            .ok_or_else(|| anyhow!("User profile not found"))?
            .to_string();

        if previous_role == "doctor" {
            return Err(anyhow!("User is already a doctor"));
        }

        // PostgREST answers bare writes with 204; asking for the
        // representation keeps the response parseable.
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let _: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &profile_path,
                Some(auth_token),
                Some(json!({ "role": "doctor" })),
                Some(headers.clone()),
            )
            .await?;

        // A doctor account is exclusively a doctor; the patient profile is
        // removed rather than left dangling.
        let patient_path = format!("/rest/v1/patients?id=eq.{}", user_id);
        let _: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::DELETE,
                &patient_path,
                Some(auth_token),
                None,
                Some(headers),
            )
            .await?;

        let transition = RoleTransition {
            user_id,
            previous_role,
            new_role: "doctor".to_string(),
            promoted_by,
            promoted_at: Utc::now(),
        };

        info!(
            "User {} promoted to doctor by {} (was {})",
            transition.user_id, transition.promoted_by, transition.previous_role
        );

        Ok(transition)
    }
}
