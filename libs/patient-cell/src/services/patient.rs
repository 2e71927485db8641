use anyhow::{anyhow, Result};
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;

use crate::models::{CreatePatientRequest, Patient, PatientSearchQuery, UpdatePatientRequest};

pub struct PatientService {
    supabase: SupabaseClient,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Create the profile row for the authenticated user. The row id is the
    /// auth user id, so a user can only ever own a single profile.
    pub async fn create_patient(
        &self,
        user: &User,
        request: CreatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient> {
        debug!("Creating new patient profile for: {}", request.email);

        let existing_check_path = format!("/rest/v1/patients?id=eq.{}", user.id);
        let existing: Vec<Value> = self
            .supabase
            .request(Method::GET, &existing_check_path, Some(auth_token), None)
            .await?;

        if !existing.is_empty() {
            return Err(anyhow!("Patient profile already exists for this user"));
        }

        let patient_data = json!({
            "id": user.id,
            "first_name": request.first_name,
            "last_name": request.last_name,
            "email": request.email,
            "phone_number": request.phone_number,
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
                "/rest/v1/patients",
                Some(auth_token),
                Some(patient_data),
                Some(headers),
            )
            .await?;

        if result.is_empty() {
            return Err(anyhow!("Failed to create patient profile"));
        }

        let patient: Patient = serde_json::from_value(result[0].clone())?;
        debug!("Patient profile created successfully with ID: {}", patient.id);

        Ok(patient)
    }

    pub async fn get_patient(&self, patient_id: &str, auth_token: &str) -> Result<Patient> {
        debug!("Fetching patient profile: {}", patient_id);

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        if result.is_empty() {
            return Err(anyhow!("Patient not found"));
        }

        let patient: Patient = serde_json::from_value(result[0].clone())?;
        Ok(patient)
    }

    pub async fn update_patient(
        &self,
        patient_id: &str,
        request: UpdatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient> {
        debug!("Updating patient profile: {}", patient_id);

        let mut update_data = serde_json::Map::new();

        if let Some(first_name) = request.first_name {
            update_data.insert("first_name".to_string(), json!(first_name));
        }
        if let Some(last_name) = request.last_name {
            update_data.insert("last_name".to_string(), json!(last_name));
        }
        if let Some(phone_number) = request.phone_number {
            update_data.insert("phone_number".to_string(), json!(phone_number));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
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
            return Err(anyhow!("Failed to update patient profile"));
        }

        let updated_patient: Patient = serde_json::from_value(result[0].clone())?;
        Ok(updated_patient)
    }

    /// Admin-only directory search.
    pub async fn search_patients(
        &self,
        query: PatientSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Patient>> {
        debug!("Searching patients with query: {:?}", query);

        let mut query_parts = vec![];

        if let Some(name) = query.name {
            let name = urlencoding::encode(&name).into_owned();
            query_parts.push(format!(
                "or=(first_name.ilike.%{}%,last_name.ilike.%{}%)",
                name, name
            ));
        }
        if let Some(email) = query.email {
            let email = urlencoding::encode(&email).into_owned();
            query_parts.push(format!("email=ilike.%{}%", email));
        }

        let limit = query.limit.unwrap_or(50);
        let offset = query.offset.unwrap_or(0);
        query_parts.push(format!("limit={}&offset={}", limit, offset));

        let path = format!("/rest/v1/patients?{}", query_parts.join("&"));

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        let patients: Vec<Patient> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(patients)
    }
}
