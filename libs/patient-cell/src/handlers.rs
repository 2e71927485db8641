use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{CreatePatientRequest, PatientSearchQuery, UpdatePatientRequest};
use crate::services::PatientService;

// Object-level rule from the profile store: a patient record is visible to
// its owner and to admins only.
fn ensure_owner_or_admin(user: &User, patient_id: &str) -> Result<(), AppError> {
    if user.is_admin() || user.id == patient_id {
        return Ok(());
    }
    Err(AppError::Auth(
        "Not authorized to access this patient profile".to_string(),
    ))
}

#[axum::debug_handler]
pub async fn create_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&config);

    let patient = service
        .create_patient(&user, request, auth.token())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    ensure_owner_or_admin(&user, &patient_id)?;

    let service = PatientService::new(&config);

    let patient = service
        .get_patient(&patient_id, auth.token())
        .await
        .map_err(|e| AppError::NotFound(e.to_string()))?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn update_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<String>,
    Json(request): Json<UpdatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_owner_or_admin(&user, &patient_id)?;

    let service = PatientService::new(&config);

    let patient = service
        .update_patient(&patient_id, request, auth.token())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn search_patients(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<PatientSearchQuery>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only administrators can search patient profiles".to_string(),
        ));
    }

    let service = PatientService::new(&config);

    let patients = service
        .search_patients(query, auth.token())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!({
        "patients": patients,
        "total": patients.len()
    })))
}
