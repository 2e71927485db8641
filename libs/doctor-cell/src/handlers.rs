use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    CreateAvailableTimeRequest, CreateDoctorRequest, CreateReviewRequest, DoctorSearchQuery,
    PromoteToDoctorRequest, UpdateDoctorRequest,
};
use crate::services::{AvailabilityService, DoctorService, ReviewService};

#[derive(Debug, Deserialize)]
pub struct DoctorFilterQuery {
    pub doctor_id: Option<Uuid>,
}

fn ensure_admin(user: &User) -> Result<(), AppError> {
    if user.is_admin() {
        return Ok(());
    }
    Err(AppError::Auth(
        "Only administrators can modify doctor records".to_string(),
    ))
}

// ==============================================================================
// DOCTOR DIRECTORY
// ==============================================================================

#[axum::debug_handler]
pub async fn create_doctor(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_admin(&user)?;

    let service = DoctorService::new(&config);

    let doctor = service
        .create_doctor(request, auth.token())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&config);

    let doctor = service
        .get_doctor(&doctor_id.to_string(), auth.token())
        .await
        .map_err(|e| AppError::NotFound(e.to_string()))?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn search_doctors(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
    Query(query): Query<DoctorSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&config);

    let doctors = service
        .search_doctors(query, auth.token())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn update_doctor(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_admin(&user)?;

    let service = DoctorService::new(&config);

    let doctor = service
        .update_doctor(&doctor_id.to_string(), request, auth.token())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!(doctor)))
}

/// Explicit, audited role transition. Replaces the old pattern where saving
/// a doctor record silently rewrote the user's role.
#[axum::debug_handler]
pub async fn promote_to_doctor(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<PromoteToDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_admin(&user)?;

    let promoted_by: Uuid = user
        .id
        .parse()
        .map_err(|_| AppError::Auth("Invalid user id in token".to_string()))?;

    let service = DoctorService::new(&config);

    let transition = service
        .promote_to_doctor(request.user_id, promoted_by, auth.token())
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "transition": transition
    })))
}

// ==============================================================================
// AVAILABLE TIMES
// ==============================================================================

#[axum::debug_handler]
pub async fn add_available_time(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAvailableTimeRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_admin(&user)?;

    if request.time.trim().is_empty() {
        return Err(AppError::ValidationError(
            "Time slot label cannot be empty".to_string(),
        ));
    }

    let service = AvailabilityService::new(&config);

    let slot = service
        .add_available_time(request, auth.token())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!(slot)))
}

#[axum::debug_handler]
pub async fn list_available_times(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
    Query(query): Query<DoctorFilterQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&config);

    let slots = service
        .list_available_times(query.doctor_id, auth.token())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!({
        "available_times": slots,
        "total": slots.len()
    })))
}

#[axum::debug_handler]
pub async fn remove_available_time(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(time_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    ensure_admin(&user)?;

    let service = AvailabilityService::new(&config);

    service
        .remove_available_time(time_id, auth.token())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!({ "success": true })))
}

// ==============================================================================
// REVIEWS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_review(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateReviewRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_patient() {
        return Err(AppError::Auth(
            "Only patients can review doctors".to_string(),
        ));
    }

    if !(1..=5).contains(&request.rating) {
        return Err(AppError::ValidationError(
            "Rating must be between 1 and 5".to_string(),
        ));
    }
    if request.body.trim().is_empty() {
        return Err(AppError::ValidationError(
            "Review body cannot be empty".to_string(),
        ));
    }

    let reviewer_id: Uuid = user
        .id
        .parse()
        .map_err(|_| AppError::Auth("Invalid user id in token".to_string()))?;

    let service = ReviewService::new(&config);

    let review = service
        .create_review(reviewer_id, request, auth.token())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!(review)))
}

#[axum::debug_handler]
pub async fn list_reviews(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
    Query(query): Query<DoctorFilterQuery>,
) -> Result<Json<Value>, AppError> {
    let service = ReviewService::new(&config);

    let reviews = service
        .list_reviews(query.doctor_id, auth.token())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!({
        "reviews": reviews,
        "total": reviews.len()
    })))
}
