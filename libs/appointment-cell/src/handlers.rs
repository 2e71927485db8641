use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Extension, Path, Query, State},
    http::HeaderMap,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{AppointmentError, AppointmentListQuery, CreateAppointmentRequest};
use crate::services::{
    AppointmentLifecycleService, CheckoutService, PaymentWebhookService, WebhookOutcome,
};

fn to_app_error(err: AppointmentError) -> AppError {
    match err {
        AppointmentError::InvalidRequest(msg) => AppError::BadRequest(msg),
        AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
        AppointmentError::PaymentProvider(msg) => AppError::PaymentProvider(msg),
        AppointmentError::InvalidPayload(msg) => {
            AppError::BadRequest(format!("Invalid payload: {}", msg))
        }
        AppointmentError::InvalidSignature => {
            AppError::BadRequest("Invalid signature".to_string())
        }
        AppointmentError::InvalidMetadata(msg) => {
            AppError::BadRequest(format!("Invalid metadata: {}", msg))
        }
        AppointmentError::CancellationNotAllowed => {
            AppError::BadRequest("This appointment cannot be cancelled".to_string())
        }
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::Unauthorized => {
            AppError::Auth("Not authorized to access this appointment".to_string())
        }
        AppointmentError::Database(msg) => AppError::Database(msg),
    }
}

fn ensure_patient_or_admin(user: &User) -> Result<(), AppError> {
    if user.is_patient() || user.is_admin() {
        return Ok(());
    }
    Err(AppError::Auth(
        "Only patients can book appointments".to_string(),
    ))
}

/// Open a hosted checkout session for an online appointment. The frontend
/// redirects to the returned session URL; the appointment itself is created
/// later by the payment webhook.
#[axum::debug_handler]
pub async fn create_online_checkout(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_patient_or_admin(&user)?;

    let service = CheckoutService::new(&config).map_err(to_app_error)?;

    let session = service
        .create_checkout(&user, request, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!(session)))
}

/// Direct creation for offline appointments; online bookings must go through
/// checkout.
#[axum::debug_handler]
pub async fn create_appointment(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_patient_or_admin(&user)?;

    let service = AppointmentLifecycleService::new(&config);

    let appointment = service
        .create_offline(&user, request, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked successfully"
    })))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentLifecycleService::new(&config);

    let appointments = service
        .list_appointments(&user, query, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentLifecycleService::new(&config);

    let appointment = service
        .get_appointment(appointment_id, &user, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentLifecycleService::new(&config);

    let appointment = service
        .cancel_appointment(appointment_id, &user, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled successfully"
    })))
}

/// Payment-provider callback. Authenticated by the signature header, not the
/// JWT middleware. Once the signature verifies and the event kind is
/// recognized, every business outcome is acknowledged with a success status
/// so the provider stops retrying; only transport-level failures (bad
/// payload or signature) return an error status.
#[axum::debug_handler]
pub async fn stripe_webhook(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let signature_header = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok());

    let service = PaymentWebhookService::new(&config).map_err(to_app_error)?;

    match service.process_event(&body, signature_header).await {
        Ok(WebhookOutcome::Created(appointment)) => Ok(Json(json!({
            "status": "success",
            "appointment_id": appointment.id
        }))),
        Ok(WebhookOutcome::Duplicate) => Ok(Json(json!({ "status": "idempotent" }))),
        Ok(WebhookOutcome::Ignored) => Ok(Json(json!({ "status": "success" }))),
        // Unrecoverable payload content: a retry would carry the same
        // metadata, so acknowledge instead of asking for redelivery.
        Err(AppointmentError::InvalidMetadata(_)) => {
            Ok(Json(json!({ "status": "invalid_metadata" })))
        }
        Err(e) => Err(to_app_error(e)),
    }
}
