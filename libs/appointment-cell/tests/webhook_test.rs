use assert_matches::assert_matches;
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::AppointmentError;
use appointment_cell::services::{PaymentWebhookService, WebhookOutcome};
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

const WEBHOOK_SECRET: &str = "whsec_test123secret456";

fn sign_payload(payload: &[u8], secret: &str) -> String {
    type HmacSha256 = Hmac<Sha256>;

    let timestamp = chrono::Utc::now().timestamp().to_string();
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let signature = hex::encode(mac.finalize().into_bytes());

    format!("t={},v1={}", timestamp, signature)
}

fn completed_event(session_id: &str, payment_status: &str, metadata: Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": session_id,
                "payment_status": payment_status,
                "payment_intent": "pi_test_789",
                "metadata": metadata
            }
        }
    }))
    .unwrap()
}

fn booking_metadata(patient_id: Uuid, doctor_id: Uuid, time_id: Uuid) -> Value {
    json!({
        "patient_id": patient_id.to_string(),
        "doctor_id": doctor_id.to_string(),
        "time_id": time_id.to_string(),
        "symptom": "Recurring chest pain"
    })
}

fn confirmed_appointment_row(
    session_id: &str,
    patient_id: Uuid,
    doctor_id: Uuid,
    time_id: Uuid,
) -> Value {
    json!({
        "id": Uuid::new_v4(),
        "patient_id": patient_id,
        "doctor_id": doctor_id,
        "time_id": time_id,
        "appointment_type": "Online",
        "appointment_status": "Pending",
        "payment_status": "paid",
        "stripe_session_id": session_id,
        "payment_intent_id": "pi_test_789",
        "symptom": "Recurring chest pain",
        "cancel": false,
        "created_at": chrono::Utc::now().to_rfc3339()
    })
}

async fn mount_reference_mocks(supabase: &MockServer, patient_id: Uuid, doctor_id: Uuid, time_id: Uuid) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_response(&patient_id.to_string(), "patient@example.com", "Test")
        ])))
        .mount(supabase)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_response(&doctor_id.to_string(), "doctor@example.com", Some(500))
        ])))
        .mount(supabase)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/available_times"))
        .and(query_param("id", format!("eq.{}", time_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::available_time_response(
                &time_id.to_string(),
                &doctor_id.to_string(),
                "10:00 AM - 10:30 AM"
            )
        ])))
        .mount(supabase)
        .await;
}

#[tokio::test]
async fn first_delivery_creates_pending_paid_appointment() {
    let supabase = MockServer::start().await;
    let stripe = MockServer::start().await;
    let config = TestConfig::with_mock_servers(&supabase.uri(), &stripe.uri()).to_app_config();

    let (patient_id, doctor_id, time_id) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("stripe_session_id", "eq.cs_test_123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&supabase)
        .await;

    mount_reference_mocks(&supabase, patient_id, doctor_id, time_id).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            confirmed_appointment_row("cs_test_123", patient_id, doctor_id, time_id)
        ])))
        .expect(1)
        .mount(&supabase)
        .await;

    let payload = completed_event("cs_test_123", "paid", booking_metadata(patient_id, doctor_id, time_id));
    let header = sign_payload(&payload, WEBHOOK_SECRET);

    let service = PaymentWebhookService::new(&config).expect("payments configured");
    let outcome = service
        .process_event(&payload, Some(&header))
        .await
        .expect("webhook should succeed");

    let appointment = match outcome {
        WebhookOutcome::Created(appointment) => appointment,
        other => panic!("expected a created appointment, got {:?}", other),
    };
    assert_eq!(appointment.stripe_session_id.as_deref(), Some("cs_test_123"));
    assert_eq!(appointment.payment_intent_id.as_deref(), Some("pi_test_789"));
    assert_eq!(appointment.patient_id, patient_id);
}

#[tokio::test]
async fn duplicate_delivery_creates_exactly_one_appointment() {
    let supabase = MockServer::start().await;
    let stripe = MockServer::start().await;
    let config = TestConfig::with_mock_servers(&supabase.uri(), &stripe.uri()).to_app_config();

    let (patient_id, doctor_id, time_id) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    // First lookup sees nothing; every later lookup sees the created row.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("stripe_session_id", "eq.cs_test_dup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .up_to_n_times(1)
        .mount(&supabase)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("stripe_session_id", "eq.cs_test_dup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": Uuid::new_v4() }
        ])))
        .mount(&supabase)
        .await;

    mount_reference_mocks(&supabase, patient_id, doctor_id, time_id).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            confirmed_appointment_row("cs_test_dup", patient_id, doctor_id, time_id)
        ])))
        .expect(1)
        .mount(&supabase)
        .await;

    let payload = completed_event("cs_test_dup", "paid", booking_metadata(patient_id, doctor_id, time_id));
    let header = sign_payload(&payload, WEBHOOK_SECRET);

    let service = PaymentWebhookService::new(&config).expect("payments configured");

    let first = service.process_event(&payload, Some(&header)).await.unwrap();
    assert_matches!(first, WebhookOutcome::Created(_));

    let second = service.process_event(&payload, Some(&header)).await.unwrap();
    assert_matches!(second, WebhookOutcome::Duplicate);
}

#[tokio::test]
async fn racing_insert_conflict_is_treated_as_duplicate() {
    let supabase = MockServer::start().await;
    let stripe = MockServer::start().await;
    let config = TestConfig::with_mock_servers(&supabase.uri(), &stripe.uri()).to_app_config();

    let (patient_id, doctor_id, time_id) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&supabase)
        .await;

    mount_reference_mocks(&supabase, patient_id, doctor_id, time_id).await;

    // The other delivery won the race; the unique constraint fires.
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint \"appointments_stripe_session_id_key\""
        })))
        .mount(&supabase)
        .await;

    let payload = completed_event("cs_test_race", "paid", booking_metadata(patient_id, doctor_id, time_id));
    let header = sign_payload(&payload, WEBHOOK_SECRET);

    let service = PaymentWebhookService::new(&config).expect("payments configured");
    let outcome = service.process_event(&payload, Some(&header)).await.unwrap();

    assert_matches!(outcome, WebhookOutcome::Duplicate);
}

#[tokio::test]
async fn invalid_signature_rejected_without_state_change() {
    let supabase = MockServer::start().await;
    let stripe = MockServer::start().await;
    let config = TestConfig::with_mock_servers(&supabase.uri(), &stripe.uri()).to_app_config();

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&supabase)
        .await;

    let payload = completed_event(
        "cs_test_sig",
        "paid",
        booking_metadata(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()),
    );
    let header = sign_payload(&payload, "wrong_secret");

    let service = PaymentWebhookService::new(&config).expect("payments configured");
    let err = service.process_event(&payload, Some(&header)).await.unwrap_err();

    assert_matches!(err, AppointmentError::InvalidSignature);
}

#[tokio::test]
async fn missing_signature_header_rejected() {
    let supabase = MockServer::start().await;
    let stripe = MockServer::start().await;
    let config = TestConfig::with_mock_servers(&supabase.uri(), &stripe.uri()).to_app_config();

    let payload = completed_event(
        "cs_test_hdr",
        "paid",
        booking_metadata(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()),
    );

    let service = PaymentWebhookService::new(&config).expect("payments configured");
    let err = service.process_event(&payload, None).await.unwrap_err();

    assert_matches!(err, AppointmentError::InvalidSignature);
}

#[tokio::test]
async fn unparsable_body_rejected() {
    let supabase = MockServer::start().await;
    let stripe = MockServer::start().await;
    let config = TestConfig::with_mock_servers(&supabase.uri(), &stripe.uri()).to_app_config();

    let payload = b"not json at all";
    let header = sign_payload(payload, WEBHOOK_SECRET);

    let service = PaymentWebhookService::new(&config).expect("payments configured");
    let err = service.process_event(payload, Some(&header)).await.unwrap_err();

    assert_matches!(err, AppointmentError::InvalidPayload(_));
}

#[tokio::test]
async fn unrelated_event_kinds_are_ignored() {
    let supabase = MockServer::start().await;
    let stripe = MockServer::start().await;
    let config = TestConfig::with_mock_servers(&supabase.uri(), &stripe.uri()).to_app_config();

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&supabase)
        .await;

    let payload = serde_json::to_vec(&json!({
        "type": "payment_intent.succeeded",
        "data": { "object": { "id": "pi_123" } }
    }))
    .unwrap();
    let header = sign_payload(&payload, WEBHOOK_SECRET);

    let service = PaymentWebhookService::new(&config).expect("payments configured");
    let outcome = service.process_event(&payload, Some(&header)).await.unwrap();

    assert_matches!(outcome, WebhookOutcome::Ignored);
}

#[tokio::test]
async fn unpaid_completed_session_is_ignored() {
    let supabase = MockServer::start().await;
    let stripe = MockServer::start().await;
    let config = TestConfig::with_mock_servers(&supabase.uri(), &stripe.uri()).to_app_config();

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&supabase)
        .await;

    let payload = completed_event(
        "cs_test_unpaid",
        "unpaid",
        booking_metadata(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()),
    );
    let header = sign_payload(&payload, WEBHOOK_SECRET);

    let service = PaymentWebhookService::new(&config).expect("payments configured");
    let outcome = service.process_event(&payload, Some(&header)).await.unwrap();

    assert_matches!(outcome, WebhookOutcome::Ignored);
}

#[tokio::test]
async fn missing_metadata_fails_without_insert() {
    let supabase = MockServer::start().await;
    let stripe = MockServer::start().await;
    let config = TestConfig::with_mock_servers(&supabase.uri(), &stripe.uri()).to_app_config();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&supabase)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&supabase)
        .await;

    // No symptom and a malformed doctor id.
    let payload = completed_event(
        "cs_test_meta",
        "paid",
        json!({
            "patient_id": Uuid::new_v4().to_string(),
            "doctor_id": "not-a-uuid",
            "time_id": Uuid::new_v4().to_string()
        }),
    );
    let header = sign_payload(&payload, WEBHOOK_SECRET);

    let service = PaymentWebhookService::new(&config).expect("payments configured");
    let err = service.process_event(&payload, Some(&header)).await.unwrap_err();

    assert_matches!(err, AppointmentError::InvalidMetadata(_));
}

// ==============================================================================
// HTTP-LEVEL TESTS THROUGH THE ROUTER
// ==============================================================================

mod http {
    use super::*;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use appointment_cell::router::appointment_routes;

    async fn post_webhook(
        config: &TestConfig,
        payload: Vec<u8>,
        signature: Option<String>,
    ) -> (StatusCode, Value) {
        let app = appointment_routes(config.to_arc());

        let mut builder = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json");
        if let Some(signature) = signature {
            builder = builder.header("stripe-signature", signature);
        }

        let response = app
            .oneshot(builder.body(Body::from(payload)).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        (status, body)
    }

    #[tokio::test]
    async fn webhook_acknowledges_first_delivery() {
        let supabase = MockServer::start().await;
        let stripe = MockServer::start().await;
        let config = TestConfig::with_mock_servers(&supabase.uri(), &stripe.uri());

        let (patient_id, doctor_id, time_id) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        Mock::given(method("GET"))
            .and(path("/rest/v1/appointments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&supabase)
            .await;

        mount_reference_mocks(&supabase, patient_id, doctor_id, time_id).await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/appointments"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([
                confirmed_appointment_row("cs_http_1", patient_id, doctor_id, time_id)
            ])))
            .expect(1)
            .mount(&supabase)
            .await;

        let payload = completed_event("cs_http_1", "paid", booking_metadata(patient_id, doctor_id, time_id));
        let header = sign_payload(&payload, WEBHOOK_SECRET);

        let (status, body) = post_webhook(&config, payload, Some(header)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
    }

    #[tokio::test]
    async fn webhook_with_invalid_signature_returns_error_status() {
        let supabase = MockServer::start().await;
        let stripe = MockServer::start().await;
        let config = TestConfig::with_mock_servers(&supabase.uri(), &stripe.uri());

        Mock::given(method("POST"))
            .and(path("/rest/v1/appointments"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
            .expect(0)
            .mount(&supabase)
            .await;

        let payload = completed_event(
            "cs_http_2",
            "paid",
            booking_metadata(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()),
        );
        let header = sign_payload(&payload, "wrong_secret");

        let (status, _) = post_webhook(&config, payload, Some(header)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn webhook_without_signature_returns_error_status() {
        let supabase = MockServer::start().await;
        let stripe = MockServer::start().await;
        let config = TestConfig::with_mock_servers(&supabase.uri(), &stripe.uri());

        let payload = completed_event(
            "cs_http_3",
            "paid",
            booking_metadata(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()),
        );

        let (status, _) = post_webhook(&config, payload, None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn webhook_acknowledges_unrecoverable_metadata() {
        let supabase = MockServer::start().await;
        let stripe = MockServer::start().await;
        let config = TestConfig::with_mock_servers(&supabase.uri(), &stripe.uri());

        Mock::given(method("GET"))
            .and(path("/rest/v1/appointments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&supabase)
            .await;

        let payload = completed_event("cs_http_4", "paid", json!({}));
        let header = sign_payload(&payload, WEBHOOK_SECRET);

        let (status, body) = post_webhook(&config, payload, Some(header)).await;

        // Acknowledged so the provider does not retry a payload it cannot fix.
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "invalid_metadata");
    }

    #[tokio::test]
    async fn webhook_acknowledges_duplicate_delivery() {
        let supabase = MockServer::start().await;
        let stripe = MockServer::start().await;
        let config = TestConfig::with_mock_servers(&supabase.uri(), &stripe.uri());

        Mock::given(method("GET"))
            .and(path("/rest/v1/appointments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": Uuid::new_v4() }
            ])))
            .mount(&supabase)
            .await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/appointments"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
            .expect(0)
            .mount(&supabase)
            .await;

        let payload = completed_event(
            "cs_http_5",
            "paid",
            booking_metadata(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()),
        );
        let header = sign_payload(&payload, WEBHOOK_SECRET);

        let (status, body) = post_webhook(&config, payload, Some(header)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "idempotent");
    }
}
