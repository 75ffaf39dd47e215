//! End-to-end handler tests over an in-memory store.

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use serde_json::json;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use carecontrol::auth;
use carecontrol::config::{AuthConfig, DatabaseConfig, ServerConfig, Settings};
use carecontrol::models::{Medication, Patient, ResetOutcome, RpcResponse};
use carecontrol::store::CareStore;
use carecontrol::{api, AppState};

const SECRET: &str = "test-secret";

async fn test_state() -> (web::Data<AppState>, SqlitePool) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let store = CareStore::with_pool(pool.clone()).await.unwrap();
    let settings = Settings {
        server: ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
        },
        database: DatabaseConfig {
            url: "sqlite::memory:".into(),
        },
        auth: AuthConfig {
            jwt_secret: SECRET.into(),
        },
    };
    (web::Data::new(AppState { store, settings }), pool)
}

fn bearer(uid: &str) -> (&'static str, String) {
    let token = auth::issue_token(uid, SECRET, 3600).unwrap();
    ("Authorization", format!("Bearer {token}"))
}

#[actix_web::test]
async fn full_medication_lifecycle_and_daily_reset() {
    let (state, _pool) = test_state().await;
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .configure(api::configure),
    )
    .await;

    // Register a patient.
    let req = test::TestRequest::post()
        .uri("/api/patients")
        .insert_header(bearer("u1"))
        .set_json(json!({
            "name": "Daniel Torres",
            "room": "204",
            "condition": "Estable",
            "age": 67,
            "admissionDate": "2024-01-15"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let patient: Patient = test::read_body_json(resp).await;
    assert!(patient.medications.is_empty());

    // Schedule a medication.
    let req = test::TestRequest::post()
        .uri(&format!("/api/patients/{}/medications", patient.id))
        .insert_header(bearer("u1"))
        .set_json(json!({
            "medication": "Omeprazol",
            "dosage": "20mg",
            "time": "07:30"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let medication: Medication = test::read_body_json(resp).await;

    // Mark it taken.
    let req = test::TestRequest::post()
        .uri(&format!(
            "/api/patients/{}/medications/{}/taken",
            patient.id, medication.id
        ))
        .insert_header(bearer("u1"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    // A new day's reconciliation reverts it to pending.
    let req = test::TestRequest::post()
        .uri("/api/session/reconcile?date=2024-01-16")
        .insert_header(bearer("u1"))
        .to_request();
    let outcome: ResetOutcome = test::call_and_read_body_json(&app, req).await;
    assert!(outcome.ran_today);
    assert_eq!(outcome.patients_updated, 1);

    // Same day again: no-op.
    let req = test::TestRequest::post()
        .uri("/api/session/reconcile?date=2024-01-16")
        .insert_header(bearer("u1"))
        .to_request();
    let outcome: ResetOutcome = test::call_and_read_body_json(&app, req).await;
    assert!(!outcome.ran_today);
    assert_eq!(outcome.patients_updated, 0);

    // Home view reflects the reset list.
    let req = test::TestRequest::get()
        .uri("/api/views/home")
        .insert_header(bearer("u1"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["patient_count"], 1);
    assert_eq!(body["stats"]["taken"], 0);
}

#[actix_web::test]
async fn requests_without_a_token_are_rejected() {
    let (state, _pool) = test_state().await;
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .configure(api::configure),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/patients").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn rpc_discharge_enforces_the_failure_taxonomy() {
    let (state, _pool) = test_state().await;
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .configure(api::configure),
    )
    .await;

    // Acting on another user's data is forbidden.
    let req = test::TestRequest::post()
        .uri("/api/rpc/discharge-patient")
        .insert_header(bearer("u1"))
        .set_json(json!({ "userId": "u2", "patientId": "p1" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: RpcResponse = test::read_body_json(resp).await;
    assert!(!body.success);

    // Missing parameters are a bad request.
    let req = test::TestRequest::post()
        .uri("/api/rpc/discharge-patient")
        .insert_header(bearer("u1"))
        .set_json(json!({ "userId": "u1" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn failed_reset_commit_surfaces_as_a_server_error() {
    let (state, pool) = test_state().await;
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .configure(api::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/patients")
        .insert_header(bearer("u1"))
        .set_json(json!({
            "name": "Daniel Torres",
            "room": "204",
            "condition": "Estable",
            "age": 67,
            "admissionDate": "2024-01-15"
        }))
        .to_request();
    let patient: Patient = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::post()
        .uri(&format!("/api/patients/{}/medications", patient.id))
        .insert_header(bearer("u1"))
        .set_json(json!({
            "medication": "Omeprazol",
            "dosage": "20mg",
            "time": "07:30"
        }))
        .to_request();
    let medication: Medication = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::post()
        .uri(&format!(
            "/api/patients/{}/medications/{}/taken",
            patient.id, medication.id
        ))
        .insert_header(bearer("u1"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    // Block patient writes so the batch commit fails.
    sqlx::query(
        "CREATE TRIGGER block_patient_updates BEFORE UPDATE ON patients
         BEGIN SELECT RAISE(ABORT, 'update blocked'); END",
    )
    .execute(&pool)
    .await
    .unwrap();

    let req = test::TestRequest::post()
        .uri("/api/session/reconcile?date=2024-01-16")
        .insert_header(bearer("u1"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // Nothing moved: the medication is still taken.
    let req = test::TestRequest::get()
        .uri(&format!("/api/patients/{}", patient.id))
        .insert_header(bearer("u1"))
        .to_request();
    let loaded: Patient = test::call_and_read_body_json(&app, req).await;
    assert_eq!(
        serde_json::to_value(&loaded.medications[0]).unwrap()["type"],
        "taken"
    );
}

#[actix_web::test]
async fn unreadable_tracker_reports_a_quiet_noop() {
    let (state, pool) = test_state().await;
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .configure(api::configure),
    )
    .await;

    sqlx::query("DROP TABLE reset_tracker")
        .execute(&pool)
        .await
        .unwrap();

    let req = test::TestRequest::post()
        .uri("/api/session/reconcile?date=2024-01-16")
        .insert_header(bearer("u1"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let outcome: ResetOutcome = test::read_body_json(resp).await;
    assert!(!outcome.ran_today);
    assert_eq!(outcome.patients_updated, 0);
}

#[actix_web::test]
async fn deleting_an_unknown_patient_is_not_found() {
    let (state, _pool) = test_state().await;
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .configure(api::configure),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/patients/ghost")
        .insert_header(bearer("u1"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
