//! Request handlers.
//!
//! Handlers stay thin: authenticate, parse, delegate to the service layer,
//! serialize. Every failure maps through `AppError`'s `ResponseError` impl.

use actix_web::{web, HttpResponse};
use chrono::{Local, NaiveDate};
use serde::Deserialize;

use crate::auth::AuthedUser;
use crate::error::{AppError, AppResult};
use crate::models::{NewMedication, NewPatient, RpcResponse, DATE_FORMAT};
use crate::{medications, patients, reconcile, views, AppState};

#[derive(Debug, Deserialize)]
pub struct ReconcileQuery {
    /// Caller's local calendar date, `YYYY-MM-DD`. Defaults to the server's
    /// local date when omitted.
    pub date: Option<String>,
}

pub async fn reconcile_session(
    state: web::Data<AppState>,
    user: AuthedUser,
    query: web::Query<ReconcileQuery>,
) -> AppResult<HttpResponse> {
    let today = match &query.date {
        Some(raw) => NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map_err(|_| AppError::InvalidArgument("date must be YYYY-MM-DD".into()))?,
        None => Local::now().date_naive(),
    };

    let outcome = reconcile::run_daily_reset(&state.store, &user.uid, today).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

// ===== Patients =====

pub async fn list_patients(
    state: web::Data<AppState>,
    user: AuthedUser,
) -> AppResult<HttpResponse> {
    let patients = state.store.list_patients(&user.uid).await?;
    Ok(HttpResponse::Ok().json(patients))
}

pub async fn get_patient(
    state: web::Data<AppState>,
    user: AuthedUser,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let patient = state
        .store
        .get_patient(&user.uid, &path)
        .await?
        .ok_or_else(|| AppError::NotFound("patient".into()))?;
    Ok(HttpResponse::Ok().json(patient))
}

pub async fn register_patient(
    state: web::Data<AppState>,
    user: AuthedUser,
    form: web::Json<NewPatient>,
) -> AppResult<HttpResponse> {
    let patient = patients::register_patient(&state.store, &user.uid, form.into_inner()).await?;
    Ok(HttpResponse::Created().json(patient))
}

pub async fn discharge_patient(
    state: web::Data<AppState>,
    user: AuthedUser,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let response =
        patients::discharge_patient(&state.store, &user.uid, &user.uid, &path).await?;
    Ok(HttpResponse::Ok().json(response))
}

// ===== Medications =====

pub async fn add_medication(
    state: web::Data<AppState>,
    user: AuthedUser,
    path: web::Path<String>,
    form: web::Json<NewMedication>,
) -> AppResult<HttpResponse> {
    let medication =
        medications::add_medication(&state.store, &user.uid, &path, form.into_inner()).await?;
    Ok(HttpResponse::Created().json(medication))
}

pub async fn mark_taken(
    state: web::Data<AppState>,
    user: AuthedUser,
    path: web::Path<(String, String)>,
) -> AppResult<HttpResponse> {
    let (patient_id, medication_id) = path.into_inner();
    medications::mark_taken(&state.store, &user.uid, &patient_id, &medication_id).await?;
    Ok(HttpResponse::Ok().json(RpcResponse {
        success: true,
        message: "medication marked as taken".into(),
    }))
}

pub async fn delete_medication(
    state: web::Data<AppState>,
    user: AuthedUser,
    path: web::Path<(String, String)>,
) -> AppResult<HttpResponse> {
    let (patient_id, medication_id) = path.into_inner();
    medications::delete_medication(&state.store, &user.uid, &patient_id, &medication_id).await?;
    Ok(HttpResponse::Ok().json(RpcResponse {
        success: true,
        message: "medication deleted".into(),
    }))
}

// ===== RPC-shaped endpoints =====
//
// Same operations as the scoped routes above, but taking the owner id in the
// body so the ownership check is explicit. Fields default to empty strings;
// missing parameters surface as invalid-argument, not a decode error.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMedicationRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub patient_id: String,
    #[serde(default)]
    pub medication_id: String,
}

pub async fn delete_medication_rpc(
    state: web::Data<AppState>,
    user: AuthedUser,
    body: web::Json<DeleteMedicationRequest>,
) -> AppResult<HttpResponse> {
    let response = patients::delete_medication_checked(
        &state.store,
        &user.uid,
        &body.user_id,
        &body.patient_id,
        &body.medication_id,
    )
    .await?;
    Ok(HttpResponse::Ok().json(response))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DischargePatientRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub patient_id: String,
}

pub async fn discharge_patient_rpc(
    state: web::Data<AppState>,
    user: AuthedUser,
    body: web::Json<DischargePatientRequest>,
) -> AppResult<HttpResponse> {
    let response = patients::discharge_patient(
        &state.store,
        &user.uid,
        &body.user_id,
        &body.patient_id,
    )
    .await?;
    Ok(HttpResponse::Ok().json(response))
}

// ===== Views =====

pub async fn home_view(state: web::Data<AppState>, user: AuthedUser) -> AppResult<HttpResponse> {
    let patients = state.store.list_patients(&user.uid).await?;
    Ok(HttpResponse::Ok().json(views::home_view(&patients, Local::now().time())))
}

pub async fn history_view(
    state: web::Data<AppState>,
    user: AuthedUser,
) -> AppResult<HttpResponse> {
    let patients = state.store.list_patients(&user.uid).await?;
    Ok(HttpResponse::Ok().json(views::history_view(&patients, Local::now().time())))
}

pub async fn schedule_view(
    state: web::Data<AppState>,
    user: AuthedUser,
) -> AppResult<HttpResponse> {
    let patients = state.store.list_patients(&user.uid).await?;
    Ok(HttpResponse::Ok().json(views::schedule_view(&patients, Local::now().time())))
}
