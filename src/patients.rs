//! Patient registration and discharge.
//!
//! Discharge and the RPC-style medication delete carry the callable-function
//! failure taxonomy: missing arguments, caller acting on another user's
//! data, and storage failure are distinct errors.

use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{NewPatient, Patient, RpcResponse};
use crate::store::CareStore;

/// Register a new patient for the user. The medication list always starts
/// empty, whatever the client sends alongside the display attributes.
#[instrument(skip(store, form), fields(user = %user_id))]
pub async fn register_patient(
    store: &CareStore,
    user_id: &str,
    form: NewPatient,
) -> AppResult<Patient> {
    form.validate()?;

    let patient = Patient {
        id: Uuid::new_v4().to_string(),
        name: form.name,
        room: form.room,
        condition: form.condition,
        age: form.age,
        admission_date: form.admission_date,
        avatar: form.avatar,
        vitals: form.vitals,
        medications: Vec::new(),
        notes: form.notes,
    };

    store.create_patient(user_id, &patient).await?;
    info!(patient = %patient.id, "patient registered");
    Ok(patient)
}

/// Discharge a patient: a hard delete of the whole record.
///
/// `caller_uid` is the authenticated identity, `user_id` the claimed owner
/// of the record; they must match.
#[instrument(skip(store), fields(caller = %caller_uid, user = %user_id, patient = %patient_id))]
pub async fn discharge_patient(
    store: &CareStore,
    caller_uid: &str,
    user_id: &str,
    patient_id: &str,
) -> AppResult<RpcResponse> {
    check_ownership(caller_uid, user_id, &[user_id, patient_id])?;

    store.delete_patient(user_id, patient_id).await?;
    info!("patient discharged");
    Ok(RpcResponse {
        success: true,
        message: "patient discharged".into(),
    })
}

/// RPC-shaped medication delete, same taxonomy as discharge.
#[instrument(skip(store), fields(caller = %caller_uid, user = %user_id, patient = %patient_id))]
pub async fn delete_medication_checked(
    store: &CareStore,
    caller_uid: &str,
    user_id: &str,
    patient_id: &str,
    medication_id: &str,
) -> AppResult<RpcResponse> {
    check_ownership(caller_uid, user_id, &[user_id, patient_id, medication_id])?;

    crate::medications::delete_medication(store, user_id, patient_id, medication_id).await?;
    Ok(RpcResponse {
        success: true,
        message: "medication deleted".into(),
    })
}

fn check_ownership(caller_uid: &str, user_id: &str, required: &[&str]) -> AppResult<()> {
    if required.iter().any(|v| v.is_empty()) {
        return Err(AppError::InvalidArgument(
            "required parameters are missing".into(),
        ));
    }
    if caller_uid != user_id {
        return Err(AppError::PermissionDenied(
            "cannot modify another user's data".into(),
        ));
    }
    Ok(())
}
