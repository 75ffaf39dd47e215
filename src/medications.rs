//! User-driven medication transitions: append, mark taken, remove.
//!
//! Each operation is a read-modify-write of the owning patient's embedded
//! list followed by a single full-list write-back, the same last-write-wins
//! shape the patient documents have always had.

use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{Medication, MedicationStatus, NewMedication};
use crate::store::CareStore;

/// Append a new medication to the patient's list and return the stored
/// record. Ids are random UUIDs, assigned here; a status supplied by the
/// client is ignored and the record starts out pending.
#[instrument(skip(store, form), fields(user = %user_id, patient = %patient_id))]
pub async fn add_medication(
    store: &CareStore,
    user_id: &str,
    patient_id: &str,
    form: NewMedication,
) -> AppResult<Medication> {
    form.validate()?;

    let patient = store
        .get_patient(user_id, patient_id)
        .await?
        .ok_or_else(|| AppError::NotFound("patient".into()))?;

    let medication = Medication {
        id: Uuid::new_v4().to_string(),
        name: form.name,
        dosage: form.dosage,
        time: form.time,
        status: MedicationStatus::Pending,
        instructions: form.instructions.unwrap_or_default(),
    };

    let mut medications = patient.medications;
    medications.push(medication.clone());
    store
        .put_medications(user_id, patient_id, &medications)
        .await?;

    info!(medication = %medication.id, "medication added");
    Ok(medication)
}

/// Flip the matching medication to `taken`. Idempotent: marking an already
/// taken record is a successful no-op write.
#[instrument(skip(store), fields(user = %user_id, patient = %patient_id, medication = %medication_id))]
pub async fn mark_taken(
    store: &CareStore,
    user_id: &str,
    patient_id: &str,
    medication_id: &str,
) -> AppResult<()> {
    let patient = store
        .get_patient(user_id, patient_id)
        .await?
        .ok_or_else(|| AppError::NotFound("patient".into()))?;

    let mut found = false;
    let medications: Vec<Medication> = patient
        .medications
        .into_iter()
        .map(|mut med| {
            if med.id == medication_id {
                found = true;
                med.status = MedicationStatus::Taken;
            }
            med
        })
        .collect();

    if !found {
        return Err(AppError::NotFound("medication".into()));
    }

    store
        .put_medications(user_id, patient_id, &medications)
        .await?;
    info!("medication marked as taken");
    Ok(())
}

/// Remove a medication by id from the patient's embedded list.
#[instrument(skip(store), fields(user = %user_id, patient = %patient_id, medication = %medication_id))]
pub async fn delete_medication(
    store: &CareStore,
    user_id: &str,
    patient_id: &str,
    medication_id: &str,
) -> AppResult<()> {
    let patient = store
        .get_patient(user_id, patient_id)
        .await?
        .ok_or_else(|| AppError::NotFound("patient".into()))?;

    let before = patient.medications.len();
    let medications: Vec<Medication> = patient
        .medications
        .into_iter()
        .filter(|med| med.id != medication_id)
        .collect();

    if medications.len() == before {
        return Err(AppError::NotFound("medication".into()));
    }

    store
        .put_medications(user_id, patient_id, &medications)
        .await?;
    info!("medication deleted");
    Ok(())
}
