//! Daily reconciliation: once per calendar day, medications administered the
//! previous day revert from `taken` to `pending`.
//!
//! The run is keyed on the per-user reset tracker. Reading the tracker fails
//! closed: on a read error the reset is skipped for this session rather than
//! risking a duplicate or partial reset. All writes - every changed patient
//! plus the tracker advance - go through the store's atomic batch commit.

use chrono::NaiveDate;
use tracing::{info, instrument, warn};

use crate::error::AppResult;
use crate::models::{Medication, MedicationStatus, ResetOutcome, DATE_FORMAT};
use crate::store::CareStore;

/// Run the daily medication reset for one user.
///
/// `today` is the caller's local calendar date; HTTP callers that omit it
/// get `chrono::Local::now().date_naive()` from the handler. Two sessions
/// starting concurrently on the same new day may both run the reset; the
/// target state is identical, so the race is tolerated rather than locked
/// against.
#[instrument(skip(store), fields(user = %user_id, date = %today))]
pub async fn run_daily_reset(
    store: &CareStore,
    user_id: &str,
    today: NaiveDate,
) -> AppResult<ResetOutcome> {
    let today_str = today.format(DATE_FORMAT).to_string();

    // An unreadable tracker skips the reset for this session instead of
    // raising: running without knowing the last date could reset twice.
    // This applies to the tracker read only; failures past this point
    // propagate to the caller.
    let last_reset = match store.get_last_reset(user_id).await {
        Ok(last_reset) => last_reset,
        Err(err) => {
            warn!(%err, "reset tracker unreadable, skipping daily reset");
            return Ok(ResetOutcome {
                ran_today: false,
                patients_updated: 0,
            });
        }
    };
    if last_reset.as_deref() == Some(today_str.as_str()) {
        return Ok(ResetOutcome {
            ran_today: false,
            patients_updated: 0,
        });
    }

    let patients = store.list_patients(user_id).await?;
    let mut changed: Vec<(String, Vec<Medication>)> = Vec::new();

    for patient in patients {
        if patient
            .medications
            .iter()
            .any(|m| m.status == MedicationStatus::Taken)
        {
            let reset_list = patient
                .medications
                .into_iter()
                .map(|mut med| {
                    if med.status == MedicationStatus::Taken {
                        med.status = MedicationStatus::Pending;
                    }
                    med
                })
                .collect();
            changed.push((patient.id, reset_list));
        }
    }

    let patients_updated = changed.len();
    store.commit_reset(user_id, &changed, today).await?;

    info!(patients = patients_updated, "daily medication reset committed");
    Ok(ResetOutcome {
        ran_today: true,
        patients_updated,
    })
}
