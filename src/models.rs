//! Core data model for CareControl.
//!
//! Field names on the wire keep the shape the original patient documents
//! used (camelCase, `medication`/`type` keys on medication records) so
//! existing client payloads deserialize unchanged.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Calendar dates are exchanged as plain `YYYY-MM-DD` strings.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Scheduled times of day are exchanged as `HH:MM` strings.
pub const TIME_FORMAT: &str = "%H:%M";

// ===== Medications =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MedicationStatus {
    Pending,
    Taken,
    Overdue,
}

/// A medication record embedded in its owning patient document.
///
/// `Overdue` is never persisted: the store only holds `pending`/`taken`,
/// and lateness is derived at read time by [`Medication::effective_status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medication {
    pub id: String,
    #[serde(rename = "medication")]
    pub name: String,
    pub dosage: String,
    /// Scheduled time of day, "HH:MM".
    pub time: String,
    #[serde(rename = "type")]
    pub status: MedicationStatus,
    #[serde(default)]
    pub instructions: String,
}

impl Medication {
    pub fn scheduled_time(&self) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(&self.time, TIME_FORMAT).ok()
    }

    /// Display status at `now`: a pending record whose scheduled time has
    /// passed reads as overdue. Unparseable times never go overdue.
    pub fn effective_status(&self, now: NaiveTime) -> MedicationStatus {
        match self.status {
            MedicationStatus::Taken => MedicationStatus::Taken,
            _ => match self.scheduled_time() {
                Some(scheduled) if scheduled < now => MedicationStatus::Overdue,
                _ => MedicationStatus::Pending,
            },
        }
    }
}

// ===== Patients =====

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vitals {
    #[serde(default)]
    pub heart_rate: String,
    #[serde(default)]
    pub temperature: String,
    #[serde(default)]
    pub blood_pressure: String,
    #[serde(default)]
    pub last_update: String,
}

/// A patient document, owned by exactly one user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    pub name: String,
    pub room: String,
    pub condition: String,
    pub age: u32,
    pub admission_date: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub vitals: Vitals,
    #[serde(default)]
    pub medications: Vec<Medication>,
    #[serde(default)]
    pub notes: String,
}

// ===== Request payloads =====

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewPatient {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "room is required"))]
    pub room: String,
    #[validate(length(min = 1, message = "condition is required"))]
    pub condition: String,
    pub age: u32,
    #[validate(length(min = 1, message = "admission date is required"))]
    pub admission_date: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub vitals: Vitals,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewMedication {
    #[serde(rename = "medication")]
    #[validate(length(min = 1, message = "medication name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "dosage is required"))]
    pub dosage: String,
    #[validate(custom = "validate_time_of_day")]
    pub time: String,
    #[serde(default)]
    pub instructions: Option<String>,
    /// Accepted for compatibility with older clients that computed a status
    /// at creation time; the stored record always starts out pending.
    #[serde(rename = "type", default)]
    pub status: Option<MedicationStatus>,
}

pub fn validate_time_of_day(value: &str) -> Result<(), ValidationError> {
    NaiveTime::parse_from_str(value, TIME_FORMAT)
        .map(|_| ())
        .map_err(|_| ValidationError::new("time_of_day"))
}

// ===== Operation results =====

/// Result of a daily reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetOutcome {
    pub ran_today: bool,
    pub patients_updated: usize,
}

/// Wire shape shared by the RPC-style endpoints and error responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub success: bool,
    pub message: String,
}
