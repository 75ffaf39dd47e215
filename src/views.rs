//! Read-side projections of the patient list.
//!
//! Pure functions over the loaded patient documents; statuses shown here are
//! always derived through `effective_status`, so a pending record past its
//! scheduled time reads as overdue without ever being stored that way.

use chrono::NaiveTime;
use serde::Serialize;

use crate::models::{MedicationStatus, Patient};

#[derive(Debug, Clone, Serialize)]
pub struct PatientSummary {
    pub id: String,
    pub name: String,
    pub room: String,
    pub avatar: String,
    pub condition: String,
}

/// A medication joined with its owning patient's display attributes.
#[derive(Debug, Clone, Serialize)]
pub struct Reminder {
    pub id: String,
    pub medication: String,
    pub dosage: String,
    pub time: String,
    #[serde(rename = "type")]
    pub status: MedicationStatus,
    pub instructions: String,
    pub patient: PatientSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MedicationStats {
    pub total: usize,
    pub taken: usize,
    pub pending: usize,
    pub overdue: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HomeView {
    pub patient_count: usize,
    pub stats: MedicationStats,
    pub reminders: Vec<Reminder>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryView {
    pub stats: MedicationStats,
    /// Medications marked taken today, in patient order.
    pub administered: Vec<Reminder>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleSlot {
    pub hour: String,
    pub entries: Vec<Reminder>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleView {
    pub slots: Vec<ScheduleSlot>,
}

fn summary(patient: &Patient) -> PatientSummary {
    PatientSummary {
        id: patient.id.clone(),
        name: patient.name.clone(),
        room: patient.room.clone(),
        avatar: patient.avatar.clone(),
        condition: patient.condition.clone(),
    }
}

/// Every medication of every patient, joined with its patient summary.
pub fn reminders(patients: &[Patient], now: NaiveTime) -> Vec<Reminder> {
    patients
        .iter()
        .flat_map(|patient| {
            patient.medications.iter().map(|med| Reminder {
                id: med.id.clone(),
                medication: med.name.clone(),
                dosage: med.dosage.clone(),
                time: med.time.clone(),
                status: med.effective_status(now),
                instructions: med.instructions.clone(),
                patient: summary(patient),
            })
        })
        .collect()
}

pub fn medication_stats(patients: &[Patient], now: NaiveTime) -> MedicationStats {
    let mut stats = MedicationStats {
        total: 0,
        taken: 0,
        pending: 0,
        overdue: 0,
    };
    for patient in patients {
        for med in &patient.medications {
            stats.total += 1;
            match med.effective_status(now) {
                MedicationStatus::Taken => stats.taken += 1,
                MedicationStatus::Pending => stats.pending += 1,
                MedicationStatus::Overdue => stats.overdue += 1,
            }
        }
    }
    stats
}

pub fn home_view(patients: &[Patient], now: NaiveTime) -> HomeView {
    HomeView {
        patient_count: patients.len(),
        stats: medication_stats(patients, now),
        reminders: reminders(patients, now),
    }
}

pub fn history_view(patients: &[Patient], now: NaiveTime) -> HistoryView {
    let administered = reminders(patients, now)
        .into_iter()
        .filter(|r| r.status == MedicationStatus::Taken)
        .collect();
    HistoryView {
        stats: medication_stats(patients, now),
        administered,
    }
}

/// The day's medications sorted by scheduled time and grouped by hour.
/// Unparseable times sort last under their literal hour prefix.
pub fn schedule_view(patients: &[Patient], now: NaiveTime) -> ScheduleView {
    let mut entries = reminders(patients, now);
    entries.sort_by_key(|r| {
        NaiveTime::parse_from_str(&r.time, crate::models::TIME_FORMAT)
            .ok()
            .map_or((1, NaiveTime::MIN), |t| (0, t))
    });

    let mut slots: Vec<ScheduleSlot> = Vec::new();
    for entry in entries {
        let hour = entry
            .time
            .split(':')
            .next()
            .unwrap_or(&entry.time)
            .to_string();
        match slots.last_mut() {
            Some(slot) if slot.hour == hour => slot.entries.push(entry),
            _ => slots.push(ScheduleSlot {
                hour,
                entries: vec![entry],
            }),
        }
    }

    ScheduleView { slots }
}
