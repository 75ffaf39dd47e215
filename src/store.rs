//! SQLite-backed document store for patient records.
//!
//! Patient documents keep their embedded shape: scalar display attributes as
//! columns, the vitals snapshot and the medication list as JSON text. The
//! store supplies the three primitives the rest of the service builds on:
//! single-document read/write, an atomic multi-document batch commit for the
//! daily reset, and a live change subscription.

use chrono::NaiveDate;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument};

use crate::error::{AppError, AppResult};
use crate::models::{Medication, Patient, Vitals, DATE_FORMAT};

/// Published on the change channel after every committed mutation.
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    Patients { user_id: String },
}

pub struct CareStore {
    pool: SqlitePool,
    events: broadcast::Sender<ChangeEvent>,
}

impl CareStore {
    pub async fn connect(url: &str) -> AppResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;
        Self::with_pool(pool).await
    }

    /// Build a store over an existing pool. Used directly by tests with an
    /// in-memory database.
    pub async fn with_pool(pool: SqlitePool) -> AppResult<Self> {
        Self::init_schema(&pool).await?;
        let (events, _) = broadcast::channel(64);
        Ok(Self { pool, events })
    }

    async fn init_schema(pool: &SqlitePool) -> AppResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS patients (
                user_id TEXT NOT NULL,
                id TEXT NOT NULL,
                name TEXT NOT NULL,
                room TEXT NOT NULL,
                condition TEXT NOT NULL,
                age INTEGER NOT NULL,
                admission_date TEXT NOT NULL,
                avatar TEXT NOT NULL,
                vitals TEXT NOT NULL,
                medications TEXT NOT NULL,
                notes TEXT NOT NULL,
                PRIMARY KEY (user_id, id)
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS reset_tracker (
                user_id TEXT PRIMARY KEY,
                last_reset_date TEXT NOT NULL
            )",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Subscribe to committed changes. Dropping the receiver releases the
    /// subscription.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    fn publish(&self, user_id: &str) {
        // Nobody listening is fine.
        let _ = self.events.send(ChangeEvent::Patients {
            user_id: user_id.to_owned(),
        });
    }

    // ===== Patients =====

    #[instrument(skip(self), fields(user = %user_id))]
    pub async fn list_patients(&self, user_id: &str) -> AppResult<Vec<Patient>> {
        let rows = sqlx::query("SELECT * FROM patients WHERE user_id = ? ORDER BY name")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(patient_from_row).collect()
    }

    #[instrument(skip(self), fields(user = %user_id, patient = %patient_id))]
    pub async fn get_patient(
        &self,
        user_id: &str,
        patient_id: &str,
    ) -> AppResult<Option<Patient>> {
        let row = sqlx::query("SELECT * FROM patients WHERE user_id = ? AND id = ?")
            .bind(user_id)
            .bind(patient_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(patient_from_row).transpose()
    }

    #[instrument(skip(self, patient), fields(user = %user_id, patient = %patient.id))]
    pub async fn create_patient(&self, user_id: &str, patient: &Patient) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO patients (
                user_id, id, name, room, condition, age,
                admission_date, avatar, vitals, medications, notes
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(&patient.id)
        .bind(&patient.name)
        .bind(&patient.room)
        .bind(&patient.condition)
        .bind(i64::from(patient.age))
        .bind(&patient.admission_date)
        .bind(&patient.avatar)
        .bind(serde_json::to_string(&patient.vitals)?)
        .bind(serde_json::to_string(&patient.medications)?)
        .bind(&patient.notes)
        .execute(&self.pool)
        .await?;

        info!("patient record created");
        self.publish(user_id);
        Ok(())
    }

    /// Hard delete of the whole patient document. Deleting an already absent
    /// document succeeds, matching the storage collaborator it replaces.
    #[instrument(skip(self), fields(user = %user_id, patient = %patient_id))]
    pub async fn delete_patient(&self, user_id: &str, patient_id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM patients WHERE user_id = ? AND id = ?")
            .bind(user_id)
            .bind(patient_id)
            .execute(&self.pool)
            .await?;

        let removed = result.rows_affected() > 0;
        if removed {
            info!("patient record deleted");
            self.publish(user_id);
        }
        Ok(removed)
    }

    /// Full-list write-back of a patient's embedded medications.
    /// Last-write-wins: there is no concurrency token on the document.
    #[instrument(skip(self, medications), fields(user = %user_id, patient = %patient_id))]
    pub async fn put_medications(
        &self,
        user_id: &str,
        patient_id: &str,
        medications: &[Medication],
    ) -> AppResult<bool> {
        let result = sqlx::query("UPDATE patients SET medications = ? WHERE user_id = ? AND id = ?")
            .bind(serde_json::to_string(medications)?)
            .bind(user_id)
            .bind(patient_id)
            .execute(&self.pool)
            .await?;

        let updated = result.rows_affected() > 0;
        if updated {
            debug!(count = medications.len(), "medication list written");
            self.publish(user_id);
        }
        Ok(updated)
    }

    // ===== Reset tracker =====

    /// Last reconciliation date for the user, as stored (`YYYY-MM-DD`), or
    /// `None` if reconciliation never ran.
    #[instrument(skip(self), fields(user = %user_id))]
    pub async fn get_last_reset(&self, user_id: &str) -> AppResult<Option<String>> {
        let row = sqlx::query("SELECT last_reset_date FROM reset_tracker WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.try_get::<String, _>("last_reset_date"))
            .transpose()
            .map_err(Into::into)
    }

    /// Commit a daily reset as one all-or-nothing batch: every changed
    /// patient's medication list plus the tracker advance land in a single
    /// transaction, so a failure retains no partial state.
    #[instrument(skip(self, changed), fields(user = %user_id, patients = changed.len()))]
    pub async fn commit_reset(
        &self,
        user_id: &str,
        changed: &[(String, Vec<Medication>)],
        today: NaiveDate,
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        for (patient_id, medications) in changed {
            sqlx::query("UPDATE patients SET medications = ? WHERE user_id = ? AND id = ?")
                .bind(serde_json::to_string(medications)?)
                .bind(user_id)
                .bind(patient_id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            "INSERT INTO reset_tracker (user_id, last_reset_date) VALUES (?, ?)
             ON CONFLICT(user_id) DO UPDATE SET last_reset_date = excluded.last_reset_date",
        )
        .bind(user_id)
        .bind(today.format(DATE_FORMAT).to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if !changed.is_empty() {
            self.publish(user_id);
        }
        Ok(())
    }
}

fn patient_from_row(row: &SqliteRow) -> AppResult<Patient> {
    let vitals_json: String = row.try_get("vitals")?;
    let medications_json: String = row.try_get("medications")?;
    let vitals: Vitals = serde_json::from_str(&vitals_json)?;
    let medications: Vec<Medication> = serde_json::from_str(&medications_json)?;
    let age = u32::try_from(row.try_get::<i64, _>("age")?)
        .map_err(|_| AppError::MalformedDocument("age out of range".into()))?;

    Ok(Patient {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        room: row.try_get("room")?,
        condition: row.try_get("condition")?,
        age,
        admission_date: row.try_get("admission_date")?,
        avatar: row.try_get("avatar")?,
        vitals,
        medications,
        notes: row.try_get("notes")?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::MedicationStatus;

    pub(crate) async fn memory_store() -> CareStore {
        let (store, _) = memory_store_with_pool().await;
        store
    }

    /// Keeps a handle on the pool so tests can sabotage the schema
    /// underneath the store.
    pub(crate) async fn memory_store_with_pool() -> (CareStore, SqlitePool) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = CareStore::with_pool(pool.clone()).await.unwrap();
        (store, pool)
    }

    pub(crate) fn sample_patient(id: &str) -> Patient {
        Patient {
            id: id.into(),
            name: "Daniel Torres".into(),
            room: "204".into(),
            condition: "Estable".into(),
            age: 67,
            admission_date: "2024-01-15".into(),
            avatar: String::new(),
            vitals: Vitals {
                heart_rate: "72 bpm".into(),
                temperature: "36.8°C".into(),
                blood_pressure: "120/80".into(),
                last_update: "08:00".into(),
            },
            medications: vec![],
            notes: "Sin observaciones".into(),
        }
    }

    pub(crate) fn sample_medication(id: &str, status: MedicationStatus) -> Medication {
        Medication {
            id: id.into(),
            name: "Omeprazol".into(),
            dosage: "20mg".into(),
            time: "07:30".into(),
            status,
            instructions: String::new(),
        }
    }

    #[tokio::test]
    async fn create_and_read_back_roundtrips_the_document() {
        let store = memory_store().await;
        let mut patient = sample_patient("p1");
        patient.medications = vec![sample_medication("m1", MedicationStatus::Pending)];

        store.create_patient("u1", &patient).await.unwrap();

        let loaded = store.get_patient("u1", "p1").await.unwrap().unwrap();
        assert_eq!(loaded, patient);
    }

    #[tokio::test]
    async fn patients_are_scoped_to_their_owner() {
        let store = memory_store().await;
        store
            .create_patient("u1", &sample_patient("p1"))
            .await
            .unwrap();

        assert!(store.get_patient("u2", "p1").await.unwrap().is_none());
        assert!(store.list_patients("u2").await.unwrap().is_empty());
        assert_eq!(store.list_patients("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn put_medications_reports_missing_patient() {
        let store = memory_store().await;
        let updated = store.put_medications("u1", "ghost", &[]).await.unwrap();
        assert!(!updated);
    }

    #[tokio::test]
    async fn commit_reset_advances_tracker_and_writes_lists() {
        let store = memory_store().await;
        let mut patient = sample_patient("p1");
        patient.medications = vec![sample_medication("m1", MedicationStatus::Taken)];
        store.create_patient("u1", &patient).await.unwrap();

        assert_eq!(store.get_last_reset("u1").await.unwrap(), None);

        let reset = vec![(
            "p1".to_string(),
            vec![sample_medication("m1", MedicationStatus::Pending)],
        )];
        let today = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        store.commit_reset("u1", &reset, today).await.unwrap();

        assert_eq!(
            store.get_last_reset("u1").await.unwrap().as_deref(),
            Some("2024-01-02")
        );
        let loaded = store.get_patient("u1", "p1").await.unwrap().unwrap();
        assert_eq!(loaded.medications[0].status, MedicationStatus::Pending);

        // Upsert path: a later commit just moves the date forward.
        let next = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        store.commit_reset("u1", &[], next).await.unwrap();
        assert_eq!(
            store.get_last_reset("u1").await.unwrap().as_deref(),
            Some("2024-01-03")
        );
    }

    #[tokio::test]
    async fn failed_commit_reset_retains_no_partial_state() {
        let (store, pool) = memory_store_with_pool().await;
        let mut patient = sample_patient("p1");
        patient.medications = vec![sample_medication("m1", MedicationStatus::Taken)];
        store.create_patient("u1", &patient).await.unwrap();

        // Block the patient write so the batch fails mid-transaction.
        sqlx::query(
            "CREATE TRIGGER block_patient_updates BEFORE UPDATE ON patients
             BEGIN SELECT RAISE(ABORT, 'update blocked'); END",
        )
        .execute(&pool)
        .await
        .unwrap();

        let reset = vec![(
            "p1".to_string(),
            vec![sample_medication("m1", MedicationStatus::Pending)],
        )];
        let today = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let err = store.commit_reset("u1", &reset, today).await.unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));

        // Neither half of the batch landed.
        assert_eq!(store.get_last_reset("u1").await.unwrap(), None);
        let loaded = store.get_patient("u1", "p1").await.unwrap().unwrap();
        assert_eq!(loaded.medications[0].status, MedicationStatus::Taken);
    }

    #[tokio::test]
    async fn corrupt_age_surfaces_as_malformed_document() {
        let (store, pool) = memory_store_with_pool().await;
        sqlx::query(
            "INSERT INTO patients (
                user_id, id, name, room, condition, age,
                admission_date, avatar, vitals, medications, notes
            ) VALUES ('u1', 'p1', 'X', '1', 'Estable', -5, '2024-01-15', '', '{}', '[]', '')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let err = store.get_patient("u1", "p1").await.unwrap_err();
        assert!(matches!(err, AppError::MalformedDocument(_)));
    }

    #[tokio::test]
    async fn mutations_publish_change_events() {
        let store = memory_store().await;
        let mut rx = store.subscribe();

        store
            .create_patient("u1", &sample_patient("p1"))
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            ChangeEvent::Patients { user_id } => assert_eq!(user_id, "u1"),
        }
    }
}
