//! Backend SQLite com dados identificáveis criptografados

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnection;
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, error};
use uuid::Uuid;

use super::{attach_patient, ActivityLog, PatientStore};
use crate::crypto::{EncryptedData, EncryptionKey, FieldCipher};
use crate::error::{DbError, DbResult};
use crate::models::{
    Activity, NewActivity, NewPatient, Patient, PatientDetails, PatientId, PatientUpdate,
};

const PATIENT_COLUMNS: &str = "id, created_at, updated_at, onboarding_step, is_completed, \
     is_emergency, emergency_type, admission_location, details_ciphertext, details_nonce";

/// Linha bruta da tabela `patients`
#[derive(Debug, FromRow)]
struct PatientRow {
    id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    onboarding_step: i32,
    is_completed: bool,
    is_emergency: bool,
    emergency_type: Option<String>,
    admission_location: Option<String>,
    details_ciphertext: Vec<u8>,
    details_nonce: Vec<u8>,
}

/// Repositório SQLite de pacientes e atividades
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    cipher: FieldCipher,
}

impl SqliteStore {
    /// O pool já deve estar migrado (ver [`crate::init_db_pool`])
    pub fn new(pool: SqlitePool, key: EncryptionKey) -> Self {
        Self {
            pool,
            cipher: FieldCipher::new(key),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn decode(&self, row: PatientRow) -> DbResult<Patient> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| DbError::QueryError(format!("id de paciente inválido {}: {}", row.id, e)))?;
        let details: PatientDetails = self.cipher.open(&EncryptedData {
            ciphertext: row.details_ciphertext,
            nonce: row.details_nonce,
        })?;

        Ok(Patient {
            id,
            demographics: details.demographics,
            emergency_contact: details.emergency_contact,
            insurance: details.insurance,
            medical: details.medical,
            onboarding_step: row.onboarding_step,
            is_completed: row.is_completed,
            is_emergency: row.is_emergency,
            emergency_type: row.emergency_type,
            admission_location: row.admission_location,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    async fn fetch_patient(conn: &mut SqliteConnection, id: PatientId) -> DbResult<PatientRow> {
        sqlx::query_as::<_, PatientRow>(&format!(
            "SELECT {} FROM patients WHERE id = ?",
            PATIENT_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| DbError::patient_not_found(id))
    }

    async fn insert_activity(
        conn: &mut SqliteConnection,
        activity: NewActivity,
        created_at: DateTime<Utc>,
    ) -> DbResult<Activity> {
        let result = sqlx::query(
            "INSERT INTO activities (patient_id, action, description, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(activity.patient_id.map(|id| id.to_string()))
        .bind(activity.action.as_str())
        .bind(&activity.description)
        .bind(created_at)
        .execute(conn)
        .await?;

        Ok(activity.into_activity(result.last_insert_rowid(), created_at))
    }

    /// Grava os campos mutáveis de um paciente já existente
    async fn write_patient(
        &self,
        conn: &mut SqliteConnection,
        patient: &Patient,
    ) -> DbResult<()> {
        let sealed = self.cipher.seal(&patient.details())?;

        sqlx::query(
            "UPDATE patients
             SET updated_at = ?, onboarding_step = ?, is_completed = ?, admission_location = ?,
                 details_ciphertext = ?, details_nonce = ?
             WHERE id = ?",
        )
        .bind(patient.updated_at)
        .bind(patient.onboarding_step)
        .bind(patient.is_completed)
        .bind(&patient.admission_location)
        .bind(&sealed.ciphertext)
        .bind(&sealed.nonce)
        .bind(patient.id.to_string())
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Reserva o lock de escrita antes de qualquer leitura da transação.
    ///
    /// Com WAL, uma transação que começa lendo não consegue promover o lock
    /// depois que outro escritor confirma (SQLITE_BUSY_SNAPSHOT).
    async fn claim_write_lock(conn: &mut SqliteConnection, id: PatientId) -> DbResult<()> {
        let result = sqlx::query("UPDATE patients SET updated_at = updated_at WHERE id = ?")
            .bind(id.to_string())
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::patient_not_found(id));
        }
        Ok(())
    }

    /// Lê, altera e grava o paciente junto com a atividade em uma transação
    async fn mutate<F>(&self, id: PatientId, activity: NewActivity, change: F) -> DbResult<Patient>
    where
        F: FnOnce(&mut Patient, DateTime<Utc>) + Send,
    {
        let mut tx = self.pool.begin().await?;

        Self::claim_write_lock(&mut tx, id).await?;
        let row = Self::fetch_patient(&mut tx, id).await?;
        let mut patient = self.decode(row)?;
        let now = Utc::now();
        change(&mut patient, now);

        self.write_patient(&mut tx, &patient).await?;
        Self::insert_activity(&mut tx, attach_patient(activity, id), now).await?;

        tx.commit().await.map_err(|e| {
            error!("Falha ao confirmar transação do paciente {}: {}", id, e);
            DbError::from(e)
        })?;

        debug!("Paciente {} atualizado para etapa {}", id, patient.onboarding_step);
        Ok(patient)
    }
}

#[async_trait]
impl PatientStore for SqliteStore {
    async fn get(&self, id: PatientId) -> DbResult<Patient> {
        let mut conn = self.pool.acquire().await?;
        let row = Self::fetch_patient(&mut conn, id).await?;
        self.decode(row)
    }

    async fn list(&self) -> DbResult<Vec<Patient>> {
        let rows = sqlx::query_as::<_, PatientRow>(&format!(
            "SELECT {} FROM patients ORDER BY created_at DESC, rowid DESC",
            PATIENT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|row| self.decode(row)).collect()
    }

    async fn create(&self, fields: NewPatient, activity: NewActivity) -> DbResult<Patient> {
        let patient = Patient::new(fields, Utc::now());
        let sealed = self.cipher.seal(&patient.details())?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO patients (id, created_at, updated_at, onboarding_step, is_completed,
                                   is_emergency, emergency_type, admission_location,
                                   details_ciphertext, details_nonce)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(patient.id.to_string())
        .bind(patient.created_at)
        .bind(patient.updated_at)
        .bind(patient.onboarding_step)
        .bind(patient.is_completed)
        .bind(patient.is_emergency)
        .bind(&patient.emergency_type)
        .bind(&patient.admission_location)
        .bind(&sealed.ciphertext)
        .bind(&sealed.nonce)
        .execute(&mut *tx)
        .await?;

        Self::insert_activity(&mut tx, attach_patient(activity, patient.id), patient.created_at)
            .await?;

        tx.commit().await?;
        Ok(patient)
    }

    async fn update(
        &self,
        id: PatientId,
        update: PatientUpdate,
        activity: NewActivity,
    ) -> DbResult<Patient> {
        self.mutate(id, activity, move |patient, now| patient.apply(update, now))
            .await
    }

    async fn complete(
        &self,
        id: PatientId,
        admission_location: &str,
        activity: NewActivity,
    ) -> DbResult<Patient> {
        let location = admission_location.to_string();
        self.mutate(id, activity, move |patient, now| patient.complete(&location, now))
            .await
    }
}

#[async_trait]
impl ActivityLog for SqliteStore {
    async fn record(&self, activity: NewActivity) -> DbResult<Activity> {
        let mut conn = self.pool.acquire().await?;
        Self::insert_activity(&mut conn, activity, Utc::now()).await
    }

    async fn recent(&self, limit: u32) -> DbResult<Vec<Activity>> {
        let activities = sqlx::query_as::<_, Activity>(
            "SELECT id, patient_id, action, description, created_at
             FROM activities ORDER BY id DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(activities)
    }

    async fn for_patient(&self, patient_id: PatientId) -> DbResult<Vec<Activity>> {
        let activities = sqlx::query_as::<_, Activity>(
            "SELECT id, patient_id, action, description, created_at
             FROM activities WHERE patient_id = ? ORDER BY id DESC",
        )
        .bind(patient_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(activities)
    }
}
