//! Backend em memória, usado em testes e execuções locais

use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{attach_patient, ActivityLog, PatientStore};
use crate::error::{DbError, DbResult};
use crate::models::{Activity, NewActivity, NewPatient, Patient, PatientId, PatientUpdate};

#[derive(Debug, Default)]
struct Inner {
    /// Ordem de inserção (igual à ordem de criação)
    patients: Vec<Patient>,
    activities: Vec<Activity>,
    next_activity_id: i64,
    unavailable: bool,
}

impl Inner {
    fn ensure_available(&self) -> DbResult<()> {
        if self.unavailable {
            return Err(DbError::Unavailable("armazenamento em memória desligado".to_string()));
        }
        Ok(())
    }

    fn patient_mut(&mut self, id: PatientId) -> DbResult<&mut Patient> {
        self.patients
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| DbError::patient_not_found(id))
    }

    fn push_activity(&mut self, activity: NewActivity) -> Activity {
        self.next_activity_id += 1;
        let activity = activity.into_activity(self.next_activity_id, Utc::now());
        self.activities.push(activity.clone());
        activity
    }
}

/// Armazenamento em memória compartilhável (clones apontam para os mesmos dados).
///
/// Cada operação roda sob um único lock, então a mudança do paciente e a
/// atividade correspondente são aplicadas juntas.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| DbError::InternalError("lock do armazenamento envenenado".to_string()))
    }

    /// Simula indisponibilidade do armazenamento (toda operação falha)
    #[cfg(any(test, feature = "test-utils"))]
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.unavailable = unavailable;
        }
    }
}

#[async_trait]
impl PatientStore for MemoryStore {
    async fn get(&self, id: PatientId) -> DbResult<Patient> {
        let mut inner = self.lock()?;
        inner.ensure_available()?;
        inner.patient_mut(id).map(|p| p.clone())
    }

    async fn list(&self) -> DbResult<Vec<Patient>> {
        let inner = self.lock()?;
        inner.ensure_available()?;
        Ok(inner.patients.iter().rev().cloned().collect())
    }

    async fn create(&self, fields: NewPatient, activity: NewActivity) -> DbResult<Patient> {
        let mut inner = self.lock()?;
        inner.ensure_available()?;

        let patient = Patient::new(fields, Utc::now());
        inner.patients.push(patient.clone());
        inner.push_activity(attach_patient(activity, patient.id));
        Ok(patient)
    }

    async fn update(
        &self,
        id: PatientId,
        update: PatientUpdate,
        activity: NewActivity,
    ) -> DbResult<Patient> {
        let mut inner = self.lock()?;
        inner.ensure_available()?;

        let patient = inner.patient_mut(id)?;
        patient.apply(update, Utc::now());
        let patient = patient.clone();
        inner.push_activity(attach_patient(activity, id));
        Ok(patient)
    }

    async fn complete(
        &self,
        id: PatientId,
        admission_location: &str,
        activity: NewActivity,
    ) -> DbResult<Patient> {
        let mut inner = self.lock()?;
        inner.ensure_available()?;

        let patient = inner.patient_mut(id)?;
        patient.complete(admission_location, Utc::now());
        let patient = patient.clone();
        inner.push_activity(attach_patient(activity, id));
        Ok(patient)
    }
}

#[async_trait]
impl ActivityLog for MemoryStore {
    async fn record(&self, activity: NewActivity) -> DbResult<Activity> {
        let mut inner = self.lock()?;
        inner.ensure_available()?;
        Ok(inner.push_activity(activity))
    }

    async fn recent(&self, limit: u32) -> DbResult<Vec<Activity>> {
        let inner = self.lock()?;
        inner.ensure_available()?;
        Ok(inner
            .activities
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn for_patient(&self, patient_id: PatientId) -> DbResult<Vec<Activity>> {
        let inner = self.lock()?;
        inner.ensure_available()?;
        Ok(inner
            .activities
            .iter()
            .rev()
            .filter(|a| a.patient_id == Some(patient_id))
            .cloned()
            .collect())
    }
}
