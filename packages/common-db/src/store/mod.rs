//! Contratos de persistência de pacientes e da trilha de atividades
//!
//! Toda mutação de paciente recebe a atividade correspondente e a grava na mesma
//! unidade atômica: ou as duas ficam visíveis, ou nenhuma.
//! Os backends são injetados (`Arc<dyn PatientStore>`); não existe estado global.

use async_trait::async_trait;

use crate::error::DbResult;
use crate::models::{Activity, NewActivity, NewPatient, Patient, PatientId, PatientUpdate};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Repositório de pacientes
#[async_trait]
pub trait PatientStore: Send + Sync {
    /// Busca um paciente; id desconhecido resulta em `DbError::NotFound`
    async fn get(&self, id: PatientId) -> DbResult<Patient>;

    /// Lista todos os pacientes, mais recentes primeiro
    async fn list(&self) -> DbResult<Vec<Patient>>;

    /// Cria o paciente com id novo e ambos os timestamps preenchidos.
    ///
    /// A atividade recebe o id gerado quando não traz um paciente.
    async fn create(&self, fields: NewPatient, activity: NewActivity) -> DbResult<Patient>;

    /// Aplica a mudança de etapa e renova `updated_at`.
    ///
    /// Quando `activity.patient_id` é `None` ele é preenchido com `id`.
    async fn update(
        &self,
        id: PatientId,
        update: PatientUpdate,
        activity: NewActivity,
    ) -> DbResult<Patient>;

    /// Especialização de `update`: marca o cadastro concluído, grava o local de
    /// admissão e move o paciente para a etapa terminal do seu fluxo
    async fn complete(
        &self,
        id: PatientId,
        admission_location: &str,
        activity: NewActivity,
    ) -> DbResult<Patient>;
}

/// Log de atividades (somente inserção)
#[async_trait]
pub trait ActivityLog: Send + Sync {
    async fn record(&self, activity: NewActivity) -> DbResult<Activity>;

    /// Atividades mais recentes primeiro
    async fn recent(&self, limit: u32) -> DbResult<Vec<Activity>>;

    /// Atividades de um paciente, mais recentes primeiro
    async fn for_patient(&self, patient_id: PatientId) -> DbResult<Vec<Activity>>;
}

pub(crate) fn attach_patient(mut activity: NewActivity, id: PatientId) -> NewActivity {
    if activity.patient_id.is_none() {
        activity.patient_id = Some(id);
    }
    activity
}
