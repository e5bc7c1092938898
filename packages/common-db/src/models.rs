//! Modelos de dados compartilhados entre aplicações
//!
//! Este módulo define o paciente em cadastro, as mudanças permitidas por etapa
//! e os registros de atividade (trilha de auditoria).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use std::str::FromStr;
use uuid::Uuid;

/// Identificador opaco de paciente
pub type PatientId = Uuid;

/// Etapa de dados pessoais (comum aos dois fluxos)
pub const STEP_PERSONAL: i32 = 1;
/// Etapa de convênio (somente fluxo padrão)
pub const STEP_INSURANCE: i32 = 2;
/// Etapa de histórico médico (somente fluxo padrão)
pub const STEP_MEDICAL: i32 = 3;

/// Fluxo de cadastro escolhido na criação do paciente
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingPath {
    /// Dados pessoais → convênio → histórico médico → concluído
    Standard,
    /// Dados pessoais/tipo de emergência → concluído
    Emergency,
}

impl OnboardingPath {
    pub fn from_emergency_flag(is_emergency: bool) -> Self {
        if is_emergency {
            OnboardingPath::Emergency
        } else {
            OnboardingPath::Standard
        }
    }

    /// Etapa terminal (cadastro concluído)
    pub fn terminal_step(self) -> i32 {
        match self {
            OnboardingPath::Standard => 4,
            OnboardingPath::Emergency => 2,
        }
    }

    /// Última etapa de coleta de dados antes da conclusão
    pub fn pre_terminal_step(self) -> i32 {
        self.terminal_step() - 1
    }
}

impl std::fmt::Display for OnboardingPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OnboardingPath::Standard => write!(f, "standard"),
            OnboardingPath::Emergency => write!(f, "emergency"),
        }
    }
}

/// Dados pessoais obrigatórios após a etapa 1
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Demographics {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub phone: String,
    pub address: String,
}

impl Demographics {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Contato de emergência (opcional)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyContact {
    pub name: String,
    pub relationship: String,
    pub phone: String,
}

/// Situação do convênio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsuranceStatus {
    Verified,
    Pending,
}

/// Dados do convênio (somente no fluxo padrão)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insurance {
    pub provider: String,
    pub policy_number: String,
    pub group_number: Option<String>,
    pub status: InsuranceStatus,
}

/// Histórico médico estruturado
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MedicalHistory {
    pub conditions: Vec<String>,
    pub surgeries: Vec<String>,
    pub family_history: Vec<String>,
}

/// Informações médicas (todas opcionais)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalInfo {
    pub allergies: Option<String>,
    pub medications: Option<String>,
    pub medical_history: Option<MedicalHistory>,
}

/// Parte criptografada do registro do paciente
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientDetails {
    pub demographics: Demographics,
    pub emergency_contact: Option<EmergencyContact>,
    pub insurance: Option<Insurance>,
    pub medical: Option<MedicalInfo>,
}

/// Paciente em processo de cadastro
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: PatientId,
    #[serde(flatten)]
    pub demographics: Demographics,
    pub emergency_contact: Option<EmergencyContact>,
    pub insurance: Option<Insurance>,
    pub medical: Option<MedicalInfo>,
    /// Etapa atual do assistente
    pub onboarding_step: i32,
    pub is_completed: bool,
    /// Definido na criação e nunca alterado
    pub is_emergency: bool,
    /// Tipo de emergência informado na criação (cardiac, trauma, ...)
    pub emergency_type: Option<String>,
    /// Local de admissão, definido somente na conclusão
    pub admission_location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    /// Cria um paciente novo na etapa 1
    pub fn new(fields: NewPatient, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            demographics: fields.demographics,
            emergency_contact: fields.emergency_contact,
            insurance: None,
            medical: None,
            onboarding_step: STEP_PERSONAL,
            is_completed: false,
            is_emergency: fields.is_emergency,
            emergency_type: fields.emergency_type,
            admission_location: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn path(&self) -> OnboardingPath {
        OnboardingPath::from_emergency_flag(self.is_emergency)
    }

    pub fn full_name(&self) -> String {
        self.demographics.full_name()
    }

    /// Aplica uma mudança de etapa. Somente os campos da etapa são tocados.
    pub fn apply(&mut self, update: PatientUpdate, now: DateTime<Utc>) {
        match update.change {
            PatientChange::Personal {
                demographics,
                emergency_contact,
            } => {
                self.demographics = demographics;
                self.emergency_contact = emergency_contact;
            }
            PatientChange::Insurance(insurance) => self.insurance = Some(insurance),
            PatientChange::Medical(medical) => self.medical = Some(medical),
        }
        self.onboarding_step = update.onboarding_step;
        self.updated_at = now;
    }

    /// Marca o cadastro como concluído no local de admissão informado
    pub fn complete(&mut self, admission_location: &str, now: DateTime<Utc>) {
        self.is_completed = true;
        self.admission_location = Some(admission_location.to_string());
        self.onboarding_step = self.path().terminal_step();
        self.updated_at = now;
    }

    pub fn details(&self) -> PatientDetails {
        PatientDetails {
            demographics: self.demographics.clone(),
            emergency_contact: self.emergency_contact.clone(),
            insurance: self.insurance.clone(),
            medical: self.medical.clone(),
        }
    }
}

/// Campos necessários para criar um paciente
#[derive(Debug, Clone, PartialEq)]
pub struct NewPatient {
    pub demographics: Demographics,
    pub emergency_contact: Option<EmergencyContact>,
    pub is_emergency: bool,
    pub emergency_type: Option<String>,
}

/// Conjunto fechado de campos alteráveis por etapa.
///
/// Nenhuma variante altera `is_completed`, `admission_location` ou `is_emergency`;
/// esses campos só mudam na criação ou na conclusão.
#[derive(Debug, Clone, PartialEq)]
pub enum PatientChange {
    Personal {
        demographics: Demographics,
        emergency_contact: Option<EmergencyContact>,
    },
    Insurance(Insurance),
    Medical(MedicalInfo),
}

/// Mudança de etapa com a nova posição no assistente
#[derive(Debug, Clone, PartialEq)]
pub struct PatientUpdate {
    pub onboarding_step: i32,
    pub change: PatientChange,
}

/// Tipos de atividade registrados na trilha de auditoria
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    PatientCreated,
    PatientUpdated,
    DocumentUploaded,
    OnboardingCompleted,
    AmbulanceDispatched,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::PatientCreated => "patient_created",
            ActivityAction::PatientUpdated => "patient_updated",
            ActivityAction::DocumentUploaded => "document_uploaded",
            ActivityAction::OnboardingCompleted => "onboarding_completed",
            ActivityAction::AmbulanceDispatched => "ambulance_dispatched",
        }
    }
}

impl std::fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient_created" => Ok(ActivityAction::PatientCreated),
            "patient_updated" => Ok(ActivityAction::PatientUpdated),
            "document_uploaded" => Ok(ActivityAction::DocumentUploaded),
            "onboarding_completed" => Ok(ActivityAction::OnboardingCompleted),
            "ambulance_dispatched" => Ok(ActivityAction::AmbulanceDispatched),
            other => Err(format!("Valor de ação inválido: {}", other)),
        }
    }
}

/// Registro imutável de auditoria
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    /// Sequencial atribuído pelo log (ordem de inserção)
    pub id: i64,
    /// Paciente relacionado; `None` para atividades do sistema
    pub patient_id: Option<PatientId>,
    pub action: ActivityAction,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl FromRow<'_, SqliteRow> for Activity {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let patient_id = row
            .try_get::<Option<String>, _>("patient_id")?
            .map(|raw| {
                Uuid::parse_str(&raw).map_err(|e| sqlx::Error::ColumnDecode {
                    index: String::from("patient_id"),
                    source: Box::new(e),
                })
            })
            .transpose()?;

        let action: String = row.try_get("action")?;
        let action: ActivityAction = action.parse().map_err(|msg: String| sqlx::Error::ColumnDecode {
            index: String::from("action"),
            source: Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, msg)),
        })?;

        Ok(Self {
            id: row.try_get("id")?,
            patient_id,
            action,
            description: row.try_get("description")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Atividade a ser registrada
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActivity {
    pub patient_id: Option<PatientId>,
    pub action: ActivityAction,
    pub description: String,
}

impl NewActivity {
    pub fn new(
        patient_id: Option<PatientId>,
        action: ActivityAction,
        description: impl Into<String>,
    ) -> Self {
        Self {
            patient_id,
            action,
            description: description.into(),
        }
    }

    /// Atividade ligada a um paciente
    pub fn for_patient(
        patient_id: PatientId,
        action: ActivityAction,
        description: impl Into<String>,
    ) -> Self {
        Self::new(Some(patient_id), action, description)
    }

    /// Atividade de sistema, sem paciente
    pub fn system(action: ActivityAction, description: impl Into<String>) -> Self {
        Self::new(None, action, description)
    }

    pub(crate) fn into_activity(self, id: i64, created_at: DateTime<Utc>) -> Activity {
        Activity {
            id,
            patient_id: self.patient_id,
            action: self.action,
            description: self.description,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demographics() -> Demographics {
        Demographics {
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            phone: "5551234567".to_string(),
            address: "1 Main St".to_string(),
        }
    }

    #[test]
    fn test_terminal_steps_per_path() {
        assert_eq!(OnboardingPath::Standard.terminal_step(), 4);
        assert_eq!(OnboardingPath::Standard.pre_terminal_step(), STEP_MEDICAL);
        assert_eq!(OnboardingPath::Emergency.terminal_step(), 2);
        assert_eq!(OnboardingPath::Emergency.pre_terminal_step(), STEP_PERSONAL);
    }

    #[test]
    fn test_complete_moves_to_terminal_step() {
        let now = Utc::now();
        let mut patient = Patient::new(
            NewPatient {
                demographics: demographics(),
                emergency_contact: None,
                is_emergency: true,
                emergency_type: Some("trauma".to_string()),
            },
            now,
        );

        patient.complete("Trauma Center", now);
        assert!(patient.is_completed);
        assert_eq!(patient.onboarding_step, 2);
        assert_eq!(patient.admission_location.as_deref(), Some("Trauma Center"));
    }

    #[test]
    fn test_patient_serializes_camel_case_flat_demographics() {
        let patient = Patient::new(
            NewPatient {
                demographics: demographics(),
                emergency_contact: None,
                is_emergency: false,
                emergency_type: None,
            },
            Utc::now(),
        );

        let json = serde_json::to_value(&patient).unwrap();
        assert_eq!(json["firstName"], "Jane");
        assert_eq!(json["dateOfBirth"], "1990-01-01");
        assert_eq!(json["onboardingStep"], 1);
        assert_eq!(json["isCompleted"], false);
    }

    #[test]
    fn test_activity_action_parse() {
        for action in [
            ActivityAction::PatientCreated,
            ActivityAction::PatientUpdated,
            ActivityAction::DocumentUploaded,
            ActivityAction::OnboardingCompleted,
            ActivityAction::AmbulanceDispatched,
        ] {
            assert_eq!(action.as_str().parse::<ActivityAction>(), Ok(action));
        }
        assert!("patient_deleted".parse::<ActivityAction>().is_err());
    }
}
