//! Execução das transições do cadastro contra o repositório de pacientes
//!
//! Ordem de cada submissão: identificador → validação do formulário → leitura do
//! paciente → máquina de estados → gravação (paciente + atividade, atômico).
//! Nada é gravado se qualquer passo anterior falhar.
//!
//! Duas submissões concorrentes para o mesmo paciente seguem "a última gravação
//! vence"; cada uma registra sua própria atividade.

use common_db::models::{
    ActivityAction, NewActivity, NewPatient, Patient, PatientChange, PatientId, PatientUpdate,
};
use common_db::PatientStore;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::error::{FieldErrors, OnboardingError};
use crate::forms::{InsuranceForm, MedicalForm, PersonalInfoForm};
use crate::machine::{self, OnboardingState, StepKind};

/// Regras configuráveis do cadastro
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OnboardingSettings {
    /// Exige nome e demais dados pessoais também no fluxo de emergência.
    /// Quando desligado, campos em branco recebem valores provisórios.
    pub collect_emergency_identity: bool,
}

impl Default for OnboardingSettings {
    fn default() -> Self {
        Self {
            collect_emergency_identity: true,
        }
    }
}

/// Converte o identificador recebido do cliente; ausente ou malformado
/// falha antes de qualquer acesso ao armazenamento
pub fn parse_patient_id(raw: Option<&str>) -> Result<PatientId, OnboardingError> {
    let raw = raw
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or(OnboardingError::MissingPatientId)?;
    Uuid::parse_str(raw).map_err(|_| OnboardingError::InvalidPatientId(raw.to_string()))
}

/// Serviço de cadastro
#[derive(Clone)]
pub struct OnboardingService {
    patients: Arc<dyn PatientStore>,
    settings: OnboardingSettings,
}

impl OnboardingService {
    pub fn new(patients: Arc<dyn PatientStore>, settings: OnboardingSettings) -> Self {
        Self { patients, settings }
    }

    pub async fn get(&self, id: PatientId) -> Result<Patient, OnboardingError> {
        Ok(self.patients.get(id).await?)
    }

    pub async fn list(&self) -> Result<Vec<Patient>, OnboardingError> {
        Ok(self.patients.list().await?)
    }

    fn prepare_personal(&self, form: PersonalInfoForm) -> Result<PersonalInfoForm, FieldErrors> {
        let mut form = form.normalized();
        if form.is_emergency && !self.settings.collect_emergency_identity {
            form = form.with_emergency_placeholders();
        }
        form.check()?;
        Ok(form)
    }

    /// Etapa 1. Sem `patient_id` cria o paciente; com ele, atualiza os dados pessoais.
    pub async fn submit_personal(
        &self,
        patient_id: Option<PatientId>,
        form: PersonalInfoForm,
    ) -> Result<Patient, OnboardingError> {
        let form = self.prepare_personal(form)?;
        let demographics = form.demographics()?;
        let emergency_contact = form.emergency_contact();

        let Some(id) = patient_id else {
            let name = demographics.full_name();
            let description = if form.is_emergency {
                format!("Novo paciente de emergência cadastrado: {}", name)
            } else {
                format!("Novo paciente cadastrado: {}", name)
            };

            let patient = self
                .patients
                .create(
                    NewPatient {
                        demographics,
                        emergency_contact,
                        is_emergency: form.is_emergency,
                        emergency_type: form.emergency_type.clone(),
                    },
                    NewActivity::system(ActivityAction::PatientCreated, description),
                )
                .await?;

            info!(
                patient_id = %patient.id,
                path = %patient.path(),
                "Paciente criado na etapa {}",
                patient.onboarding_step
            );
            return Ok(patient);
        };

        let current = self.patients.get(id).await?;
        let state = OnboardingState::of(&current);
        let next_step = machine::advance(&state, StepKind::Personal)?;
        machine::check_path_unchanged(&state, form.path())?;

        let description = format!("Dados pessoais atualizados: {}", demographics.full_name());
        let patient = self
            .patients
            .update(
                id,
                PatientUpdate {
                    onboarding_step: next_step,
                    change: PatientChange::Personal {
                        demographics,
                        emergency_contact,
                    },
                },
                NewActivity::for_patient(id, ActivityAction::PatientUpdated, description),
            )
            .await?;

        info!(patient_id = %id, "Dados pessoais atualizados (etapa {})", next_step);
        Ok(patient)
    }

    /// Etapa 2 (somente fluxo padrão)
    pub async fn submit_insurance(
        &self,
        patient_id: PatientId,
        form: InsuranceForm,
    ) -> Result<Patient, OnboardingError> {
        form.validate()?;

        let current = self.patients.get(patient_id).await?;
        let next_step = machine::advance(&OnboardingState::of(&current), StepKind::Insurance)?;

        let insurance = form.into_insurance();
        let description = format!(
            "Convênio informado para {}: {}",
            current.full_name(),
            insurance.provider
        );
        let patient = self
            .patients
            .update(
                patient_id,
                PatientUpdate {
                    onboarding_step: next_step,
                    change: PatientChange::Insurance(insurance),
                },
                NewActivity::for_patient(patient_id, ActivityAction::PatientUpdated, description),
            )
            .await?;

        info!(patient_id = %patient_id, "Convênio registrado (etapa {})", next_step);
        Ok(patient)
    }

    /// Etapa 3 (somente fluxo padrão). Todos os campos são opcionais.
    pub async fn submit_medical(
        &self,
        patient_id: PatientId,
        form: MedicalForm,
    ) -> Result<Patient, OnboardingError> {
        let current = self.patients.get(patient_id).await?;
        let next_step = machine::advance(&OnboardingState::of(&current), StepKind::Medical)?;

        let description = format!("Histórico médico atualizado: {}", current.full_name());
        let patient = self
            .patients
            .update(
                patient_id,
                PatientUpdate {
                    onboarding_step: next_step,
                    change: PatientChange::Medical(form.into_medical_info()),
                },
                NewActivity::for_patient(patient_id, ActivityAction::PatientUpdated, description),
            )
            .await?;

        info!(patient_id = %patient_id, "Histórico médico registrado (etapa {})", next_step);
        Ok(patient)
    }

    /// Transição terminal. Repetir a chamada é permitido: o estado final é o
    /// mesmo, mas cada chamada registra uma nova atividade.
    pub async fn complete(
        &self,
        patient_id: PatientId,
        admission_location: &str,
    ) -> Result<Patient, OnboardingError> {
        let location = admission_location.trim();
        if location.is_empty() {
            return Err(FieldErrors::single("admissionLocation", "campo obrigatório").into());
        }

        let current = self.patients.get(patient_id).await?;
        let description = format!(
            "Cadastro concluído: {} admitido(a) em {}",
            current.full_name(),
            location
        );
        let patient = self
            .patients
            .complete(
                patient_id,
                location,
                NewActivity::for_patient(patient_id, ActivityAction::OnboardingCompleted, description),
            )
            .await?;

        info!(
            patient_id = %patient_id,
            admission_location = %location,
            "Cadastro concluído"
        );
        Ok(patient)
    }
}
