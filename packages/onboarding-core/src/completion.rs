//! Conclusão do cadastro: escolha do local de admissão e transição terminal

use common_db::models::{Patient, PatientId};
use rand::seq::SliceRandom;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::OnboardingError;
use crate::service::OnboardingService;

/// Estratégia de escolha do local de admissão
pub trait LocationAssigner: Send + Sync {
    fn assign(&self, is_emergency: bool, emergency_type: Option<&str>) -> String;
}

/// Tipos de emergência com unidade própria
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmergencyKind {
    Cardiac,
    Trauma,
    Pediatric,
}

impl FromStr for EmergencyKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cardiac" => Ok(EmergencyKind::Cardiac),
            "trauma" => Ok(EmergencyKind::Trauma),
            "pediatric" => Ok(EmergencyKind::Pediatric),
            _ => Err(()),
        }
    }
}

/// Tabela de locais de admissão
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdmissionTable {
    pub standard_location: String,
    pub cardiac_location: String,
    pub trauma_location: String,
    pub pediatric_location: String,
    /// Leitos genéricos usados quando o tipo de emergência não é reconhecido
    pub emergency_bays: Vec<String>,
}

impl Default for AdmissionTable {
    fn default() -> Self {
        Self {
            standard_location: "General Admission".to_string(),
            cardiac_location: "Cardiac Unit".to_string(),
            trauma_location: "Trauma Center".to_string(),
            pediatric_location: "Pediatric ER".to_string(),
            emergency_bays: vec![
                "Emergency Bay 1".to_string(),
                "Emergency Bay 2".to_string(),
                "Emergency Bay 3".to_string(),
            ],
        }
    }
}

impl AdmissionTable {
    pub fn location_for(&self, kind: EmergencyKind) -> &str {
        match kind {
            EmergencyKind::Cardiac => &self.cardiac_location,
            EmergencyKind::Trauma => &self.trauma_location,
            EmergencyKind::Pediatric => &self.pediatric_location,
        }
    }
}

/// Consulta determinística na tabela; sorteio entre os leitos de emergência
/// quando o tipo é desconhecido
pub struct TableLocationAssigner {
    table: AdmissionTable,
}

impl TableLocationAssigner {
    pub fn new(table: AdmissionTable) -> Self {
        Self { table }
    }
}

impl LocationAssigner for TableLocationAssigner {
    fn assign(&self, is_emergency: bool, emergency_type: Option<&str>) -> String {
        if !is_emergency {
            return self.table.standard_location.clone();
        }

        if let Some(kind) = emergency_type.and_then(|t| t.parse::<EmergencyKind>().ok()) {
            return self.table.location_for(kind).to_string();
        }

        debug!(?emergency_type, "Tipo de emergência sem unidade própria; sorteando leito");
        self.table
            .emergency_bays
            .choose(&mut rand::thread_rng())
            .cloned()
            // Sem leitos configurados o paciente segue para a admissão geral
            .unwrap_or_else(|| self.table.standard_location.clone())
    }
}

/// Fluxo de conclusão: lê o paciente, escolhe o local e conclui
#[derive(Clone)]
pub struct CompletionWorkflow {
    service: OnboardingService,
    assigner: Arc<dyn LocationAssigner>,
}

impl CompletionWorkflow {
    pub fn new(service: OnboardingService, assigner: Arc<dyn LocationAssigner>) -> Self {
        Self { service, assigner }
    }

    /// Local que seria atribuído ao paciente
    pub fn location_for(&self, patient: &Patient) -> String {
        self.assigner
            .assign(patient.is_emergency, patient.emergency_type.as_deref())
    }

    pub async fn finish(&self, patient_id: PatientId) -> Result<Patient, OnboardingError> {
        let patient = self.service.get(patient_id).await?;
        let location = self.location_for(&patient);
        info!(
            patient_id = %patient_id,
            path = %patient.path(),
            "Local de admissão escolhido: {}",
            location
        );
        self.service.complete(patient_id, &location).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::PersonalInfoForm;
    use crate::service::OnboardingSettings;
    use common_db::models::ActivityAction;
    use common_db::{ActivityLog, MemoryStore};

    fn assigner() -> TableLocationAssigner {
        TableLocationAssigner::new(AdmissionTable::default())
    }

    #[test]
    fn test_standard_patients_go_to_general_admission() {
        assert_eq!(assigner().assign(false, None), "General Admission");
        // Tipo de emergência é ignorado fora do fluxo de emergência
        assert_eq!(assigner().assign(false, Some("cardiac")), "General Admission");
    }

    #[test]
    fn test_emergency_lookup_is_case_insensitive() {
        let assigner = assigner();
        assert_eq!(assigner.assign(true, Some("cardiac")), "Cardiac Unit");
        assert_eq!(assigner.assign(true, Some("TRAUMA")), "Trauma Center");
        assert_eq!(assigner.assign(true, Some(" Pediatric ")), "Pediatric ER");
    }

    #[test]
    fn test_unknown_emergency_type_picks_a_bay() {
        let table = AdmissionTable::default();
        let assigner = TableLocationAssigner::new(table.clone());

        for emergency_type in [None, Some("burn"), Some("")] {
            let location = assigner.assign(true, emergency_type);
            assert!(table.emergency_bays.contains(&location), "{}", location);
        }
    }

    #[test]
    fn test_no_bays_falls_back_to_standard_location() {
        let assigner = TableLocationAssigner::new(AdmissionTable {
            emergency_bays: Vec::new(),
            ..Default::default()
        });
        assert_eq!(assigner.assign(true, Some("burn")), "General Admission");
    }

    #[tokio::test]
    async fn test_finish_appends_exactly_one_activity() {
        let store = MemoryStore::new();
        let service = OnboardingService::new(Arc::new(store.clone()), OnboardingSettings::default());
        let workflow = CompletionWorkflow::new(service.clone(), Arc::new(assigner()));

        let patient = service
            .submit_personal(
                None,
                PersonalInfoForm {
                    first_name: "Ana".to_string(),
                    last_name: "Souza".to_string(),
                    date_of_birth: "2015-06-30".to_string(),
                    phone: "11987654321".to_string(),
                    address: "Rua A, 10".to_string(),
                    is_emergency: true,
                    emergency_type: Some("pediatric".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let completed = workflow.finish(patient.id).await.unwrap();
        assert!(completed.is_completed);
        assert_eq!(completed.admission_location.as_deref(), Some("Pediatric ER"));
        assert_eq!(completed.onboarding_step, 2);

        let activities = store.for_patient(patient.id).await.unwrap();
        assert_eq!(activities.len(), 2);
        assert_eq!(activities[0].action, ActivityAction::OnboardingCompleted);
        assert!(activities[0].description.contains("Pediatric ER"));
    }

    #[tokio::test]
    async fn test_finish_unknown_patient() {
        let service = OnboardingService::new(Arc::new(MemoryStore::new()), OnboardingSettings::default());
        let workflow = CompletionWorkflow::new(service, Arc::new(assigner()));

        let err = workflow.finish(uuid::Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, OnboardingError::NotFound(_)));
    }
}
