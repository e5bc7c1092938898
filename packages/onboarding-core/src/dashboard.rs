//! Indicadores do painel da equipe, recalculados a cada leitura

use chrono::{NaiveDate, Utc};
use common_db::models::Patient;
use common_db::PatientStore;
use serde::Serialize;
use std::sync::Arc;

use crate::error::OnboardingError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// Pacientes criados hoje
    pub total_patients_today: u64,
    /// Pacientes com cadastro não concluído (qualquer data)
    pub pending_onboarding: u64,
    /// Pacientes do fluxo de emergência (qualquer data)
    pub emergency_cases: u64,
    /// Cadastros concluídos cuja última atualização foi hoje
    pub completed_today: u64,
}

/// Contagem pura sobre a lista de pacientes; `today` é a data UTC
pub fn compute(patients: &[Patient], today: NaiveDate) -> DashboardStats {
    let mut stats = DashboardStats::default();
    for patient in patients {
        if patient.created_at.date_naive() == today {
            stats.total_patients_today += 1;
        }
        if !patient.is_completed {
            stats.pending_onboarding += 1;
        }
        if patient.is_emergency {
            stats.emergency_cases += 1;
        }
        if patient.is_completed && patient.updated_at.date_naive() == today {
            stats.completed_today += 1;
        }
    }
    stats
}

#[derive(Clone)]
pub struct Dashboard {
    patients: Arc<dyn PatientStore>,
}

impl Dashboard {
    pub fn new(patients: Arc<dyn PatientStore>) -> Self {
        Self { patients }
    }

    pub async fn stats(&self) -> Result<DashboardStats, OnboardingError> {
        let patients = self.patients.list().await?;
        Ok(compute(&patients, Utc::now().date_naive()))
    }
}
