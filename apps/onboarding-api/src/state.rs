//! Estado compartilhado entre os handlers

use anyhow::Result;
use common_db::{ActivityLog, MemoryStore, PatientStore};
use onboarding_core::prefill::DocumentAnalyzer;
use onboarding_core::{
    CompletionWorkflow, Dashboard, OnboardingService, PrefillService, TableLocationAssigner,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::analyzer::{HttpDocumentAnalyzer, UnconfiguredAnalyzer};
use crate::config::{AnalyzerConfig, AppConfig, OnboardingConfig, StorageBackend};

/// Dependências compartilhadas pelos handlers
#[derive(Clone)]
pub struct AppState {
    pub onboarding: OnboardingService,
    pub completion: CompletionWorkflow,
    pub dashboard: Dashboard,
    pub activities: Arc<dyn ActivityLog>,
    pub prefill: PrefillService,
}

impl AppState {
    pub fn new(
        patients: Arc<dyn PatientStore>,
        activities: Arc<dyn ActivityLog>,
        onboarding: &OnboardingConfig,
        prefill: PrefillService,
    ) -> Self {
        let service = OnboardingService::new(patients.clone(), onboarding.settings());
        let assigner = Arc::new(TableLocationAssigner::new(onboarding.admission.clone()));

        Self {
            completion: CompletionWorkflow::new(service.clone(), assigner),
            dashboard: Dashboard::new(patients),
            onboarding: service,
            activities,
            prefill,
        }
    }

    /// Monta o estado a partir da configuração: backend de armazenamento e analisador
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let (patients, activities) = match config.storage {
            StorageBackend::Sqlite => {
                let store = Arc::new(common_db::open_sqlite_store(&config.database).await?);
                shared(store)
            }
            StorageBackend::Memory => {
                warn!("Armazenamento em memória: os dados serão perdidos ao reiniciar");
                shared(Arc::new(MemoryStore::new()))
            }
        };

        let prefill = build_prefill(&config.analyzer)?;
        Ok(Self::new(patients, activities, &config.onboarding, prefill))
    }
}

/// O mesmo backend atende pacientes e atividades
fn shared<S>(store: Arc<S>) -> (Arc<dyn PatientStore>, Arc<dyn ActivityLog>)
where
    S: PatientStore + ActivityLog + 'static,
{
    let patients: Arc<dyn PatientStore> = store.clone();
    let activities: Arc<dyn ActivityLog> = store;
    (patients, activities)
}

fn build_prefill(config: &AnalyzerConfig) -> Result<PrefillService> {
    let analyzer: Arc<dyn DocumentAnalyzer> = match &config.endpoint {
        Some(endpoint) => {
            info!(endpoint = %endpoint, "Pré-preenchimento por análise de documentos ativado");
            Arc::new(HttpDocumentAnalyzer::new(
                endpoint.clone(),
                config.api_key.clone(),
                config.timeout(),
            )?)
        }
        None => {
            info!("Nenhum provedor de análise configurado; pré-preenchimento desativado");
            Arc::new(UnconfiguredAnalyzer)
        }
    };

    Ok(PrefillService::new(
        analyzer,
        config.timeout(),
        config.min_confidence,
    ))
}
