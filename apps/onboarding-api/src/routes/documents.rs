//! Envio de documentos para pré-preenchimento das etapas

use axum::extract::State;
use axum::Json;
use common_db::models::{ActivityAction, NewActivity};
use common_db::ActivityLog;
use onboarding_core::prefill::{DocumentInput, Prefill};
use onboarding_core::{parse_patient_id, InsuranceForm, PersonalInfoForm};
use serde::Deserialize;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    /// Paciente já cadastrado, quando o documento chega depois da etapa 1
    #[serde(default)]
    pub patient_id: Option<String>,
    #[serde(flatten)]
    pub document: DocumentInput,
    /// Valores já digitados; nunca são sobrescritos
    #[serde(default)]
    pub personal: PersonalInfoForm,
    #[serde(default)]
    pub insurance: InsuranceForm,
}

pub async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<Prefill>, ApiError> {
    let patient_id = match request.patient_id.as_deref() {
        Some(raw) => {
            let id = parse_patient_id(Some(raw))?;
            state.onboarding.get(id).await?;
            Some(id)
        }
        None => None,
    };

    let mime_type = request.document.mime_type.clone();
    let prefill = state
        .prefill
        .prefill(request.document, request.personal, request.insurance)
        .await;

    let outcome = if prefill.degraded {
        "análise indisponível"
    } else {
        "documento analisado"
    };
    state
        .activities
        .record(NewActivity::new(
            patient_id,
            ActivityAction::DocumentUploaded,
            format!("Documento enviado ({}): {}", mime_type, outcome),
        ))
        .await?;

    info!(?patient_id, degraded = prefill.degraded, "Documento recebido para pré-preenchimento");
    Ok(Json(prefill))
}
