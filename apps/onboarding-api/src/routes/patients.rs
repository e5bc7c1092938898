//! Etapas do assistente de cadastro

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use common_db::models::{Activity, Patient};
use common_db::ActivityLog;
use onboarding_core::{parse_patient_id, InsuranceForm, MedicalForm, PersonalInfoForm};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Patient>>, ApiError> {
    Ok(Json(state.onboarding.list().await?))
}

/// Etapa 1 sem paciente: cria o cadastro
pub async fn create(
    State(state): State<AppState>,
    Json(form): Json<PersonalInfoForm>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    let patient = state.onboarding.submit_personal(None, form).await?;
    Ok((StatusCode::CREATED, Json(patient)))
}

pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Patient>, ApiError> {
    let id = parse_patient_id(Some(&id))?;
    Ok(Json(state.onboarding.get(id).await?))
}

pub async fn update_personal(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(form): Json<PersonalInfoForm>,
) -> Result<Json<Patient>, ApiError> {
    let id = parse_patient_id(Some(&id))?;
    Ok(Json(state.onboarding.submit_personal(Some(id), form).await?))
}

pub async fn insurance(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(form): Json<InsuranceForm>,
) -> Result<Json<Patient>, ApiError> {
    let id = parse_patient_id(Some(&id))?;
    Ok(Json(state.onboarding.submit_insurance(id, form).await?))
}

pub async fn medical(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(form): Json<MedicalForm>,
) -> Result<Json<Patient>, ApiError> {
    let id = parse_patient_id(Some(&id))?;
    Ok(Json(state.onboarding.submit_medical(id, form).await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompleteRequest {
    /// Sem local informado, a conclusão escolhe pela tabela de admissão
    pub admission_location: Option<String>,
}

/// Corpo vazio significa "sem local"; qualquer outro corpo precisa ser JSON válido
fn parse_complete_request(headers: &HeaderMap, body: &[u8]) -> Result<CompleteRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(CompleteRequest::default());
    }

    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim_start().starts_with("application/json"))
        .unwrap_or(false);
    if !is_json {
        return Err(ApiError::InvalidBody(
            "corpo deve ser enviado como application/json".to_string(),
        ));
    }

    serde_json::from_slice(body).map_err(|e| ApiError::InvalidBody(e.to_string()))
}

pub async fn complete(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Patient>, ApiError> {
    let id = parse_patient_id(Some(&id))?;
    let request = parse_complete_request(&headers, &body)?;

    let location = request
        .admission_location
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty());
    let patient = match location {
        Some(location) => state.onboarding.complete(id, location).await?,
        None => state.completion.finish(id).await?,
    };
    Ok(Json(patient))
}

pub async fn activities(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Activity>>, ApiError> {
    let id = parse_patient_id(Some(&id))?;
    // 404 para paciente desconhecido em vez de lista vazia
    state.onboarding.get(id).await?;
    Ok(Json(state.activities.for_patient(id).await?))
}
