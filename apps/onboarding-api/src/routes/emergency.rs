//! Registro de envio de ambulâncias

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use common_db::models::{Activity, ActivityAction, NewActivity};
use common_db::ActivityLog;
use onboarding_core::{parse_patient_id, FieldErrors, OnboardingError};
use serde::Deserialize;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DispatchRequest {
    pub patient_id: Option<String>,
    /// Endereço ou referência do local de coleta
    pub pickup_location: String,
    pub emergency_type: Option<String>,
}

/// Registra o envio de uma ambulância no log de atividades
pub async fn dispatch(
    State(state): State<AppState>,
    Json(request): Json<DispatchRequest>,
) -> Result<(StatusCode, Json<Activity>), ApiError> {
    let pickup = request.pickup_location.trim();
    if pickup.is_empty() {
        return Err(OnboardingError::from(FieldErrors::single(
            "pickupLocation",
            "campo obrigatório",
        ))
        .into());
    }

    let patient_id = match request.patient_id.as_deref() {
        Some(raw) => {
            let id = parse_patient_id(Some(raw))?;
            state.onboarding.get(id).await?;
            Some(id)
        }
        None => None,
    };

    let description = match request
        .emergency_type
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        Some(kind) => format!("Ambulância enviada para {} ({})", pickup, kind),
        None => format!("Ambulância enviada para {}", pickup),
    };

    let activity = state
        .activities
        .record(NewActivity::new(
            patient_id,
            ActivityAction::AmbulanceDispatched,
            description,
        ))
        .await?;

    info!(activity_id = activity.id, ?patient_id, "Ambulância despachada");
    Ok((StatusCode::CREATED, Json(activity)))
}
