//! Indicadores do dia para a equipe

use axum::extract::State;
use axum::Json;
use onboarding_core::DashboardStats;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn stats(State(state): State<AppState>) -> Result<Json<DashboardStats>, ApiError> {
    Ok(Json(state.dashboard.stats().await?))
}
