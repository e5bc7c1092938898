//! Feed das atividades recentes do painel

use axum::extract::{Query, State};
use axum::Json;
use common_db::models::Activity;
use common_db::ActivityLog;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<u32>,
}

impl RecentQuery {
    fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// Atividades mais recentes para o painel
pub async fn recent(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<Activity>>, ApiError> {
    Ok(Json(state.activities.recent(query.limit()).await?))
}
