//! Verificação de saúde do serviço

use axum::Json;
use serde::Serialize;

use crate::built_info;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: built_info::PKG_NAME,
        version: built_info::PKG_VERSION,
    })
}
