//! Erros da API com respostas JSON estruturadas

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use onboarding_core::{OnboardingError, TransitionError};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::error;

/// Primeira etapa do assistente; o cliente volta para cá quando o paciente se perde
pub const FIRST_STEP_PATH: &str = "/onboarding/personal-info";

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<&'static str>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Onboarding(#[from] OnboardingError),

    /// Corpo da requisição ilegível ou com tipo errado
    #[error("Corpo inválido: {0}")]
    InvalidBody(String),
}

impl From<common_db::DbError> for ApiError {
    fn from(err: common_db::DbError) -> Self {
        ApiError::Onboarding(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = match self {
            ApiError::Onboarding(err) => err,
            ApiError::InvalidBody(detail) => {
                let body = ErrorBody {
                    error: ErrorDetail {
                        code: "INVALID_BODY",
                        message: detail,
                        fields: None,
                        redirect_to: None,
                    },
                };
                return (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response();
            }
        };
        let redirect_to = err.requires_restart().then_some(FIRST_STEP_PATH);

        let (status, code, message, fields) = match &err {
            OnboardingError::Validation(fields) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_FAILED",
                "Verifique os campos destacados".to_string(),
                Some(fields.0.clone()),
            ),
            OnboardingError::MissingPatientId | OnboardingError::InvalidPatientId(_) => (
                StatusCode::BAD_REQUEST,
                "INVALID_PATIENT_ID",
                err.to_string(),
                None,
            ),
            OnboardingError::NotFound(_) => {
                (StatusCode::NOT_FOUND, "PATIENT_NOT_FOUND", err.to_string(), None)
            }
            OnboardingError::Transition(transition) => {
                let code = match transition {
                    TransitionError::AlreadyCompleted => "ALREADY_COMPLETED",
                    TransitionError::StepNotOnPath { .. } => "STEP_NOT_ON_PATH",
                    TransitionError::StepOutOfOrder { .. } => "STEP_OUT_OF_ORDER",
                    TransitionError::PathChange { .. } => "PATH_CHANGE",
                };
                (StatusCode::CONFLICT, code, transition.to_string(), None)
            }
            OnboardingError::Persistence(source) => {
                error!(error = %source, "Falha de persistência na requisição");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "PERSISTENCE_FAILED",
                    "Não foi possível salvar os dados. Tente novamente.".to_string(),
                    None,
                )
            }
            OnboardingError::ExternalService(detail) => (
                StatusCode::BAD_GATEWAY,
                "EXTERNAL_SERVICE",
                detail.clone(),
                None,
            ),
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message,
                fields,
                redirect_to,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onboarding_core::FieldErrors;

    async fn body_of(response: Response) -> serde_json::Value {
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_validation_lists_fields() {
        let err = ApiError::from(OnboardingError::from(FieldErrors::single(
            "phone",
            "telefone deve ter ao menos 10 caracteres",
        )));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = body_of(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_FAILED");
        assert_eq!(
            body["error"]["fields"]["phone"],
            "telefone deve ter ao menos 10 caracteres"
        );
        assert!(body["error"].get("redirectTo").is_none());
    }

    #[tokio::test]
    async fn test_missing_patient_redirects_to_first_step() {
        let response = ApiError::from(OnboardingError::MissingPatientId).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_of(response).await["error"]["redirectTo"], FIRST_STEP_PATH);

        let response =
            ApiError::from(OnboardingError::NotFound("paciente x".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_of(response).await["error"]["redirectTo"], FIRST_STEP_PATH);
    }

    #[tokio::test]
    async fn test_transition_is_conflict() {
        let response =
            ApiError::from(OnboardingError::from(TransitionError::AlreadyCompleted)).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_of(response).await["error"]["code"], "ALREADY_COMPLETED");
    }

    #[tokio::test]
    async fn test_persistence_message_is_generic() {
        let err = ApiError::from(common_db::DbError::Unavailable("disco cheio".to_string()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = body_of(response).await;
        assert!(!body["error"]["message"].as_str().unwrap().contains("disco"));
    }

    #[tokio::test]
    async fn test_invalid_body_is_unprocessable() {
        let response = ApiError::InvalidBody("expected value".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = body_of(response).await;
        assert_eq!(body["error"]["code"], "INVALID_BODY");
        assert!(body["error"].get("redirectTo").is_none());
    }
}
