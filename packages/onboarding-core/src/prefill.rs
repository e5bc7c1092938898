//! Pré-preenchimento de formulários a partir de documentos
//!
//! O serviço de análise é externo e opcional: qualquer falha (erro, resposta
//! inválida, tempo esgotado) é registrada e o formulário volta inalterado.
//! Valores extraídos só preenchem campos em branco.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::OnboardingError;
use crate::forms::{InsuranceForm, PersonalInfoForm};

/// Campos candidatos extraídos do documento
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractedFields {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub insurance_provider: Option<String>,
    pub policy_number: Option<String>,
    pub group_number: Option<String>,
}

/// Documento enviado para análise (conteúdo já codificado pelo cliente)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInput {
    pub content: String,
    pub mime_type: String,
}

/// Resultado da análise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentAnalysis {
    pub text: String,
    /// Entre 0 e 1
    pub confidence: f64,
    #[serde(default)]
    pub fields: ExtractedFields,
}

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("Tempo esgotado na análise do documento")]
    Timeout,

    #[error("Falha na requisição ao serviço de análise: {0}")]
    Request(String),

    #[error("Resposta inválida do serviço de análise: {0}")]
    InvalidResponse(String),

    #[error("Serviço de análise não configurado")]
    NotConfigured,
}

impl From<AnalyzerError> for OnboardingError {
    fn from(err: AnalyzerError) -> Self {
        OnboardingError::ExternalService(err.to_string())
    }
}

/// Provedor de análise de documentos
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    async fn analyze(&self, input: DocumentInput) -> Result<DocumentAnalysis, AnalyzerError>;
}

fn fill(target: &mut String, candidate: &Option<String>) {
    if !target.trim().is_empty() {
        return;
    }
    if let Some(value) = candidate.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        *target = value.to_string();
    }
}

fn fill_optional(target: &mut Option<String>, candidate: &Option<String>) {
    let blank = target.as_deref().map_or(true, |v| v.trim().is_empty());
    if !blank {
        return;
    }
    if let Some(value) = candidate.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        *target = Some(value.to_string());
    }
}

/// Completa os dados pessoais sem sobrescrever o que o usuário digitou
pub fn merge_personal(mut form: PersonalInfoForm, fields: &ExtractedFields) -> PersonalInfoForm {
    fill(&mut form.first_name, &fields.first_name);
    fill(&mut form.last_name, &fields.last_name);
    fill(&mut form.date_of_birth, &fields.date_of_birth);
    fill(&mut form.phone, &fields.phone);
    fill(&mut form.address, &fields.address);
    form
}

pub fn merge_insurance(mut form: InsuranceForm, fields: &ExtractedFields) -> InsuranceForm {
    fill(&mut form.provider, &fields.insurance_provider);
    fill(&mut form.policy_number, &fields.policy_number);
    fill_optional(&mut form.group_number, &fields.group_number);
    form
}

/// Formulários após o pré-preenchimento
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prefill {
    pub personal: PersonalInfoForm,
    pub insurance: InsuranceForm,
    pub analysis: Option<DocumentAnalysis>,
    /// A análise falhou e os formulários voltaram como vieram
    pub degraded: bool,
}

#[derive(Clone)]
pub struct PrefillService {
    analyzer: Arc<dyn DocumentAnalyzer>,
    timeout: Duration,
    min_confidence: f64,
}

impl PrefillService {
    pub fn new(analyzer: Arc<dyn DocumentAnalyzer>, timeout: Duration, min_confidence: f64) -> Self {
        Self {
            analyzer,
            timeout,
            min_confidence,
        }
    }

    /// Chama o analisador com tempo limite; erros são convertidos para o erro do cadastro
    pub async fn analyze(&self, input: DocumentInput) -> Result<DocumentAnalysis, OnboardingError> {
        let analysis = tokio::time::timeout(self.timeout, self.analyzer.analyze(input))
            .await
            .map_err(|_| AnalyzerError::Timeout)??;

        if !(0.0..=1.0).contains(&analysis.confidence) {
            return Err(AnalyzerError::InvalidResponse(format!(
                "confiança fora do intervalo: {}",
                analysis.confidence
            ))
            .into());
        }
        Ok(analysis)
    }

    /// Nunca falha: em caso de erro os formulários retornam inalterados
    pub async fn prefill(
        &self,
        input: DocumentInput,
        personal: PersonalInfoForm,
        insurance: InsuranceForm,
    ) -> Prefill {
        match self.analyze(input).await {
            Ok(analysis) if analysis.confidence >= self.min_confidence => {
                debug!(confidence = analysis.confidence, "Documento analisado");
                Prefill {
                    personal: merge_personal(personal, &analysis.fields),
                    insurance: merge_insurance(insurance, &analysis.fields),
                    analysis: Some(analysis),
                    degraded: false,
                }
            }
            Ok(analysis) => {
                debug!(
                    confidence = analysis.confidence,
                    "Confiança abaixo do mínimo; campos extraídos ignorados"
                );
                Prefill {
                    personal,
                    insurance,
                    analysis: Some(analysis),
                    degraded: false,
                }
            }
            Err(e) => {
                warn!("Pré-preenchimento indisponível: {}", e);
                Prefill {
                    personal,
                    insurance,
                    analysis: None,
                    degraded: true,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> DocumentInput {
        DocumentInput {
            content: "aWRlbnRpZGFkZQ==".to_string(),
            mime_type: "image/png".to_string(),
        }
    }

    fn extracted() -> ExtractedFields {
        ExtractedFields {
            first_name: Some("Jane".to_string()),
            last_name: Some("Doe".to_string()),
            date_of_birth: Some("1990-01-01".to_string()),
            phone: Some("5551234567".to_string()),
            insurance_provider: Some("Acme Health".to_string()),
            group_number: Some("GRP-9".to_string()),
            ..Default::default()
        }
    }

    fn analysis(confidence: f64) -> DocumentAnalysis {
        DocumentAnalysis {
            text: "JANE DOE 01/01/1990".to_string(),
            confidence,
            fields: extracted(),
        }
    }

    #[test]
    fn test_merge_only_fills_blanks() {
        let form = PersonalInfoForm {
            first_name: "Janet".to_string(),
            phone: " ".to_string(),
            ..Default::default()
        };

        let merged = merge_personal(form, &extracted());
        assert_eq!(merged.first_name, "Janet");
        assert_eq!(merged.last_name, "Doe");
        assert_eq!(merged.phone, "5551234567");
        assert_eq!(merged.address, "");
    }

    #[test]
    fn test_merge_insurance_keeps_user_group_number() {
        let form = InsuranceForm {
            group_number: Some("MEU-GRUPO".to_string()),
            ..Default::default()
        };
        let merged = merge_insurance(form, &extracted());
        assert_eq!(merged.provider, "Acme Health");
        assert_eq!(merged.policy_number, "");
        assert_eq!(merged.group_number.as_deref(), Some("MEU-GRUPO"));
    }

    #[tokio::test]
    async fn test_prefill_uses_analysis() {
        let mut analyzer = MockDocumentAnalyzer::new();
        analyzer
            .expect_analyze()
            .times(1)
            .returning(|_| Ok(analysis(0.9)));

        let service = PrefillService::new(Arc::new(analyzer), Duration::from_secs(5), 0.5);
        let result = service
            .prefill(input(), PersonalInfoForm::default(), InsuranceForm::default())
            .await;

        assert!(!result.degraded);
        assert_eq!(result.personal.first_name, "Jane");
        assert_eq!(result.insurance.provider, "Acme Health");
    }

    #[tokio::test]
    async fn test_low_confidence_keeps_forms() {
        let mut analyzer = MockDocumentAnalyzer::new();
        analyzer.expect_analyze().returning(|_| Ok(analysis(0.2)));

        let service = PrefillService::new(Arc::new(analyzer), Duration::from_secs(5), 0.5);
        let result = service
            .prefill(input(), PersonalInfoForm::default(), InsuranceForm::default())
            .await;

        assert!(!result.degraded);
        assert!(result.analysis.is_some());
        assert_eq!(result.personal, PersonalInfoForm::default());
    }

    #[tokio::test]
    async fn test_analyzer_failure_is_swallowed() {
        let mut analyzer = MockDocumentAnalyzer::new();
        analyzer
            .expect_analyze()
            .returning(|_| Err(AnalyzerError::Request("conexão recusada".to_string())));

        let service = PrefillService::new(Arc::new(analyzer), Duration::from_secs(5), 0.5);
        let personal = PersonalInfoForm {
            first_name: "Jane".to_string(),
            ..Default::default()
        };
        let result = service
            .prefill(input(), personal.clone(), InsuranceForm::default())
            .await;

        assert!(result.degraded);
        assert!(result.analysis.is_none());
        assert_eq!(result.personal, personal);
    }

    #[tokio::test]
    async fn test_out_of_range_confidence_is_invalid() {
        let mut analyzer = MockDocumentAnalyzer::new();
        analyzer.expect_analyze().returning(|_| Ok(analysis(1.5)));

        let service = PrefillService::new(Arc::new(analyzer), Duration::from_secs(5), 0.5);
        let err = service.analyze(input()).await.unwrap_err();
        assert!(matches!(err, OnboardingError::ExternalService(_)));
    }

    struct SlowAnalyzer;

    #[async_trait]
    impl DocumentAnalyzer for SlowAnalyzer {
        async fn analyze(&self, _input: DocumentInput) -> Result<DocumentAnalysis, AnalyzerError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(analysis(1.0))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_analyzer_times_out() {
        let service = PrefillService::new(Arc::new(SlowAnalyzer), Duration::from_secs(2), 0.5);

        let err = service.analyze(input()).await.unwrap_err();
        assert!(err.to_string().contains("Tempo esgotado"));

        let result = service
            .prefill(input(), PersonalInfoForm::default(), InsuranceForm::default())
            .await;
        assert!(result.degraded);
    }
}
