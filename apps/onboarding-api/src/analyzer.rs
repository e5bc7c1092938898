//! Cliente HTTP do provedor de análise de documentos

use async_trait::async_trait;
use onboarding_core::prefill::{
    AnalyzerError, DocumentAnalysis, DocumentAnalyzer, DocumentInput, ExtractedFields,
};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Envia `{content, mimeType}` ao endpoint configurado e valida o formato da resposta
pub struct HttpDocumentAnalyzer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpDocumentAnalyzer {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AnalyzerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnalyzerError::Request(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }
}

#[async_trait]
impl DocumentAnalyzer for HttpDocumentAnalyzer {
    async fn analyze(&self, input: DocumentInput) -> Result<DocumentAnalysis, AnalyzerError> {
        let mut request = self.client.post(&self.endpoint).json(&input);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AnalyzerError::Timeout
            } else {
                AnalyzerError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalyzerError::Request(format!(
                "provedor respondeu com status {}",
                status
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AnalyzerError::InvalidResponse(e.to_string()))?;
        debug!("Resposta do provedor de análise recebida");

        parse_analysis(body)
    }
}

/// Confere o formato antes de aceitar a resposta
fn parse_analysis(body: Value) -> Result<DocumentAnalysis, AnalyzerError> {
    let text = body
        .get("text")
        .and_then(Value::as_str)
        .ok_or_else(|| AnalyzerError::InvalidResponse("campo 'text' ausente".to_string()))?
        .to_string();

    let confidence = body
        .get("confidence")
        .and_then(Value::as_f64)
        .ok_or_else(|| AnalyzerError::InvalidResponse("campo 'confidence' ausente".to_string()))?;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(AnalyzerError::InvalidResponse(format!(
            "confiança fora do intervalo: {}",
            confidence
        )));
    }

    let fields = match body.get("fields") {
        None | Some(Value::Null) => ExtractedFields::default(),
        Some(value @ Value::Object(_)) => serde_json::from_value(value.clone())
            .map_err(|e| AnalyzerError::InvalidResponse(format!("campos inválidos: {}", e)))?,
        Some(_) => {
            return Err(AnalyzerError::InvalidResponse(
                "campo 'fields' deve ser um objeto".to_string(),
            ))
        }
    };

    Ok(DocumentAnalysis {
        text,
        confidence,
        fields,
    })
}

/// Usado quando nenhum provedor está configurado
pub struct UnconfiguredAnalyzer;

#[async_trait]
impl DocumentAnalyzer for UnconfiguredAnalyzer {
    async fn analyze(&self, _input: DocumentInput) -> Result<DocumentAnalysis, AnalyzerError> {
        Err(AnalyzerError::NotConfigured)
    }
}
