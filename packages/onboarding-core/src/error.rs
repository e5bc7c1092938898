//! Erros do cadastro de pacientes

use common_db::DbError;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::error;

use crate::machine::TransitionError;

/// Campos rejeitados pela validação (campo → mensagem)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(pub BTreeMap<String, String>);

impl FieldErrors {
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(field.to_string(), message.into());
        Self(errors)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, message)| format!("{}: {}", field, message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

impl From<validator::ValidationErrors> for FieldErrors {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields = BTreeMap::new();
        collect(&errors, "", &mut fields);
        Self(fields)
    }
}

fn collect(errors: &validator::ValidationErrors, prefix: &str, out: &mut BTreeMap<String, String>) {
    use validator::ValidationErrorsKind;

    for (field, kind) in errors.errors() {
        let name = if prefix.is_empty() {
            camel_case(field)
        } else {
            format!("{}.{}", prefix, camel_case(field))
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                if let Some(first) = list.first() {
                    let message = first
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| first.code.to_string());
                    out.insert(name, message);
                }
            }
            ValidationErrorsKind::Struct(nested) => collect(nested, &name, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect(nested, &format!("{}[{}]", name, index), out);
                }
            }
        }
    }
}

/// Os formulários usam camelCase no JSON; as mensagens seguem o mesmo nome
fn camel_case(field: &str) -> String {
    let mut result = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            result.extend(c.to_uppercase());
            upper = false;
        } else {
            result.push(c);
        }
    }
    result
}

/// Erros das operações de cadastro
#[derive(Debug, Error)]
pub enum OnboardingError {
    #[error("Dados inválidos: {0}")]
    Validation(FieldErrors),

    #[error("Identificador de paciente ausente")]
    MissingPatientId,

    #[error("Identificador de paciente inválido: {0}")]
    InvalidPatientId(String),

    #[error("Paciente não encontrado: {0}")]
    NotFound(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Falha de persistência: {0}")]
    Persistence(#[source] DbError),

    #[error("Falha no serviço externo: {0}")]
    ExternalService(String),
}

impl OnboardingError {
    /// O cliente deve voltar para a primeira etapa do assistente
    pub fn requires_restart(&self) -> bool {
        matches!(
            self,
            OnboardingError::MissingPatientId
                | OnboardingError::InvalidPatientId(_)
                | OnboardingError::NotFound(_)
        )
    }
}

impl From<FieldErrors> for OnboardingError {
    fn from(errors: FieldErrors) -> Self {
        OnboardingError::Validation(errors)
    }
}

impl From<validator::ValidationErrors> for OnboardingError {
    fn from(errors: validator::ValidationErrors) -> Self {
        OnboardingError::Validation(errors.into())
    }
}

impl From<DbError> for OnboardingError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(what) => OnboardingError::NotFound(what),
            other => {
                error!("Falha de persistência no cadastro: {}", other);
                OnboardingError::Persistence(other)
            }
        }
    }
}
