//! Formulários de cada etapa do assistente
//!
//! Cada formulário é validado antes de qualquer acesso ao armazenamento e
//! convertido para o conjunto fechado de campos da etapa.

use chrono::{NaiveDate, Utc};
use common_db::models::{
    Demographics, EmergencyContact, Insurance, InsuranceStatus, MedicalHistory, MedicalInfo,
    OnboardingPath,
};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use validator::{Validate, ValidationError};

use crate::error::FieldErrors;

/// Quantidade mínima de caracteres do telefone
pub const MIN_PHONE_LENGTH: usize = 10;

const DATE_FORMAT: &str = "%Y-%m-%d";

const PLACEHOLDER_FIRST_NAME: &str = "Emergency";
const PLACEHOLDER_LAST_NAME: &str = "Patient";
const PLACEHOLDER_DATE_OF_BIRTH: &str = "1900-01-01";
const PLACEHOLDER_PHONE: &str = "0000000000";
const PLACEHOLDER_ADDRESS: &str = "unknown";

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(invalid("required", "campo obrigatório"));
    }
    Ok(())
}

fn valid_phone(value: &str) -> Result<(), ValidationError> {
    if value.trim().chars().count() < MIN_PHONE_LENGTH {
        return Err(invalid("phone_length", "telefone deve ter ao menos 10 caracteres"));
    }
    Ok(())
}

fn valid_date_of_birth(value: &str) -> Result<(), ValidationError> {
    let date = NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| invalid("date_format", "data deve estar no formato AAAA-MM-DD"))?;
    if date > Utc::now().date_naive() {
        return Err(invalid("date_in_future", "data de nascimento no futuro"));
    }
    Ok(())
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Contato de emergência informado na etapa 1
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct EmergencyContactForm {
    #[validate(custom = "not_blank")]
    pub name: String,
    pub relationship: String,
    #[validate(custom = "valid_phone")]
    pub phone: String,
}

impl EmergencyContactForm {
    fn is_blank(&self) -> bool {
        self.name.trim().is_empty()
            && self.relationship.trim().is_empty()
            && self.phone.trim().is_empty()
    }
}

/// Etapa 1: dados pessoais (e, na criação, a escolha do fluxo)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonalInfoForm {
    #[validate(custom = "not_blank")]
    pub first_name: String,
    #[validate(custom = "not_blank")]
    pub last_name: String,
    #[validate(custom = "valid_date_of_birth")]
    pub date_of_birth: String,
    #[validate(custom = "valid_phone")]
    pub phone: String,
    #[validate(custom = "not_blank")]
    pub address: String,
    #[validate]
    pub emergency_contact: Option<EmergencyContactForm>,
    /// Seleciona o fluxo de emergência na criação
    pub is_emergency: bool,
    /// cardiac, trauma, pediatric... (somente com `is_emergency`)
    pub emergency_type: Option<String>,
}

impl PersonalInfoForm {
    pub fn path(&self) -> OnboardingPath {
        OnboardingPath::from_emergency_flag(self.is_emergency)
    }

    /// Descarta contato de emergência vazio e tipo de emergência em branco
    pub fn normalized(mut self) -> Self {
        if self.emergency_contact.as_ref().map_or(false, |c| c.is_blank()) {
            self.emergency_contact = None;
        }
        self.emergency_type = blank_to_none(self.emergency_type).map(|t| t.to_lowercase());
        self
    }

    /// Preenche campos de identificação em branco com valores provisórios
    /// (fluxo de emergência sem coleta de identidade)
    pub fn with_emergency_placeholders(mut self) -> Self {
        fn fill(field: &mut String, placeholder: &str) {
            if field.trim().is_empty() {
                *field = placeholder.to_string();
            }
        }
        fill(&mut self.first_name, PLACEHOLDER_FIRST_NAME);
        fill(&mut self.last_name, PLACEHOLDER_LAST_NAME);
        fill(&mut self.date_of_birth, PLACEHOLDER_DATE_OF_BIRTH);
        fill(&mut self.phone, PLACEHOLDER_PHONE);
        fill(&mut self.address, PLACEHOLDER_ADDRESS);
        self
    }

    /// Valida o formulário inteiro, incluindo regras entre campos
    pub fn check(&self) -> Result<(), FieldErrors> {
        let mut errors = match self.validate() {
            Ok(()) => FieldErrors::default(),
            Err(e) => FieldErrors::from(e),
        };
        if self.emergency_type.is_some() && !self.is_emergency {
            errors.0.insert(
                "emergencyType".to_string(),
                "tipo de emergência exige isEmergency".to_string(),
            );
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn demographics(&self) -> Result<Demographics, FieldErrors> {
        let date_of_birth = NaiveDate::parse_from_str(self.date_of_birth.trim(), DATE_FORMAT)
            .map_err(|_| {
                FieldErrors::single("dateOfBirth", "data deve estar no formato AAAA-MM-DD")
            })?;

        Ok(Demographics {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            date_of_birth,
            phone: self.phone.trim().to_string(),
            address: self.address.trim().to_string(),
        })
    }

    pub fn emergency_contact(&self) -> Option<EmergencyContact> {
        self.emergency_contact.as_ref().map(|c| EmergencyContact {
            name: c.name.trim().to_string(),
            relationship: c.relationship.trim().to_string(),
            phone: c.phone.trim().to_string(),
        })
    }
}

/// Etapa 2: convênio
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct InsuranceForm {
    #[validate(custom = "not_blank")]
    pub provider: String,
    #[validate(custom = "not_blank")]
    pub policy_number: String,
    pub group_number: Option<String>,
}

impl InsuranceForm {
    /// Convênio recém-informado começa pendente de verificação
    pub fn into_insurance(self) -> Insurance {
        Insurance {
            provider: self.provider.trim().to_string(),
            policy_number: self.policy_number.trim().to_string(),
            group_number: blank_to_none(self.group_number),
            status: InsuranceStatus::Pending,
        }
    }
}

/// Etapa 3: histórico médico (nenhum campo obrigatório)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MedicalForm {
    pub allergies: Option<String>,
    pub medications: Option<String>,
    pub medical_history: Option<MedicalHistory>,
}

impl MedicalForm {
    pub fn into_medical_info(self) -> MedicalInfo {
        let medical_history = self.medical_history.map(|history| MedicalHistory {
            conditions: clean_list(history.conditions),
            surgeries: clean_list(history.surgeries),
            family_history: clean_list(history.family_history),
        });

        MedicalInfo {
            allergies: blank_to_none(self.allergies),
            medications: blank_to_none(self.medications),
            medical_history,
        }
    }
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
