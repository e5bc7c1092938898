//! Onboarding Core - Regras do cadastro de pacientes
//!
//! Esta biblioteca fornece:
//! - Máquina de estados do assistente (fluxos padrão e de emergência)
//! - Validação dos formulários de cada etapa
//! - Conclusão do cadastro com escolha do local de admissão
//! - Indicadores do painel da equipe
//! - Pré-preenchimento a partir de documentos analisados externamente

pub mod completion;
pub mod dashboard;
pub mod error;
pub mod forms;
pub mod machine;
pub mod prefill;
pub mod service;

pub use completion::{AdmissionTable, CompletionWorkflow, LocationAssigner, TableLocationAssigner};
pub use dashboard::{Dashboard, DashboardStats};
pub use error::{FieldErrors, OnboardingError};
pub use forms::{EmergencyContactForm, InsuranceForm, MedicalForm, PersonalInfoForm};
pub use machine::{OnboardingState, StepKind, TransitionError};
pub use prefill::{DocumentAnalyzer, PrefillService};
pub use service::{parse_patient_id, OnboardingService, OnboardingSettings};
