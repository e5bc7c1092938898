//! Máquina de estados do assistente de cadastro
//!
//! Fluxo padrão:     1 dados pessoais → 2 convênio → 3 histórico médico → 4 concluído
//! Fluxo emergência: 1 dados pessoais/tipo de emergência → 2 concluído
//!
//! As funções daqui são puras: recebem o estado atual e a etapa submetida e
//! devolvem a próxima etapa ou o motivo da recusa. Quem persiste é o
//! [`crate::service::OnboardingService`].

use common_db::models::{OnboardingPath, Patient, STEP_INSURANCE, STEP_MEDICAL, STEP_PERSONAL};
use serde::Serialize;
use thiserror::Error;

/// Etapa de coleta de dados submetida pelo cliente
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Personal,
    Insurance,
    Medical,
}

impl StepKind {
    pub fn step_number(self) -> i32 {
        match self {
            StepKind::Personal => STEP_PERSONAL,
            StepKind::Insurance => STEP_INSURANCE,
            StepKind::Medical => STEP_MEDICAL,
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepKind::Personal => write!(f, "personal"),
            StepKind::Insurance => write!(f, "insurance"),
            StepKind::Medical => write!(f, "medical"),
        }
    }
}

/// Entrada explícita da máquina de estados
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnboardingState {
    pub path: OnboardingPath,
    pub current_step: i32,
    pub is_completed: bool,
}

impl OnboardingState {
    pub fn of(patient: &Patient) -> Self {
        Self {
            path: patient.path(),
            current_step: patient.onboarding_step,
            is_completed: patient.is_completed,
        }
    }
}

/// Transições recusadas
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Cadastro já concluído; etapas anteriores não podem ser reenviadas")]
    AlreadyCompleted,

    #[error("A etapa {step} não existe no fluxo {path}")]
    StepNotOnPath { step: StepKind, path: OnboardingPath },

    #[error("A etapa {step} exige etapas anteriores (etapa atual: {current_step})")]
    StepOutOfOrder { step: StepKind, current_step: i32 },

    #[error("O fluxo do paciente ({path}) não pode ser alterado após a criação")]
    PathChange { path: OnboardingPath },
}

/// Etapas do fluxo até a conclusão, na ordem observada pelo assistente
pub fn step_sequence(path: OnboardingPath) -> Vec<i32> {
    (STEP_PERSONAL..=path.terminal_step()).collect()
}

/// Calcula a etapa resultante de uma submissão.
///
/// A etapa nunca retrocede: reenviar uma etapa anterior mantém a posição atual.
pub fn advance(state: &OnboardingState, step: StepKind) -> Result<i32, TransitionError> {
    if state.is_completed {
        return Err(TransitionError::AlreadyCompleted);
    }

    match (state.path, step) {
        (_, StepKind::Personal) => Ok(state.current_step.max(STEP_PERSONAL)),
        (OnboardingPath::Emergency, step) => Err(TransitionError::StepNotOnPath {
            step,
            path: OnboardingPath::Emergency,
        }),
        (OnboardingPath::Standard, StepKind::Insurance) => {
            Ok(state.current_step.max(STEP_INSURANCE))
        }
        (OnboardingPath::Standard, StepKind::Medical) => {
            if state.current_step < STEP_INSURANCE {
                return Err(TransitionError::StepOutOfOrder {
                    step,
                    current_step: state.current_step,
                });
            }
            Ok(OnboardingPath::Standard.pre_terminal_step())
        }
    }
}

/// Confere que uma nova submissão de dados pessoais não troca o fluxo
pub fn check_path_unchanged(
    state: &OnboardingState,
    requested: OnboardingPath,
) -> Result<(), TransitionError> {
    if state.path != requested {
        return Err(TransitionError::PathChange { path: state.path });
    }
    Ok(())
}
