//! Onboarding API - Serviço HTTP do cadastro de pacientes
//!
//! Expõe as etapas do assistente, a conclusão com escolha do local de admissão,
//! o painel da equipe, o log de atividades e o pré-preenchimento por documentos.

pub mod analyzer;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;

/// Informações geradas em tempo de build
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub use crate::config::AppConfig;
pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
