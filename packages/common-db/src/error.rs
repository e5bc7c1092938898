//! Definições de erro para a biblioteca common-db
//!
//! Todas as operações dos repositórios de pacientes e de atividades retornam
//! [`DbError`]. Entidade inexistente é um valor de erro (`NotFound`), nunca um pânico.

use thiserror::Error;

use crate::crypto::CryptoError;

/// Resultado padrão das operações de persistência
pub type DbResult<T> = Result<T, DbError>;

/// Erros específicos para operações de banco de dados
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Erro de conexão com banco de dados: {0}")]
    ConnectionError(String),

    #[error("Erro de migração: {0}")]
    MigrationError(String),

    #[error("Erro de consulta: {0}")]
    QueryError(String),

    #[error("Entidade não encontrada: {0}")]
    NotFound(String),

    #[error("Violação de restrição: {0}")]
    ConstraintViolation(String),

    #[error("Erro de criptografia: {0}")]
    CryptoError(#[from] CryptoError),

    #[error("Erro de serialização: {0}")]
    SerializationError(String),

    #[error("Armazenamento indisponível: {0}")]
    Unavailable(String),

    #[error("Erro interno: {0}")]
    InternalError(String),
}

impl DbError {
    /// Indica se o erro representa uma entidade inexistente
    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound(_))
    }

    pub(crate) fn patient_not_found(id: impl std::fmt::Display) -> Self {
        DbError::NotFound(format!("paciente {}", id))
    }
}

impl From<serde_json::Error> for DbError {
    fn from(error: serde_json::Error) -> Self {
        DbError::SerializationError(error.to_string())
    }
}

/// SQLITE_BUSY (5) ou SQLITE_LOCKED (6), incluindo os códigos estendidos
/// como BUSY_SNAPSHOT (517) e BUSY_RECOVERY (261)
fn is_lock_contention(code: &str) -> bool {
    match code.parse::<i32>() {
        Ok(code) => matches!(code & 0xff, 5 | 6),
        Err(_) => false,
    }
}

/// Conversão de erros específicos do SQLx para nossos tipos de erro
impl From<sqlx::Error> for DbError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => DbError::NotFound("Registro não encontrado".to_string()),
            sqlx::Error::Database(dbe) => {
                if let Some(code) = dbe.code() {
                    // 2067 = SQLITE_CONSTRAINT_UNIQUE, 787 = SQLITE_CONSTRAINT_FOREIGNKEY
                    if code.as_ref() == "2067" || code.as_ref() == "787" {
                        return DbError::ConstraintViolation(dbe.message().to_string());
                    }
                    if is_lock_contention(code.as_ref()) {
                        return DbError::Unavailable(dbe.message().to_string());
                    }
                }
                DbError::QueryError(dbe.message().to_string())
            }
            sqlx::Error::ColumnNotFound(col) => {
                DbError::QueryError(format!("Coluna não encontrada: {}", col))
            }
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::QueryError(format!("Erro ao decodificar coluna {}: {}", index, source))
            }
            sqlx::Error::Io(io_err) => DbError::ConnectionError(io_err.to_string()),
            sqlx::Error::Configuration(conf_err) => DbError::ConnectionError(conf_err.to_string()),
            sqlx::Error::PoolClosed => {
                DbError::Unavailable("Pool de conexões fechado".to_string())
            }
            sqlx::Error::PoolTimedOut => {
                DbError::Unavailable("Timeout no pool de conexões".to_string())
            }
            sqlx::Error::Migrate(e) => DbError::MigrationError(e.to_string()),
            _ => DbError::InternalError(format!("Erro inesperado: {:?}", error)),
        }
    }
}
