//! Common DB - Biblioteca compartilhada de persistência do cadastro de pacientes
//!
//! Esta biblioteca fornece:
//! - Modelos de dados do cadastro (paciente, mudanças por etapa, atividades)
//! - Contratos `PatientStore` / `ActivityLog` com backends SQLite e em memória
//! - Migrações automáticas do banco de dados
//! - Criptografia dos dados identificáveis do paciente

use anyhow::{Context, Result};
use serde::Deserialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod crypto;
pub mod error;
pub mod migrations;
pub mod models;
pub mod store;

pub use error::{DbError, DbResult};
pub use store::{ActivityLog, MemoryStore, PatientStore, SqliteStore};

/// Espera máxima por um lock de escrita ocupado
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuração da conexão com o banco de dados
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Caminho para o arquivo SQLite
    pub db_path: String,
    /// Senha que protege a chave mestra (derivada via Argon2id)
    pub key_phrase: String,
    /// Número máximo de conexões no pool
    pub max_connections: u32,
    /// Registra cada comando SQL no log
    pub log_statements: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            db_path: "data/onboarding.db".to_string(),
            key_phrase: "".to_string(), // Vazio por segurança, deve ser definido explicitamente
            max_connections: 5,
            log_statements: false,
        }
    }
}

/// Inicializa o pool de conexões SQLite e aplica as migrações
pub async fn init_db_pool(config: &DbConfig) -> Result<SqlitePool> {
    let db_path = Path::new(&config.db_path);

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .context("Falha ao criar diretório para banco de dados")?;
        }
    }

    let mut connection_options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT)
        .pragma("synchronous", "NORMAL");

    if !config.log_statements {
        connection_options = connection_options.disable_statement_logging();
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(connection_options)
        .await
        .context("Falha ao conectar ao banco de dados SQLite")?;

    migrations::run_migrations(&pool)
        .await
        .context("Falha ao aplicar migrações")?;

    info!("Banco de dados inicializado com sucesso: {}", config.db_path);
    Ok(pool)
}

/// Abre o repositório SQLite: pool, migrações e chave mestra
pub async fn open_sqlite_store(config: &DbConfig) -> Result<SqliteStore> {
    let pool = init_db_pool(config).await?;
    let key = crypto::load_or_create_master_key(&pool, &config.key_phrase)
        .await
        .context("Falha ao carregar a chave mestra")?;
    Ok(SqliteStore::new(pool, key))
}
