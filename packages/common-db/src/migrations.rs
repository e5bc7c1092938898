//! Sistema de migrações para banco de dados
//!
//! Este módulo gerencia as migrações do banco de dados SQLite. A versão aplicada
//! fica em `PRAGMA user_version`.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::{error, info};

/// Lista de migrações SQL a serem aplicadas
const MIGRATIONS: &[&str] = &[
    // 001_onboarding_schema.sql
    r#"
    -- Pacientes em cadastro; dados identificáveis ficam no blob criptografado
    CREATE TABLE IF NOT EXISTS patients (
        id TEXT PRIMARY KEY NOT NULL,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        onboarding_step INTEGER NOT NULL DEFAULT 1 CHECK (onboarding_step BETWEEN 1 AND 4),
        is_completed BOOLEAN NOT NULL DEFAULT 0,
        is_emergency BOOLEAN NOT NULL DEFAULT 0,
        emergency_type TEXT,
        admission_location TEXT,
        details_ciphertext BLOB NOT NULL,
        details_nonce BLOB NOT NULL,
        CHECK (is_completed = 0 OR (admission_location IS NOT NULL AND admission_location <> ''))
    );

    -- Trilha de auditoria (somente inserção)
    CREATE TABLE IF NOT EXISTS activities (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        patient_id TEXT,
        action TEXT NOT NULL CHECK (action IN ('patient_created', 'patient_updated', 'document_uploaded', 'onboarding_completed', 'ambulance_dispatched')),
        description TEXT NOT NULL,
        created_at TIMESTAMP NOT NULL,
        FOREIGN KEY (patient_id) REFERENCES patients (id) ON DELETE SET NULL
    );

    -- Chaves mestras embrulhadas
    CREATE TABLE IF NOT EXISTS master_keys (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        active BOOLEAN NOT NULL DEFAULT 0,
        wrapped_key_ciphertext BLOB NOT NULL,
        wrapped_key_nonce BLOB NOT NULL,
        kdf_salt BLOB NOT NULL,
        key_version INTEGER NOT NULL
    );

    -- Índices para otimização
    CREATE INDEX IF NOT EXISTS idx_patients_created_at ON patients (created_at);
    CREATE INDEX IF NOT EXISTS idx_patients_is_completed ON patients (is_completed);
    CREATE INDEX IF NOT EXISTS idx_activities_patient_id ON activities (patient_id);
    "#,
];

/// Número de migrações conhecidas
pub fn latest_version() -> i64 {
    MIGRATIONS.len() as i64
}

/// Executa todas as migrações pendentes no banco de dados
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Aplicando migrações de banco de dados...");

    let mut version: i64 = 0;
    match sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await
    {
        Ok(v) => version = v,
        Err(e) => {
            // Pode ser a primeira execução
            error!("Erro ao obter versão do banco: {}", e);
        }
    }

    info!("Versão atual do banco: {}", version);

    for (i, migration_sql) in MIGRATIONS.iter().enumerate() {
        let migration_version = (i + 1) as i64;

        if migration_version <= version {
            info!("Migração {} já aplicada", migration_version);
            continue;
        }

        info!("Aplicando migração {}...", migration_version);

        let mut transaction = pool
            .begin()
            .await
            .with_context(|| format!("Falha ao iniciar transação para migração {}", migration_version))?;

        sqlx::query(migration_sql)
            .execute(&mut *transaction)
            .await
            .with_context(|| format!("Falha ao executar migração {}", migration_version))?;

        sqlx::query(&format!("PRAGMA user_version = {}", migration_version))
            .execute(&mut *transaction)
            .await
            .with_context(|| format!("Falha ao atualizar versão para {}", migration_version))?;

        transaction
            .commit()
            .await
            .with_context(|| format!("Falha ao confirmar transação para migração {}", migration_version))?;

        info!("Migração {} aplicada com sucesso", migration_version);
    }

    info!("Migrações concluídas. Versão atual: {}", latest_version());
    Ok(())
}
