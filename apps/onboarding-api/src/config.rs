//! Configuração do serviço
//!
//! Precedência (maior por último):
//! 1. Valores padrão
//! 2. Arquivo TOML opcional (`onboarding.toml` ou o caminho em `ONBOARDING_CONFIG`)
//! 3. Variáveis de ambiente `ONBOARDING__<SEÇÃO>__<CAMPO>`, por exemplo
//!    `ONBOARDING__DATABASE__KEY_PHRASE`

use anyhow::{Context, Result};
use common_db::DbConfig;
use config::{Config, ConfigBuilder, Environment, File};
use onboarding_core::{AdmissionTable, OnboardingSettings};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "onboarding.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DbConfig,
    pub storage: StorageBackend,
    pub onboarding: OnboardingConfig,
    pub analyzer: AnalyzerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Tempo máximo de uma requisição
    pub request_timeout_secs: u64,
    /// Requisições simultâneas atendidas
    pub max_concurrent_requests: usize,
    /// Origens liberadas no CORS; vazio libera qualquer origem
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 30,
            max_concurrent_requests: 256,
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Backend de armazenamento dos pacientes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    /// Somente para execução local; os dados somem ao reiniciar
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OnboardingConfig {
    pub collect_emergency_identity: bool,
    pub admission: AdmissionTable,
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            collect_emergency_identity: OnboardingSettings::default().collect_emergency_identity,
            admission: AdmissionTable::default(),
        }
    }
}

impl OnboardingConfig {
    pub fn settings(&self) -> OnboardingSettings {
        OnboardingSettings {
            collect_emergency_identity: self.collect_emergency_identity,
        }
    }
}

/// Provedor externo de análise de documentos
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Sem endpoint o pré-preenchimento fica desativado
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Abaixo deste valor os campos extraídos são ignorados
    pub min_confidence: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_secs: 15,
            min_confidence: 0.6,
        }
    }
}

impl AnalyzerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filtro padrão quando `RUST_LOG` não está definido
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info,onboarding_api=debug,tower_http=info".to_string(),
            format: LogFormat::Json,
        }
    }
}

impl AppConfig {
    /// Carrega a configuração do arquivo (se existir) e do ambiente
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        match path {
            Some(path) => {
                builder = builder.add_source(File::with_name(path).required(true));
            }
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                builder = builder.add_source(File::with_name(DEFAULT_CONFIG_FILE));
            }
            None => {}
        }

        builder = builder.add_source(
            Environment::with_prefix("ONBOARDING")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("server.cors_origins")
                .with_list_parse_key("onboarding.admission.emergency_bays"),
        );

        Self::build(builder)
    }

    fn build(builder: ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let config: AppConfig = builder
            .build()
            .context("Falha ao ler a configuração")?
            .try_deserialize()
            .context("Configuração inválida")?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        if self.storage == StorageBackend::Sqlite && self.database.key_phrase.is_empty() {
            anyhow::bail!(
                "database.key_phrase é obrigatório com armazenamento sqlite \
                 (defina ONBOARDING__DATABASE__KEY_PHRASE)"
            );
        }
        if !(0.0..=1.0).contains(&self.analyzer.min_confidence) {
            anyhow::bail!("analyzer.min_confidence deve estar entre 0 e 1");
        }
        Ok(())
    }
}
