//! Ponto de entrada do serviço de cadastro de pacientes

use anyhow::{Context, Result};
use onboarding_api::{built_info, router, telemetry, AppConfig, AppState};
use std::net::SocketAddr;
use onboarding_api::config::LoggingConfig;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // .env é opcional
    let dotenv_loaded = dotenvy::dotenv().is_ok();

    let config_path = std::env::var("ONBOARDING_CONFIG").ok();
    let config = match AppConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            // Sem configuração válida, registra com o nível padrão
            telemetry::init_telemetry(&LoggingConfig::default())?;
            error!("Configuração inválida: {:#}", e);
            return Err(e);
        }
    };
    telemetry::init_telemetry(&config.logging)?;
    if dotenv_loaded {
        info!("Variáveis de ambiente carregadas de .env");
    }

    info!(
        version = built_info::PKG_VERSION,
        storage = ?config.storage,
        "Iniciando {}",
        built_info::PKG_NAME
    );

    let state = AppState::from_config(&config)
        .await
        .context("Falha ao inicializar o estado da aplicação")?;
    let app = router(state, &config.server);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Endereço do servidor inválido")?;

    info!("Servidor escutando em {}", addr);
    axum::Server::try_bind(&addr)
        .with_context(|| format!("Falha ao abrir a porta {}", addr))?
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Erro no servidor HTTP")?;

    info!("Servidor encerrado");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Falha ao aguardar sinal de encerramento: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Sinal de encerramento recebido");
}
