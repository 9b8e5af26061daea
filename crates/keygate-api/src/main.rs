//! Keygate API Server
//!
//! Configuration comes from the TOML file named by `KEYGATE_CONFIG` when
//! set, with environment variables taking precedence, or from the
//! environment alone.
//!
//! Author: hephaex@gmail.com

use anyhow::Context;
use keygate_api::{create_router, state::AppState};
use keygate_core::config::{AppConfig, LoggingConfig};
use keygate_core::{AccountDirectory, InMemoryDirectory, PgAccountDirectory};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_tracing(&config.logging);
    config.validate().context("Invalid configuration")?;

    let directory = open_directory(&config).await?;
    let state = Arc::new(AppState::new(config, directory).context("Invalid password hashing parameters")?);

    if let Some((username, password)) = state.config.bootstrap.admin_credentials() {
        state
            .auth_service()
            .ensure_admin(username, password)
            .await
            .context("Failed to seed the bootstrap admin account")?;
    }

    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Keygate API Server starting on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped gracefully");
    Ok(())
}

fn load_config() -> anyhow::Result<AppConfig> {
    let config = match std::env::var("KEYGATE_CONFIG") {
        Ok(path) => AppConfig::from_file(path)?.with_env_override()?,
        Err(_) => AppConfig::from_env()?,
    };
    Ok(config)
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{level},keygate_api={level},audit=info,tower_http=info",
            level = logging.level
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json_format {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn open_directory(config: &AppConfig) -> anyhow::Result<Arc<dyn AccountDirectory>> {
    match &config.database.postgres_url {
        Some(url) => {
            let directory = PgAccountDirectory::connect(url, config.database.pool_size).await?;
            directory.ensure_schema().await?;
            tracing::info!("Using PostgreSQL account directory");
            Ok(Arc::new(directory))
        }
        None => {
            tracing::warn!("DATABASE_URL is not set; accounts are kept in memory and lost on restart");
            Ok(Arc::new(InMemoryDirectory::new()))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
