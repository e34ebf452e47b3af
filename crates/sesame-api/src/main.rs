//! Sesame API Server
//!
//! Author: hephaex@gmail.com

use anyhow::Context;
use sesame_api::{create_router, state::AppState};
use sesame_core::{AppConfig, LoggingConfig, MemoryStore, PgStore};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_tracing(&config.logging);

    let state = match config.database.postgres_url.as_deref() {
        Some(url) => {
            let store = Arc::new(
                PgStore::new(url, config.database.pool_size)
                    .await
                    .context("Failed to connect to PostgreSQL")?,
            );
            store
                .ensure_schema()
                .await
                .context("Failed to create database schema")?;
            tracing::info!("Using PostgreSQL store");
            AppState::new(config.clone(), store.clone(), store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; sessions and users are kept in memory");
            let store = Arc::new(MemoryStore::default());
            AppState::new(config.clone(), store.clone(), store)
        }
    };

    let app = create_router(Arc::new(state));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Sesame API Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);
    tracing::info!("OpenAPI document at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// `SESAME_CONFIG` names a TOML file; environment variables override it
fn load_config() -> anyhow::Result<AppConfig> {
    let config = match std::env::var("SESAME_CONFIG") {
        Ok(path) => AppConfig::from_file(path)?.with_env_override()?,
        Err(_) => AppConfig::from_env()?,
    };
    Ok(config)
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "sesame_api={level},sesame_core={level},audit=info,tower_http=debug",
            level = logging.level
        ))
    });

    if logging.json_format {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
