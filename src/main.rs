// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! FitX Auth API Server
//!
//! Serves registration, login (password and Google), token refresh and
//! account administration for the FitX frontend.

use anyhow::Context;
use fitx_auth::{
    config::Config,
    db::{MemoryUserStore, PgUserStore, UserStore},
    services::GoogleVerifier,
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(
        port = config.port,
        environment = ?config.environment,
        base_path = %config.api_base_path,
        "Starting FitX Auth API"
    );

    // Credential store: PostgreSQL when configured, otherwise in-memory
    let store: Arc<dyn UserStore> = match &config.database_url {
        Some(url) => {
            let pg = PgUserStore::connect_lazy(url, &config.timeouts)
                .context("Invalid DATABASE_URL")?;
            // Not fatal: store calls report their own errors.
            if let Err(e) = pg.migrate().await {
                tracing::error!(error = %e, "Schema migration failed");
            }
            tracing::info!("Using PostgreSQL credential store");
            Arc::new(pg)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory credential store");
            Arc::new(MemoryUserStore::new())
        }
    };

    let google =
        Arc::new(GoogleVerifier::new(&config).context("Failed to initialize Google verifier")?);

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), store, google));

    // Build router
    let app = fitx_auth::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> anyhow::Result<()> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fitx_auth=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();

    Ok(())
}
