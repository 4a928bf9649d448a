//! Carebudget API Server
//!
//! Main entry point for the care budget ledger service.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use carebudget_api::{AppState, create_router};
use carebudget_core::{BudgetQueryService, InMemoryLedgerStore, LedgerStore, ServiceSettings};
use carebudget_db::{PgLedgerStore, connect};
use carebudget_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "carebudget=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load().context("failed to load configuration")?;

    // Pick the ledger store
    let store: Arc<dyn LedgerStore> = if config.database.url.is_some() {
        let db = connect(&config.database).await?;
        info!("Connected to database");
        Arc::new(PgLedgerStore::new(db))
    } else {
        warn!("No database url configured, using the in-memory ledger store");
        Arc::new(InMemoryLedgerStore::new())
    };

    // Create application state
    let service = BudgetQueryService::new(store, ServiceSettings::from(&config.ledger));
    let state = AppState::new(Arc::new(service), config.ledger.keep_alive());

    // Create router
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
