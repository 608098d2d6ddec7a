//! # PrintCost API Server
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ApiConfig (env) ──► PricingSettings (pricing.toml + env)               │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  Database (SQLite, migrations) ──► CalculationService ──► axum router   │
//! │                                                                         │
//! │  Ctrl+C / SIGTERM ──► graceful shutdown ──► pool closed                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use printcost_api::{router, ApiConfig, AppState, CalculationService, PricingSettings};
use printcost_db::{Database, DbConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("Starting PrintCost API server...");

    // Load configuration
    let config = ApiConfig::load()?;
    let settings = PricingSettings::load(config.settings_path.clone())
        .context("failed to load pricing settings")?;
    info!(
        port = config.port,
        db_path = %config.database_path.display(),
        default_currency = %settings.default_currency,
        rates = settings.rates.len(),
        "Configuration loaded"
    );

    // Connect to database (migrations run on connect)
    let db = Database::new(DbConfig::new(&config.database_path))
        .await
        .context("failed to open database")?;
    info!("Database ready");

    let service = CalculationService::new(db.clone(), &settings)?;
    let addr = config.socket_addr()?;
    let state = Arc::new(AppState { service, config });

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, "Starting HTTP server");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
