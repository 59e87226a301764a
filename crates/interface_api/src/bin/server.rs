//! Invoice Ledger - API Server Binary
//!
//! This binary starts the HTTP API server of the invoice ledger.
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration
//! cargo run --bin billing-api
//!
//! # Run against a throwaway in-memory store
//! API_STORAGE=memory API_PORT=8080 cargo run --bin billing-api
//! ```
//!
//! # Environment Variables
//!
//! * `API_HOST` - Server host (default: 0.0.0.0)
//! * `API_PORT` - Server port (default: 8080)
//! * `API_DATABASE_URL` - PostgreSQL connection string
//! * `API_MAX_CONNECTIONS` - Connection pool size (default: 10)
//! * `API_JWT_SECRET` - JWT signing secret (required in production)
//! * `API_JWT_EXPIRATION_SECS` - JWT token expiration in seconds (default: 3600)
//! * `API_LOG_LEVEL` - Log level: trace, debug, info, warn, error (default: info)
//! * `API_LOG_FORMAT` - `plain` or `json` (default: plain)
//! * `API_INVOICE_PREFIX` - Two-letter invoice number prefix (default: BH)
//! * `API_ENABLE_NOTIFICATIONS` - Emit "invoice created" events (default: true)
//! * `API_STORAGE` - `postgres` or `memory` (default: postgres)

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use domain_billing::{InMemoryInvoiceStore, InvoiceService, InvoiceStore};
use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresInvoiceStore};
use interface_api::config::{ApiConfig, LogFormat, StorageBackend};
use interface_api::create_router;
use interface_api::notifier::LogNotifier;

/// Main entry point for the API server.
///
/// Initializes logging, loads configuration, opens the invoice store and
/// starts the HTTP server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = ApiConfig::from_env().context("Failed to load configuration")?;

    init_tracing(&config);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        storage = ?config.storage,
        "Starting Invoice Ledger API Server"
    );

    let store = open_store(&config).await?;
    let prefix = config.invoice_prefix().context("Invalid API_INVOICE_PREFIX")?;

    let service = InvoiceService::new(store, Arc::new(LogNotifier))
        .with_prefix(prefix)
        .with_notifications(config.enable_notifications);

    let app = create_router(Arc::new(service), config.clone());

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .context("Invalid server address")?;

    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// `RUST_LOG` wins over the configured level.
fn init_tracing(config: &ApiConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init(),
        LogFormat::Plain => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init(),
    }
}

/// Opens the configured invoice store, migrating the database if needed
async fn open_store(config: &ApiConfig) -> anyhow::Result<Arc<dyn InvoiceStore>> {
    match config.storage {
        StorageBackend::Memory => {
            tracing::warn!("Using the in-memory invoice store; data is lost on restart");
            Ok(Arc::new(InMemoryInvoiceStore::new()))
        }
        StorageBackend::Postgres => {
            tracing::info!("Connecting to database...");
            let db_config = DatabaseConfig::new(config.database_url.clone())
                .max_connections(config.max_connections);
            let pool = create_pool(db_config)
                .await
                .context("Failed to connect to the database")?;

            run_migrations(&pool)
                .await
                .context("Failed to apply database migrations")?;

            tracing::info!("Database ready");
            Ok(Arc::new(PostgresInvoiceStore::new(pool)))
        }
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// In-flight requests complete before the process exits. A signal handler
/// that cannot be installed is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
