//! Arena Ledger Service
//!
//! Process bootstrap for the ledger engine: configuration, logging, storage
//! and graceful shutdown. Request handling is mounted by the embedding
//! service on top of [`arena_ledger::Engine`].

use arena_ledger::{AppConfig, AppError, AppResult, Engine};
use tracing::{error, info};

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("arena_ledger={},sqlx=warn", config.log_level).into()
    });

    if config.json_logs() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load environment variables first
    dotenv::dotenv().ok();

    // Load configuration
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        AppError::Config(e)
    })?;

    // Initialize tracing/logging with config
    init_tracing(&config);

    info!("Arena ledger starting");
    info!("Environment: {}", config.environment);
    info!("Log level: {}", config.log_level);
    info!("Storage backend: {}", config.storage_backend.as_str());
    info!(
        "Limits: deposit >= {}, withdrawal {}..={}, timeout {}ms",
        config.ledger.min_deposit,
        config.ledger.min_withdrawal,
        config.ledger.max_withdrawal,
        config.ledger.operation_timeout_ms
    );
    match &config.audit_log_dir {
        Some(dir) => info!("Audit trail directory: {:?}", dir),
        None => info!("Audit trail disabled (AUDIT_LOG_DIR not set)"),
    }

    let engine = Engine::from_config(&config).await.map_err(|e| {
        error!("Failed to initialize ledger engine: {}", e);
        e
    })?;
    info!("✓ Wallet, deposit, withdrawal, result and settlement services initialized");
    info!("Press Ctrl+C to shutdown gracefully");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received, shutting down gracefully...");

    engine.shutdown().await;
    info!("Arena ledger shutdown complete");
    Ok(())
}
