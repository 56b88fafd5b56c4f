//! Arena Ledger Library
//!
//! Wallet ledger, deposit and withdrawal workflows, match result registry and
//! tournament prize settlement. Callers own transport and auth; they hand the
//! engine opaque actor ids.

pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod prize;
pub mod repositories;
pub mod services;

// Re-export commonly used types
pub use config::{AppConfig, LedgerConfig, StorageBackend};
pub use error::{AppError, AppResult};
pub use repositories::Repositories;

use database::{create_pool, run_migrations, Database};
use services::{
    AuditTrailService, DepositService, ResultService, SettlementService, WalletService,
    WithdrawalService,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info};

/// Every workflow, wired to one storage handle
pub struct Engine {
    database: Option<Database>,
    pub wallets: Arc<WalletService>,
    pub deposits: Arc<DepositService>,
    pub withdrawals: Arc<WithdrawalService>,
    pub results: Arc<ResultService>,
    pub settlement: Arc<SettlementService>,
}

impl Engine {
    /// Build the services over an explicit set of repositories
    pub fn new(
        repos: Repositories,
        config: LedgerConfig,
        audit: Option<Arc<AuditTrailService>>,
    ) -> Self {
        Self {
            database: None,
            wallets: Arc::new(WalletService::new(repos.wallets.clone(), config.clone())),
            deposits: Arc::new(DepositService::new(
                repos.deposits.clone(),
                config.clone(),
                audit.clone(),
            )),
            withdrawals: Arc::new(WithdrawalService::new(
                repos.withdrawals.clone(),
                config.clone(),
                audit.clone(),
            )),
            results: Arc::new(ResultService::new(
                repos.results.clone(),
                repos.events.clone(),
                config.clone(),
            )),
            settlement: Arc::new(SettlementService::new(
                repos.events,
                repos.results,
                config,
                audit,
            )),
        }
    }

    /// Engine over PostgreSQL; `shutdown` closes the pool
    pub fn postgres(
        pool: PgPool,
        config: LedgerConfig,
        audit: Option<Arc<AuditTrailService>>,
    ) -> Self {
        let database = Database::new(pool.clone());
        Self {
            database: Some(database),
            ..Self::new(Repositories::postgres(pool), config, audit)
        }
    }

    /// Engine over process memory; state is lost on drop
    pub fn in_memory(config: LedgerConfig) -> Self {
        Self::new(Repositories::in_memory(), config, None)
    }

    /// Build the engine the configuration describes: audit trail, storage
    /// backend and, for Postgres, pool plus migrations
    pub async fn from_config(config: &AppConfig) -> AppResult<Self> {
        let audit = match &config.audit_log_dir {
            Some(dir) => Some(Arc::new(AuditTrailService::new(dir.clone())?)),
            None => None,
        };

        match config.storage_backend {
            StorageBackend::Memory => {
                info!("Using in-memory storage");
                Ok(Self::new(Repositories::in_memory(), config.ledger.clone(), audit))
            }
            StorageBackend::Postgres => {
                info!("Connecting to database...");
                let pool = create_pool(&config.database).await.map_err(|e| {
                    error!("Failed to create database pool: {}", e);
                    AppError::Database(e)
                })?;
                info!("Max connections: {}", config.database.max_connections);

                info!("Running database migrations...");
                run_migrations(&pool, None).await.map_err(|e| {
                    error!("Database migration failed: {}", e);
                    AppError::Database(e)
                })?;
                info!("Database migrations completed successfully");

                Ok(Self::postgres(pool, config.ledger.clone(), audit))
            }
        }
    }

    pub fn database(&self) -> Option<&Database> {
        self.database.as_ref()
    }

    /// Release the storage handle
    pub async fn shutdown(&self) {
        if let Some(database) = &self.database {
            database.close().await;
            info!("Database pool closed");
        }
    }
}
