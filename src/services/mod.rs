pub mod audit;
pub mod deposit_service;
pub mod result_service;
pub mod settlement;
pub mod wallet_service;
pub mod withdrawal_service;

pub use audit::{AuditLogEntry, AuditTrailService};
pub use deposit_service::DepositService;
pub use result_service::ResultService;
pub use settlement::SettlementService;
pub use wallet_service::WalletService;
pub use withdrawal_service::WithdrawalService;

use crate::error::{AppError, AppResult, RepositoryError};
use std::future::Future;
use std::time::Duration;
use tracing::error;

/// Run one repository call under the configured timeout.
///
/// Dropping a timed-out call drops its open database transaction, which rolls
/// it back, so a timeout never leaves a half-applied unit.
pub(crate) async fn persist<T, F>(timeout: Duration, operation: &str, call: F) -> AppResult<T>
where
    F: Future<Output = Result<T, RepositoryError>>,
{
    let outcome = match tokio::time::timeout(timeout, call).await {
        Ok(outcome) => outcome,
        Err(_) => Err(RepositoryError::Timeout(format!(
            "{} did not finish within {:?}",
            operation, timeout
        ))),
    };

    outcome.map_err(|e| {
        let err = AppError::from(e);
        if matches!(err, AppError::PersistenceFailure(_)) {
            error!("{} failed: {}", operation, err);
        }
        err
    })
}
