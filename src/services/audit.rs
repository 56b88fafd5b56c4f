use crate::error::{AppError, AppResult};
use crate::models::{Deposit, Event, Winner, Withdrawal};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// Audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub timestamp: i64,
    pub action: String, // "deposit_approved", "withdrawal_rejected", "prizes_distributed", etc.
    pub entity_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub details: serde_json::Value,
}

impl AuditLogEntry {
    fn new(action: &str, entity_id: Uuid, actor_id: Option<Uuid>, details: serde_json::Value) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp(),
            action: action.to_string(),
            entity_id,
            actor_id,
            details,
        }
    }

    /// Deposit approval or rejection
    pub fn deposit_decision(deposit: &Deposit, admin_id: Uuid) -> Self {
        Self::new(
            &format!("deposit_{}", deposit.status.as_str()),
            deposit.id,
            Some(admin_id),
            serde_json::json!({
                "user_id": deposit.user_id.to_string(),
                "amount": deposit.amount.to_string(),
                "method": deposit.method.as_str(),
                "external_transaction_id": deposit.external_transaction_id,
                "transaction_id": deposit.transaction_id.map(|id| id.to_string()),
            }),
        )
    }

    /// Any withdrawal status change made by an admin or the payout path
    pub fn withdrawal_transition(withdrawal: &Withdrawal, actor_id: Option<Uuid>) -> Self {
        Self::new(
            &format!("withdrawal_{}", withdrawal.status.as_str()),
            withdrawal.id,
            actor_id,
            serde_json::json!({
                "user_id": withdrawal.user_id.to_string(),
                "amount": withdrawal.amount.to_string(),
                "payment_method": withdrawal.payment_method.as_str(),
                "external_transaction_id": withdrawal.transaction_id,
            }),
        )
    }

    pub fn prizes_distributed(event: &Event, total: Decimal) -> Self {
        Self::new(
            "prizes_distributed",
            event.id,
            event.prize.distributed_by,
            serde_json::json!({
                "prize_pool": event.prize.prize_pool.to_string(),
                "total_distributed": total.to_string(),
                "winners": event.prize.winners.len(),
            }),
        )
    }

    pub fn winner_paid(event_id: Uuid, winner: &Winner) -> Self {
        Self::new(
            "winner_paid",
            event_id,
            None,
            serde_json::json!({
                "winner_id": winner.id.to_string(),
                "rank": winner.rank,
                "player_id": winner.player_id.map(|id| id.to_string()),
                "paid_amount": winner.paid_amount.map(|a| a.to_string()),
                "payment_method": winner.payment_method,
                "external_transaction_id": winner.transaction_id,
            }),
        )
    }

    pub fn prizes_refunded(event: &Event) -> Self {
        Self::new(
            "prizes_refunded",
            event.id,
            None,
            serde_json::json!({
                "reason": event.prize.refund_reason,
                "winners": event.prize.winners.len(),
            }),
        )
    }
}

/// Audit trail service for logging every money-moving decision
pub struct AuditTrailService {
    log_file: PathBuf,
    file_handle: Arc<Mutex<std::fs::File>>,
}

impl AuditTrailService {
    /// Create a new audit trail service
    pub fn new(log_directory: PathBuf) -> AppResult<Self> {
        // Ensure directory exists
        std::fs::create_dir_all(&log_directory)
            .map_err(|e| AppError::Message(format!("Failed to create log directory: {}", e)))?;

        // Create log file with date
        let date = chrono::Utc::now().format("%Y-%m-%d");
        let log_file = log_directory.join(format!("audit_{}.log", date));

        // Open file in append mode
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .map_err(|e| AppError::Message(format!("Failed to open audit log file: {}", e)))?;

        info!("Audit trail initialized: {:?}", log_file);

        Ok(Self {
            log_file,
            file_handle: Arc::new(Mutex::new(file)),
        })
    }

    pub fn log_file(&self) -> &PathBuf {
        &self.log_file
    }

    /// Log an audit entry
    pub async fn log(&self, entry: AuditLogEntry) -> AppResult<()> {
        let json = serde_json::to_string(&entry)?;

        let mut file = self.file_handle.lock().await;
        writeln!(file, "{}", json)
            .map_err(|e| AppError::Message(format!("Failed to write audit log: {}", e)))?;

        file.flush()
            .map_err(|e| AppError::Message(format!("Failed to flush audit log: {}", e)))?;

        Ok(())
    }
}

/// Write to the trail if one is configured.
///
/// The ledger change is already committed when this runs, so a write failure
/// is logged and swallowed.
pub(crate) async fn record(audit: &Option<Arc<AuditTrailService>>, entry: AuditLogEntry) {
    if let Some(audit) = audit {
        let action = entry.action.clone();
        if let Err(e) = audit.log(entry).await {
            warn!("Failed to write audit entry {}: {}", action, e);
        }
    }
}
