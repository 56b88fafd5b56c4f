use crate::config::LedgerConfig;
use crate::error::{AppError, AppResult};
use crate::models::{check_amount, Deposit, DepositStatus, Page, PageRequest, PaymentMethod};
use crate::repositories::DepositRepository;
use crate::services::audit::{self, AuditLogEntry, AuditTrailService};
use crate::services::persist;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Turns claimed external payments into wallet credits
pub struct DepositService {
    deposits: Arc<dyn DepositRepository>,
    config: LedgerConfig,
    audit: Option<Arc<AuditTrailService>>,
}

impl DepositService {
    pub fn new(
        deposits: Arc<dyn DepositRepository>,
        config: LedgerConfig,
        audit: Option<Arc<AuditTrailService>>,
    ) -> Self {
        Self {
            deposits,
            config,
            audit,
        }
    }

    /// Record a pending deposit claim
    pub async fn submit(
        &self,
        user_id: Uuid,
        amount: Decimal,
        method: &str,
        external_transaction_id: &str,
        proof_reference: Option<String>,
    ) -> AppResult<Deposit> {
        info!(
            "Submitting deposit: user={}, amount={}, method={}",
            user_id, amount, method
        );

        // Validate input
        let method = PaymentMethod::from_str(method).map_err(AppError::InvalidInput)?;
        if amount < self.config.min_deposit {
            return Err(AppError::InvalidInput(format!(
                "Minimum deposit is {}",
                self.config.min_deposit
            )));
        }
        check_amount(amount).map_err(AppError::InvalidInput)?;
        let external_transaction_id = external_transaction_id.trim();
        if external_transaction_id.is_empty() {
            return Err(AppError::InvalidInput(
                "External transaction id is required".to_string(),
            ));
        }

        let deposit = Deposit::new(
            user_id,
            amount,
            method,
            external_transaction_id.to_string(),
            proof_reference,
        );

        let deposit = persist(
            self.config.operation_timeout(),
            "insert deposit",
            self.deposits.insert_deposit(&deposit),
        )
        .await
        .map_err(|e| match e {
            // The only unique key on deposits is the external reference
            AppError::DuplicateSubmission(_) => {
                warn!(
                    "Duplicate deposit claim: external transaction {}",
                    external_transaction_id
                );
                AppError::DuplicateExternalTransaction(external_transaction_id.to_string())
            }
            other => other,
        })?;

        info!("Created deposit {} for user {}", deposit.id, user_id);
        Ok(deposit)
    }

    /// Approve a pending deposit and credit the wallet exactly once
    pub async fn approve(
        &self,
        deposit_id: Uuid,
        admin_id: Uuid,
        note: Option<String>,
    ) -> AppResult<Deposit> {
        let (deposit, wallet, credit) = persist(
            self.config.operation_timeout(),
            "approve deposit",
            self.deposits.approve_deposit(deposit_id, admin_id, note),
        )
        .await
        .map_err(|e| {
            if matches!(e, AppError::InvalidStateTransition(_)) {
                warn!("Deposit {} was already processed", deposit_id);
            }
            e
        })?;

        info!(
            "Approved deposit {}: user={}, amount={}, balance={}, tx={}",
            deposit.id, deposit.user_id, deposit.amount, wallet.balance, credit.id
        );
        audit::record(&self.audit, AuditLogEntry::deposit_decision(&deposit, admin_id)).await;

        Ok(deposit)
    }

    /// Reject a pending deposit; the wallet is untouched
    pub async fn reject(
        &self,
        deposit_id: Uuid,
        admin_id: Uuid,
        note: Option<String>,
    ) -> AppResult<Deposit> {
        let deposit = persist(
            self.config.operation_timeout(),
            "reject deposit",
            self.deposits.reject_deposit(deposit_id, admin_id, note),
        )
        .await?;

        info!("Rejected deposit {} for user {}", deposit.id, deposit.user_id);
        audit::record(&self.audit, AuditLogEntry::deposit_decision(&deposit, admin_id)).await;

        Ok(deposit)
    }

    pub async fn get_deposit(&self, deposit_id: Uuid) -> AppResult<Deposit> {
        persist(
            self.config.operation_timeout(),
            "find deposit",
            self.deposits.find_deposit(deposit_id),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Deposit {} not found", deposit_id)))
    }

    /// A user's deposits, newest first
    pub async fn list_user_deposits(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> AppResult<Page<Deposit>> {
        self.list(Some(user_id), None, page).await
    }

    /// Admin queue, optionally filtered by status
    pub async fn list_deposits(
        &self,
        status: Option<DepositStatus>,
        page: PageRequest,
    ) -> AppResult<Page<Deposit>> {
        self.list(None, status, page).await
    }

    async fn list(
        &self,
        user_id: Option<Uuid>,
        status: Option<DepositStatus>,
        page: PageRequest,
    ) -> AppResult<Page<Deposit>> {
        page.validate(self.config.max_page_size)
            .map_err(AppError::InvalidInput)?;

        persist(
            self.config.operation_timeout(),
            "list deposits",
            self.deposits.list_deposits(user_id, status, page),
        )
        .await
    }
}
