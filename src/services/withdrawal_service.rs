//! Withdrawal workflow.
//!
//! Funds are reserved (debited) when the request is made. Approval records
//! the external payout and never touches the balance again; rejection credits
//! the reserved amount back.

use crate::config::LedgerConfig;
use crate::error::{AppError, AppResult};
use crate::models::{
    check_amount, AccountDetails, Page, PageRequest, PaymentMethod, Wallet, Withdrawal,
    WithdrawalDecision, WithdrawalRefund, WithdrawalStats, WithdrawalStatus,
};
use crate::repositories::WithdrawalRepository;
use crate::services::audit::{self, AuditLogEntry, AuditTrailService};
use crate::services::persist;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub struct WithdrawalService {
    withdrawals: Arc<dyn WithdrawalRepository>,
    config: LedgerConfig,
    audit: Option<Arc<AuditTrailService>>,
}

impl WithdrawalService {
    pub fn new(
        withdrawals: Arc<dyn WithdrawalRepository>,
        config: LedgerConfig,
        audit: Option<Arc<AuditTrailService>>,
    ) -> Self {
        Self {
            withdrawals,
            config,
            audit,
        }
    }

    /// Create a pending withdrawal and reserve the funds.
    ///
    /// Returns the withdrawal and the wallet after the reservation.
    pub async fn request(
        &self,
        user_id: Uuid,
        amount: Decimal,
        method: &str,
        account_details: AccountDetails,
        note: Option<String>,
    ) -> AppResult<(Withdrawal, Wallet)> {
        info!(
            "Withdrawal requested: user={}, amount={}, method={}",
            user_id, amount, method
        );

        // Validate amount
        if amount < self.config.min_withdrawal || amount > self.config.max_withdrawal {
            return Err(AppError::InvalidInput(format!(
                "Withdrawal amount must be between {} and {}",
                self.config.min_withdrawal, self.config.max_withdrawal
            )));
        }
        check_amount(amount).map_err(AppError::InvalidInput)?;

        // Payouts go out through mobile wallets only
        let method = PaymentMethod::from_str(method).map_err(AppError::InvalidInput)?;
        if !method.is_mobile() {
            return Err(AppError::InvalidInput(format!(
                "Withdrawals are not supported via {}; use bkash, nagad or rocket",
                method
            )));
        }
        account_details
            .validate_for(method)
            .map_err(AppError::InvalidInput)?;

        let withdrawal = Withdrawal::new(user_id, amount, method, account_details, note);

        let (withdrawal, wallet, reservation) = persist(
            self.config.operation_timeout(),
            "create withdrawal",
            self.withdrawals.create_withdrawal(&withdrawal),
        )
        .await
        .map_err(|e| {
            if matches!(e, AppError::InsufficientBalance { .. }) {
                warn!("Withdrawal rejected: user={}, amount={}: {}", user_id, amount, e);
            }
            e
        })?;

        info!(
            "Created withdrawal {}: reserved {} (tx={}), balance={}",
            withdrawal.id, withdrawal.amount, reservation.id, wallet.balance
        );
        Ok((withdrawal, wallet))
    }

    /// Approve a pending withdrawal
    pub async fn approve(
        &self,
        withdrawal_id: Uuid,
        admin_id: Uuid,
        external_transaction_id: Option<String>,
        note: Option<String>,
    ) -> AppResult<Withdrawal> {
        let decision = WithdrawalDecision {
            admin_id,
            external_transaction_id,
            note,
        };

        let withdrawal = persist(
            self.config.operation_timeout(),
            "approve withdrawal",
            self.withdrawals.approve_withdrawal(withdrawal_id, decision),
        )
        .await
        .map_err(|e| self.log_conflict(withdrawal_id, e))?;

        info!(
            "Approved withdrawal {}: user={}, amount={}",
            withdrawal.id, withdrawal.user_id, withdrawal.amount
        );
        audit::record(
            &self.audit,
            AuditLogEntry::withdrawal_transition(&withdrawal, Some(admin_id)),
        )
        .await;

        Ok(withdrawal)
    }

    /// Reject a pending withdrawal and refund the reservation
    pub async fn reject(
        &self,
        withdrawal_id: Uuid,
        admin_id: Uuid,
        note: Option<String>,
    ) -> AppResult<WithdrawalRefund> {
        let decision = WithdrawalDecision {
            admin_id,
            external_transaction_id: None,
            note,
        };

        let refund = persist(
            self.config.operation_timeout(),
            "reject withdrawal",
            self.withdrawals.reject_withdrawal(withdrawal_id, decision),
        )
        .await
        .map_err(|e| self.log_conflict(withdrawal_id, e))?;

        info!(
            "Rejected withdrawal {}: refunded {} to user {}, balance={}",
            refund.withdrawal.id,
            refund.refunded_amount,
            refund.withdrawal.user_id,
            refund.new_balance
        );
        audit::record(
            &self.audit,
            AuditLogEntry::withdrawal_transition(&refund.withdrawal, Some(admin_id)),
        )
        .await;

        Ok(refund)
    }

    /// `approved -> processing`, for payouts executed asynchronously
    pub async fn start_processing(&self, withdrawal_id: Uuid) -> AppResult<Withdrawal> {
        self.advance(
            withdrawal_id,
            WithdrawalStatus::Approved,
            WithdrawalStatus::Processing,
            None,
        )
        .await
    }

    /// `processing -> completed`, recording the payout reference
    pub async fn complete(
        &self,
        withdrawal_id: Uuid,
        external_transaction_id: &str,
    ) -> AppResult<Withdrawal> {
        if external_transaction_id.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "External transaction id is required".to_string(),
            ));
        }
        self.advance(
            withdrawal_id,
            WithdrawalStatus::Processing,
            WithdrawalStatus::Completed,
            Some(external_transaction_id.trim().to_string()),
        )
        .await
    }

    async fn advance(
        &self,
        withdrawal_id: Uuid,
        from: WithdrawalStatus,
        to: WithdrawalStatus,
        external_transaction_id: Option<String>,
    ) -> AppResult<Withdrawal> {
        let withdrawal = persist(
            self.config.operation_timeout(),
            "advance withdrawal",
            self.withdrawals
                .advance_withdrawal(withdrawal_id, from, to, external_transaction_id),
        )
        .await
        .map_err(|e| self.log_conflict(withdrawal_id, e))?;

        info!(
            "Withdrawal {} moved {} -> {}",
            withdrawal.id,
            from.as_str(),
            to.as_str()
        );
        audit::record(
            &self.audit,
            AuditLogEntry::withdrawal_transition(&withdrawal, None),
        )
        .await;

        Ok(withdrawal)
    }

    pub async fn get_withdrawal(&self, withdrawal_id: Uuid) -> AppResult<Withdrawal> {
        persist(
            self.config.operation_timeout(),
            "find withdrawal",
            self.withdrawals.find_withdrawal(withdrawal_id),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Withdrawal {} not found", withdrawal_id)))
    }

    pub async fn list_user_withdrawals(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> AppResult<Page<Withdrawal>> {
        self.list(Some(user_id), None, page).await
    }

    pub async fn list_withdrawals(
        &self,
        status: Option<WithdrawalStatus>,
        page: PageRequest,
    ) -> AppResult<Page<Withdrawal>> {
        self.list(None, status, page).await
    }

    pub async fn stats(&self, user_id: Uuid) -> AppResult<WithdrawalStats> {
        persist(
            self.config.operation_timeout(),
            "withdrawal stats",
            self.withdrawals.withdrawal_stats(user_id),
        )
        .await
    }

    async fn list(
        &self,
        user_id: Option<Uuid>,
        status: Option<WithdrawalStatus>,
        page: PageRequest,
    ) -> AppResult<Page<Withdrawal>> {
        page.validate(self.config.max_page_size)
            .map_err(AppError::InvalidInput)?;

        persist(
            self.config.operation_timeout(),
            "list withdrawals",
            self.withdrawals.list_withdrawals(user_id, status, page),
        )
        .await
    }

    fn log_conflict(&self, withdrawal_id: Uuid, err: AppError) -> AppError {
        if matches!(err, AppError::InvalidStateTransition(_)) {
            warn!("Withdrawal {} transition refused: {}", withdrawal_id, err);
        }
        err
    }
}
