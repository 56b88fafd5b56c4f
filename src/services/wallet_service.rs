//! Wallet ledger: balance movements and their transaction log

use crate::config::LedgerConfig;
use crate::error::{AppError, AppResult};
use crate::models::{
    EntityRef, LedgerEntry, Metadata, Page, PageRequest, Transaction, TransactionCategory,
    TransactionStatus, TransferReceipt, Wallet,
};
use crate::repositories::WalletRepository;
use crate::services::persist;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub struct WalletService {
    wallets: Arc<dyn WalletRepository>,
    config: LedgerConfig,
}

impl WalletService {
    pub fn new(wallets: Arc<dyn WalletRepository>, config: LedgerConfig) -> Self {
        Self { wallets, config }
    }

    /// Add funds, creating the wallet on first use
    pub async fn credit(
        &self,
        user_id: Uuid,
        amount: Decimal,
        description: &str,
        metadata: Metadata,
    ) -> AppResult<(Wallet, Transaction)> {
        let entry = LedgerEntry::new(user_id, amount, TransactionCategory::Adjustment, description)
            .with_metadata(metadata);
        self.post_credit(entry).await
    }

    /// Remove funds; fails with `InsufficientBalance` and no effect when the
    /// balance does not cover `amount`
    pub async fn debit(
        &self,
        user_id: Uuid,
        amount: Decimal,
        description: &str,
        metadata: Metadata,
    ) -> AppResult<(Wallet, Transaction)> {
        let entry = LedgerEntry::new(user_id, amount, TransactionCategory::Adjustment, description)
            .with_metadata(metadata);
        self.post_debit(entry).await
    }

    /// Credit with a caller-built entry (category, method, related entity)
    pub async fn post_credit(&self, entry: LedgerEntry) -> AppResult<(Wallet, Transaction)> {
        entry.validate().map_err(AppError::InvalidInput)?;

        let (wallet, tx) = persist(
            self.config.operation_timeout(),
            "credit",
            self.wallets.credit(entry),
        )
        .await?;

        info!(
            "Credit: user={}, amount={}, balance={}, tx={}",
            wallet.user_id, tx.amount, wallet.balance, tx.id
        );
        Ok((wallet, tx))
    }

    /// Debit with a caller-built entry
    pub async fn post_debit(&self, entry: LedgerEntry) -> AppResult<(Wallet, Transaction)> {
        entry.validate().map_err(AppError::InvalidInput)?;
        let user_id = entry.user_id;
        let amount = entry.amount;

        let (wallet, tx) = persist(
            self.config.operation_timeout(),
            "debit",
            self.wallets.debit(entry),
        )
        .await
        .map_err(|e| {
            if matches!(e, AppError::InsufficientBalance { .. }) {
                warn!("Debit rejected: user={}, amount={}: {}", user_id, amount, e);
            }
            e
        })?;

        info!(
            "Debit: user={}, amount={}, balance={}, tx={}",
            wallet.user_id, tx.amount, wallet.balance, tx.id
        );
        Ok((wallet, tx))
    }

    /// Move funds between two wallets; both legs commit or neither does
    pub async fn transfer(
        &self,
        sender_id: Uuid,
        recipient_id: Uuid,
        amount: Decimal,
        note: Option<String>,
    ) -> AppResult<TransferReceipt> {
        if sender_id == recipient_id {
            return Err(AppError::InvalidInput(
                "Cannot transfer to the same wallet".to_string(),
            ));
        }

        let transfer_id = Uuid::new_v4();
        let note = note.unwrap_or_default();
        let leg = |user_id: Uuid, description: String, counterparty: Uuid| {
            let mut entry =
                LedgerEntry::new(user_id, amount, TransactionCategory::Transfer, description)
                    .related(EntityRef::Transfer(transfer_id))
                    .meta("transfer_id", transfer_id)
                    .meta("counterparty", counterparty);
            if !note.is_empty() {
                entry = entry.meta("note", note.as_str());
            }
            entry
        };

        let debit = leg(sender_id, format!("transfer to {}", recipient_id), recipient_id);
        let credit = leg(recipient_id, format!("transfer from {}", sender_id), sender_id);
        debit.validate().map_err(AppError::InvalidInput)?;

        let receipt = persist(
            self.config.operation_timeout(),
            "transfer",
            self.wallets.transfer(debit, credit),
        )
        .await
        .map_err(|e| {
            if matches!(e, AppError::InsufficientBalance { .. }) {
                warn!(
                    "Transfer rejected: sender={}, recipient={}, amount={}",
                    sender_id, recipient_id, amount
                );
            }
            e
        })?;

        info!(
            "Transfer {}: sender={}, recipient={}, amount={}",
            receipt.transfer_id, sender_id, recipient_id, amount
        );
        Ok(receipt)
    }

    pub async fn get_balance(&self, user_id: Uuid) -> AppResult<Decimal> {
        Ok(self.get_wallet(user_id).await?.balance)
    }

    /// Balance and lifetime totals; a user with no activity reads as all zero
    pub async fn get_wallet(&self, user_id: Uuid) -> AppResult<Wallet> {
        let wallet = persist(
            self.config.operation_timeout(),
            "find wallet",
            self.wallets.find_wallet(user_id),
        )
        .await?;

        Ok(wallet.unwrap_or_else(|| Wallet::empty(user_id)))
    }

    pub async fn get_transaction(&self, transaction_id: Uuid) -> AppResult<Transaction> {
        persist(
            self.config.operation_timeout(),
            "find transaction",
            self.wallets.find_transaction(transaction_id),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Transaction {} not found", transaction_id)))
    }

    /// Newest first
    pub async fn list_transactions(
        &self,
        user_id: Uuid,
        page: PageRequest,
        status: Option<TransactionStatus>,
    ) -> AppResult<Page<Transaction>> {
        page.validate(self.config.max_page_size)
            .map_err(AppError::InvalidInput)?;

        persist(
            self.config.operation_timeout(),
            "list transactions",
            self.wallets.list_transactions(user_id, status, page),
        )
        .await
    }
}
