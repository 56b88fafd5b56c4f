use super::ledger::{self, TransactionRow, TRANSACTION_COLUMNS, WALLET_COLUMNS};
use crate::models::{
    LedgerEntry, Page, PageRequest, Transaction, TransactionStatus, TransferReceipt, Wallet,
};
use crate::repositories::{RepoResult, WalletRepository};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgWalletRepository {
    pool: PgPool,
}

impl PgWalletRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WalletRepository for PgWalletRepository {
    async fn find_wallet(&self, user_id: Uuid) -> RepoResult<Option<Wallet>> {
        let wallet = sqlx::query_as::<_, Wallet>(&format!(
            "SELECT {} FROM wallets WHERE user_id = $1",
            WALLET_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(wallet)
    }

    async fn credit(&self, entry: LedgerEntry) -> RepoResult<(Wallet, Transaction)> {
        let mut tx = self.pool.begin().await?;
        let applied = ledger::apply_credit(&mut *tx, entry).await?;
        tx.commit().await?;
        Ok(applied)
    }

    async fn debit(&self, entry: LedgerEntry) -> RepoResult<(Wallet, Transaction)> {
        let mut tx = self.pool.begin().await?;
        let applied = ledger::apply_debit(&mut *tx, entry).await?;
        tx.commit().await?;
        Ok(applied)
    }

    async fn transfer(
        &self,
        debit: LedgerEntry,
        credit: LedgerEntry,
    ) -> RepoResult<TransferReceipt> {
        let transfer_id = debit
            .related
            .map(|r| r.entity_id())
            .unwrap_or_else(Uuid::new_v4);

        let mut tx = self.pool.begin().await?;
        // Fixed lock order so two opposite transfers cannot deadlock
        ledger::lock_wallets(&mut *tx, &[debit.user_id, credit.user_id]).await?;
        let (sender, debit) = ledger::apply_debit(&mut *tx, debit).await?;
        let (recipient, credit) = ledger::apply_credit(&mut *tx, credit).await?;
        tx.commit().await?;

        Ok(TransferReceipt {
            transfer_id,
            sender,
            recipient,
            debit,
            credit,
        })
    }

    async fn find_transaction(&self, transaction_id: Uuid) -> RepoResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions WHERE id = $1",
            TRANSACTION_COLUMNS
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Transaction::try_from).transpose()
    }

    async fn list_transactions(
        &self,
        user_id: Uuid,
        status: Option<TransactionStatus>,
        page: PageRequest,
    ) -> RepoResult<Page<Transaction>> {
        let status = status.map(|s| s.as_str());

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM transactions WHERE user_id = $1 AND ($2::TEXT IS NULL OR status = $2)",
        )
        .bind(user_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            SELECT {}
            FROM transactions
            WHERE user_id = $1 AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(user_id)
        .bind(status)
        .bind(i64::from(page.limit))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(Transaction::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            page: page.page,
            limit: page.limit,
            total: total as u64,
        })
    }
}
