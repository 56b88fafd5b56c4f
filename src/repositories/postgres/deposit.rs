use super::decode;
use super::ledger;
use crate::error::RepositoryError;
use crate::models::{Deposit, DepositStatus, Page, PageRequest, PaymentMethod, Transaction, Wallet};
use crate::repositories::{DepositRepository, RepoResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

const DEPOSIT_COLUMNS: &str = "id, user_id, amount, method, external_transaction_id, \
     proof_reference, status, admin_note, approved_by, approved_at, rejected_by, rejected_at, \
     transaction_id, created_at, updated_at";

#[derive(Debug, FromRow)]
struct DepositRow {
    id: Uuid,
    user_id: Uuid,
    amount: Decimal,
    method: String,
    external_transaction_id: String,
    proof_reference: Option<String>,
    status: String,
    admin_note: Option<String>,
    approved_by: Option<Uuid>,
    approved_at: Option<DateTime<Utc>>,
    rejected_by: Option<Uuid>,
    rejected_at: Option<DateTime<Utc>>,
    transaction_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DepositRow> for Deposit {
    type Error = RepositoryError;

    fn try_from(row: DepositRow) -> Result<Self, Self::Error> {
        Ok(Deposit {
            id: row.id,
            user_id: row.user_id,
            amount: row.amount,
            method: decode(PaymentMethod::from_str(&row.method))?,
            external_transaction_id: row.external_transaction_id,
            proof_reference: row.proof_reference,
            status: decode(DepositStatus::from_str(&row.status))?,
            admin_note: row.admin_note,
            approved_by: row.approved_by,
            approved_at: row.approved_at,
            rejected_by: row.rejected_by,
            rejected_at: row.rejected_at,
            transaction_id: row.transaction_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub struct PgDepositRepository {
    pool: PgPool,
}

impl PgDepositRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Lock the deposit and require it to still be pending
async fn lock_pending(conn: &mut PgConnection, deposit_id: Uuid) -> RepoResult<Deposit> {
    let row = sqlx::query_as::<_, DepositRow>(&format!(
        "SELECT {} FROM deposits WHERE id = $1 FOR UPDATE",
        DEPOSIT_COLUMNS
    ))
    .bind(deposit_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| RepositoryError::NotFound(format!("deposit {}", deposit_id)))?;

    let deposit = Deposit::try_from(row)?;
    if !deposit.is_pending() {
        return Err(RepositoryError::StatusConflict(format!(
            "deposit {} is {}",
            deposit_id,
            deposit.status.as_str()
        )));
    }
    Ok(deposit)
}

#[async_trait]
impl DepositRepository for PgDepositRepository {
    async fn insert_deposit(&self, deposit: &Deposit) -> RepoResult<Deposit> {
        let row = sqlx::query_as::<_, DepositRow>(&format!(
            r#"
            INSERT INTO deposits (
                id, user_id, amount, method, external_transaction_id, proof_reference,
                status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            DEPOSIT_COLUMNS
        ))
        .bind(deposit.id)
        .bind(deposit.user_id)
        .bind(deposit.amount)
        .bind(deposit.method.as_str())
        .bind(&deposit.external_transaction_id)
        .bind(&deposit.proof_reference)
        .bind(deposit.status.as_str())
        .bind(deposit.created_at)
        .bind(deposit.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Deposit::try_from(row)
    }

    async fn find_deposit(&self, deposit_id: Uuid) -> RepoResult<Option<Deposit>> {
        let row = sqlx::query_as::<_, DepositRow>(&format!(
            "SELECT {} FROM deposits WHERE id = $1",
            DEPOSIT_COLUMNS
        ))
        .bind(deposit_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Deposit::try_from).transpose()
    }

    async fn approve_deposit(
        &self,
        deposit_id: Uuid,
        admin_id: Uuid,
        note: Option<String>,
    ) -> RepoResult<(Deposit, Wallet, Transaction)> {
        let mut tx = self.pool.begin().await?;
        let pending = lock_pending(&mut *tx, deposit_id).await?;
        let (wallet, credit) = ledger::apply_credit(&mut *tx, pending.credit_entry()).await?;

        let row = sqlx::query_as::<_, DepositRow>(&format!(
            r#"
            UPDATE deposits
            SET status = 'approved', approved_by = $2, approved_at = NOW(),
                admin_note = $3, transaction_id = $4, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {}
            "#,
            DEPOSIT_COLUMNS
        ))
        .bind(deposit_id)
        .bind(admin_id)
        .bind(note)
        .bind(credit.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((Deposit::try_from(row)?, wallet, credit))
    }

    async fn reject_deposit(
        &self,
        deposit_id: Uuid,
        admin_id: Uuid,
        note: Option<String>,
    ) -> RepoResult<Deposit> {
        let mut tx = self.pool.begin().await?;
        lock_pending(&mut *tx, deposit_id).await?;

        let row = sqlx::query_as::<_, DepositRow>(&format!(
            r#"
            UPDATE deposits
            SET status = 'rejected', rejected_by = $2, rejected_at = NOW(),
                admin_note = $3, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {}
            "#,
            DEPOSIT_COLUMNS
        ))
        .bind(deposit_id)
        .bind(admin_id)
        .bind(note)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Deposit::try_from(row)
    }

    async fn list_deposits(
        &self,
        user_id: Option<Uuid>,
        status: Option<DepositStatus>,
        page: PageRequest,
    ) -> RepoResult<Page<Deposit>> {
        let status = status.map(|s| s.as_str());

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM deposits
            WHERE ($1::UUID IS NULL OR user_id = $1) AND ($2::TEXT IS NULL OR status = $2)
            "#,
        )
        .bind(user_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, DepositRow>(&format!(
            r#"
            SELECT {}
            FROM deposits
            WHERE ($1::UUID IS NULL OR user_id = $1) AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
            DEPOSIT_COLUMNS
        ))
        .bind(user_id)
        .bind(status)
        .bind(i64::from(page.limit))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(Deposit::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            page: page.page,
            limit: page.limit,
            total: total as u64,
        })
    }
}
