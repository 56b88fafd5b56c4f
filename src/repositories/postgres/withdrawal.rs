use super::decode;
use super::ledger;
use crate::error::RepositoryError;
use crate::models::{
    AccountDetails, Page, PageRequest, PaymentMethod, Transaction, Wallet, Withdrawal,
    WithdrawalDecision, WithdrawalRefund, WithdrawalStats, WithdrawalStatus,
};
use crate::repositories::{RepoResult, WithdrawalRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

const WITHDRAWAL_COLUMNS: &str = "id, user_id, amount, payment_method, account_details, note, \
     status, transaction_id, reservation_transaction_id, admin_notes, approved_by, approved_at, \
     rejected_by, rejected_at, completed_at, created_at, updated_at";

#[derive(Debug, FromRow)]
struct WithdrawalRow {
    id: Uuid,
    user_id: Uuid,
    amount: Decimal,
    payment_method: String,
    account_details: Json<AccountDetails>,
    note: Option<String>,
    status: String,
    transaction_id: Option<String>,
    reservation_transaction_id: Option<Uuid>,
    admin_notes: Option<String>,
    approved_by: Option<Uuid>,
    approved_at: Option<DateTime<Utc>>,
    rejected_by: Option<Uuid>,
    rejected_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<WithdrawalRow> for Withdrawal {
    type Error = RepositoryError;

    fn try_from(row: WithdrawalRow) -> Result<Self, Self::Error> {
        Ok(Withdrawal {
            id: row.id,
            user_id: row.user_id,
            amount: row.amount,
            payment_method: decode(PaymentMethod::from_str(&row.payment_method))?,
            account_details: row.account_details.0,
            note: row.note,
            status: decode(WithdrawalStatus::from_str(&row.status))?,
            transaction_id: row.transaction_id,
            reservation_transaction_id: row.reservation_transaction_id,
            admin_notes: row.admin_notes,
            approved_by: row.approved_by,
            approved_at: row.approved_at,
            rejected_by: row.rejected_by,
            rejected_at: row.rejected_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub struct PgWithdrawalRepository {
    pool: PgPool,
}

impl PgWithdrawalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Explain why a compare-and-swap update matched no row
async fn missing_or_conflict(
    conn: &mut PgConnection,
    withdrawal_id: Uuid,
) -> RepositoryError {
    let current: Result<Option<String>, sqlx::Error> =
        sqlx::query_scalar("SELECT status FROM withdrawals WHERE id = $1")
            .bind(withdrawal_id)
            .fetch_optional(conn)
            .await;

    match current {
        Ok(Some(status)) => {
            RepositoryError::StatusConflict(format!("withdrawal {} is {}", withdrawal_id, status))
        }
        Ok(None) => RepositoryError::NotFound(format!("withdrawal {}", withdrawal_id)),
        Err(e) => e.into(),
    }
}

#[async_trait]
impl WithdrawalRepository for PgWithdrawalRepository {
    async fn create_withdrawal(
        &self,
        withdrawal: &Withdrawal,
    ) -> RepoResult<(Withdrawal, Wallet, Transaction)> {
        let mut tx = self.pool.begin().await?;
        let (wallet, reservation) =
            ledger::apply_debit(&mut *tx, withdrawal.reservation_entry()).await?;

        let row = sqlx::query_as::<_, WithdrawalRow>(&format!(
            r#"
            INSERT INTO withdrawals (
                id, user_id, amount, payment_method, account_details, note, status,
                reservation_transaction_id, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            WITHDRAWAL_COLUMNS
        ))
        .bind(withdrawal.id)
        .bind(withdrawal.user_id)
        .bind(withdrawal.amount)
        .bind(withdrawal.payment_method.as_str())
        .bind(Json(&withdrawal.account_details))
        .bind(&withdrawal.note)
        .bind(withdrawal.status.as_str())
        .bind(reservation.id)
        .bind(withdrawal.created_at)
        .bind(withdrawal.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((Withdrawal::try_from(row)?, wallet, reservation))
    }

    async fn find_withdrawal(&self, withdrawal_id: Uuid) -> RepoResult<Option<Withdrawal>> {
        let row = sqlx::query_as::<_, WithdrawalRow>(&format!(
            "SELECT {} FROM withdrawals WHERE id = $1",
            WITHDRAWAL_COLUMNS
        ))
        .bind(withdrawal_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Withdrawal::try_from).transpose()
    }

    async fn approve_withdrawal(
        &self,
        withdrawal_id: Uuid,
        decision: WithdrawalDecision,
    ) -> RepoResult<Withdrawal> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, WithdrawalRow>(&format!(
            r#"
            UPDATE withdrawals
            SET status = 'approved', transaction_id = $2, admin_notes = $3,
                approved_by = $4, approved_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {}
            "#,
            WITHDRAWAL_COLUMNS
        ))
        .bind(withdrawal_id)
        .bind(decision.external_transaction_id)
        .bind(decision.note)
        .bind(decision.admin_id)
        .fetch_optional(&mut *tx)
        .await?;

        let withdrawal = match row {
            Some(row) => Withdrawal::try_from(row)?,
            None => return Err(missing_or_conflict(&mut *tx, withdrawal_id).await),
        };

        // Balance already dropped at request time; only the lifetime total moves
        sqlx::query(
            r#"
            UPDATE wallets
            SET total_withdrawn = total_withdrawn + $2, last_activity_at = NOW(), updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(withdrawal.user_id)
        .bind(withdrawal.amount)
        .execute(&mut *tx)
        .await?;

        if let Some(reservation) = withdrawal.reservation_transaction_id {
            sqlx::query(
                "UPDATE transactions SET status = 'completed', updated_at = NOW() \
                 WHERE id = $1 AND status = 'pending'",
            )
            .bind(reservation)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(withdrawal)
    }

    async fn reject_withdrawal(
        &self,
        withdrawal_id: Uuid,
        decision: WithdrawalDecision,
    ) -> RepoResult<WithdrawalRefund> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, WithdrawalRow>(&format!(
            r#"
            UPDATE withdrawals
            SET status = 'rejected', admin_notes = $2, rejected_by = $3,
                rejected_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {}
            "#,
            WITHDRAWAL_COLUMNS
        ))
        .bind(withdrawal_id)
        .bind(decision.note)
        .bind(decision.admin_id)
        .fetch_optional(&mut *tx)
        .await?;

        let withdrawal = match row {
            Some(row) => Withdrawal::try_from(row)?,
            None => return Err(missing_or_conflict(&mut *tx, withdrawal_id).await),
        };

        let (wallet, refund) = ledger::apply_credit(&mut *tx, withdrawal.refund_entry()).await?;
        tx.commit().await?;

        Ok(WithdrawalRefund {
            refunded_amount: withdrawal.amount,
            withdrawal,
            new_balance: wallet.balance,
            refund_transaction_id: refund.id,
        })
    }

    async fn advance_withdrawal(
        &self,
        withdrawal_id: Uuid,
        from: WithdrawalStatus,
        to: WithdrawalStatus,
        external_transaction_id: Option<String>,
    ) -> RepoResult<Withdrawal> {
        let mut conn = self.pool.acquire().await?;

        let row = sqlx::query_as::<_, WithdrawalRow>(&format!(
            r#"
            UPDATE withdrawals
            SET status = $3,
                transaction_id = COALESCE($4, transaction_id),
                completed_at = CASE WHEN $3 = 'completed' THEN NOW() ELSE completed_at END,
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {}
            "#,
            WITHDRAWAL_COLUMNS
        ))
        .bind(withdrawal_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(external_transaction_id)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => Withdrawal::try_from(row),
            None => Err(missing_or_conflict(&mut *conn, withdrawal_id).await),
        }
    }

    async fn list_withdrawals(
        &self,
        user_id: Option<Uuid>,
        status: Option<WithdrawalStatus>,
        page: PageRequest,
    ) -> RepoResult<Page<Withdrawal>> {
        let status = status.map(|s| s.as_str());

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM withdrawals
            WHERE ($1::UUID IS NULL OR user_id = $1) AND ($2::TEXT IS NULL OR status = $2)
            "#,
        )
        .bind(user_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, WithdrawalRow>(&format!(
            r#"
            SELECT {}
            FROM withdrawals
            WHERE ($1::UUID IS NULL OR user_id = $1) AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
            WITHDRAWAL_COLUMNS
        ))
        .bind(user_id)
        .bind(status)
        .bind(i64::from(page.limit))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(Withdrawal::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            page: page.page,
            limit: page.limit,
            total: total as u64,
        })
    }

    async fn withdrawal_stats(&self, user_id: Uuid) -> RepoResult<WithdrawalStats> {
        let (pending_count, pending_amount): (i64, Decimal) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COALESCE(SUM(amount), 0)
            FROM withdrawals
            WHERE user_id = $1 AND status = 'pending'
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let total_withdrawn: Option<Decimal> =
            sqlx::query_scalar("SELECT total_withdrawn FROM wallets WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(WithdrawalStats {
            pending_count: pending_count as u64,
            pending_amount,
            total_withdrawn: total_withdrawn.unwrap_or(Decimal::ZERO),
        })
    }
}
