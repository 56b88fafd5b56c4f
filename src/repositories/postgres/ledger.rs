//! Wallet mutations shared by every repository that moves money.
//!
//! These run on a connection the caller already opened a transaction on; the
//! caller commits.

use super::decode;
use crate::error::RepositoryError;
use crate::models::{
    EntityRef, LedgerEntry, Metadata, Transaction, TransactionCategory, TransactionKind,
    TransactionStatus, Wallet,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

pub(crate) const WALLET_COLUMNS: &str = "user_id, balance, total_earned, total_spent, \
     total_withdrawn, last_activity_at, created_at, updated_at";

pub(crate) const TRANSACTION_COLUMNS: &str = "id, user_id, kind, category, amount, \
     balance_after, description, status, method, related_type, related_id, metadata, \
     created_at, updated_at";

#[derive(Debug, FromRow)]
pub(crate) struct TransactionRow {
    id: Uuid,
    user_id: Uuid,
    kind: String,
    category: String,
    amount: Decimal,
    balance_after: Decimal,
    description: String,
    status: String,
    method: String,
    related_type: Option<String>,
    related_id: Option<Uuid>,
    metadata: Json<Metadata>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = RepositoryError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let related = match (row.related_type, row.related_id) {
            (Some(kind), Some(id)) => Some(decode(EntityRef::from_parts(&kind, id))?),
            _ => None,
        };
        Ok(Transaction {
            id: row.id,
            user_id: row.user_id,
            kind: decode(TransactionKind::from_str(&row.kind))?,
            category: decode(TransactionCategory::from_str(&row.category))?,
            amount: row.amount,
            balance_after: row.balance_after,
            description: row.description,
            status: decode(TransactionStatus::from_str(&row.status))?,
            method: row.method,
            related,
            metadata: row.metadata.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Lock the given wallets in ascending user id order
pub(crate) async fn lock_wallets(
    conn: &mut PgConnection,
    user_ids: &[Uuid],
) -> Result<(), RepositoryError> {
    sqlx::query("SELECT user_id FROM wallets WHERE user_id = ANY($1) ORDER BY user_id FOR UPDATE")
        .bind(user_ids)
        .fetch_all(conn)
        .await?;
    Ok(())
}

/// Create-or-increment the wallet, then append the completed credit
pub(crate) async fn apply_credit(
    conn: &mut PgConnection,
    entry: LedgerEntry,
) -> Result<(Wallet, Transaction), RepositoryError> {
    let wallet = sqlx::query_as::<_, Wallet>(&format!(
        r#"
        INSERT INTO wallets (user_id, balance, total_earned, last_activity_at)
        VALUES ($1, $2, $2, NOW())
        ON CONFLICT (user_id) DO UPDATE
        SET balance = wallets.balance + EXCLUDED.balance,
            total_earned = wallets.total_earned + EXCLUDED.total_earned,
            last_activity_at = NOW(),
            updated_at = NOW()
        RETURNING {}
        "#,
        WALLET_COLUMNS
    ))
    .bind(entry.user_id)
    .bind(entry.amount)
    .fetch_one(&mut *conn)
    .await?;

    let tx = entry.into_transaction(
        TransactionKind::Credit,
        TransactionStatus::Completed,
        wallet.balance,
    );
    insert_transaction(conn, &tx).await?;
    Ok((wallet, tx))
}

/// Conditionally decrement the wallet, then append the completed debit.
///
/// The balance guard sits in the UPDATE itself; a concurrent debit that
/// commits first is re-checked against the new balance.
pub(crate) async fn apply_debit(
    conn: &mut PgConnection,
    entry: LedgerEntry,
) -> Result<(Wallet, Transaction), RepositoryError> {
    let wallet = sqlx::query_as::<_, Wallet>(&format!(
        r#"
        UPDATE wallets
        SET balance = balance - $2,
            total_spent = total_spent + $2,
            last_activity_at = NOW(),
            updated_at = NOW()
        WHERE user_id = $1 AND balance >= $2
        RETURNING {}
        "#,
        WALLET_COLUMNS
    ))
    .bind(entry.user_id)
    .bind(entry.amount)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(RepositoryError::InsufficientBalance {
        required: entry.amount,
    })?;

    let tx = entry.into_transaction(
        TransactionKind::Debit,
        TransactionStatus::Completed,
        wallet.balance,
    );
    insert_transaction(conn, &tx).await?;
    Ok((wallet, tx))
}

pub(crate) async fn insert_transaction(
    conn: &mut PgConnection,
    tx: &Transaction,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r#"
        INSERT INTO transactions (
            id, user_id, kind, category, amount, balance_after, description, status,
            method, related_type, related_id, metadata, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#,
    )
    .bind(tx.id)
    .bind(tx.user_id)
    .bind(tx.kind.as_str())
    .bind(tx.category.as_str())
    .bind(tx.amount)
    .bind(tx.balance_after)
    .bind(&tx.description)
    .bind(tx.status.as_str())
    .bind(&tx.method)
    .bind(tx.related.map(|r| r.entity_type()))
    .bind(tx.related.map(|r| r.entity_id()))
    .bind(Json(&tx.metadata))
    .bind(tx.created_at)
    .bind(tx.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}
