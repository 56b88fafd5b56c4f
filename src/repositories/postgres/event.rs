use super::decode;
use super::ledger;
use crate::error::RepositoryError;
use crate::models::{
    Event, EventKind, EventPrizeState, EventType, PaymentConfirmation, PaymentStatus,
    PrizeStatus, Transaction, Winner,
};
use crate::repositories::{EventRepository, RepoResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

const EVENT_COLUMNS: &str = "id, name, kind, event_type, prize_pool, prize_status, winners, \
     distribution_date, distributed_by, refund_reason, refunded_at, created_at, updated_at";

#[derive(Debug, FromRow)]
struct EventRow {
    id: Uuid,
    name: String,
    kind: String,
    event_type: String,
    prize_pool: Decimal,
    prize_status: String,
    winners: Json<Vec<Winner>>,
    distribution_date: Option<DateTime<Utc>>,
    distributed_by: Option<Uuid>,
    refund_reason: Option<String>,
    refunded_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for Event {
    type Error = RepositoryError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(Event {
            id: row.id,
            name: row.name,
            kind: decode(EventKind::from_str(&row.kind))?,
            event_type: EventType::parse(&row.event_type),
            prize: EventPrizeState {
                prize_pool: row.prize_pool,
                prize_status: decode(PrizeStatus::from_str(&row.prize_status))?,
                winners: row.winners.0,
                distribution_date: row.distribution_date,
                distributed_by: row.distributed_by,
                refund_reason: row.refund_reason,
                refunded_at: row.refunded_at,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub struct PgEventRepository {
    pool: PgPool,
}

impl PgEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Lock the event row and require its prize state to be `expected`
async fn lock_event(
    conn: &mut PgConnection,
    event_id: Uuid,
    expected: PrizeStatus,
) -> RepoResult<Event> {
    let row = sqlx::query_as::<_, EventRow>(&format!(
        "SELECT {} FROM events WHERE id = $1 FOR UPDATE",
        EVENT_COLUMNS
    ))
    .bind(event_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| RepositoryError::NotFound(format!("event {}", event_id)))?;

    let event = Event::try_from(row)?;
    if event.prize.prize_status != expected {
        return Err(RepositoryError::StatusConflict(format!(
            "prizes for event {} are {}",
            event_id,
            event.prize.prize_status.as_str()
        )));
    }
    Ok(event)
}

async fn store_winners(conn: &mut PgConnection, event: &Event) -> RepoResult<Event> {
    let row = sqlx::query_as::<_, EventRow>(&format!(
        "UPDATE events SET winners = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
        EVENT_COLUMNS
    ))
    .bind(event.id)
    .bind(Json(&event.prize.winners))
    .fetch_one(conn)
    .await?;

    Event::try_from(row)
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn insert_event(&self, event: &Event) -> RepoResult<Event> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            INSERT INTO events (
                id, name, kind, event_type, prize_pool, prize_status, winners,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            EVENT_COLUMNS
        ))
        .bind(event.id)
        .bind(&event.name)
        .bind(event.kind.as_str())
        .bind(event.event_type.as_str())
        .bind(event.prize.prize_pool)
        .bind(event.prize.prize_status.as_str())
        .bind(Json(&event.prize.winners))
        .bind(event.created_at)
        .bind(event.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Event::try_from(row)
    }

    async fn find_event(&self, event_id: Uuid) -> RepoResult<Option<Event>> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {} FROM events WHERE id = $1",
            EVENT_COLUMNS
        ))
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Event::try_from).transpose()
    }

    async fn distribute_prizes(
        &self,
        event_id: Uuid,
        winners: Vec<Winner>,
        distributed_by: Uuid,
    ) -> RepoResult<(Event, Vec<Transaction>)> {
        let mut tx = self.pool.begin().await?;

        // The status flip is the distribution lock: a concurrent caller blocks
        // on the row and then finds no pending event to update
        let row = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            UPDATE events
            SET prize_status = 'distributed', distribution_date = NOW(),
                distributed_by = $2, updated_at = NOW()
            WHERE id = $1 AND prize_status = 'pending'
            RETURNING {}
            "#,
            EVENT_COLUMNS
        ))
        .bind(event_id)
        .bind(distributed_by)
        .fetch_optional(&mut *tx)
        .await?;

        let mut event = match row {
            Some(row) => Event::try_from(row)?,
            None => {
                let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM events WHERE id = $1")
                    .bind(event_id)
                    .fetch_optional(&mut *tx)
                    .await?;
                return Err(match exists {
                    Some(_) => RepositoryError::AlreadyDistributed(event_id),
                    None => RepositoryError::NotFound(format!("event {}", event_id)),
                });
            }
        };

        let mut credits = Vec::new();
        let mut stored = Vec::with_capacity(winners.len());
        for mut winner in winners {
            if let Some(entry) = event.prize_entry(&winner) {
                let (_, credit) = ledger::apply_credit(&mut *tx, entry).await?;
                winner.credit_transaction_id = Some(credit.id);
                credits.push(credit);
            }
            stored.push(winner);
        }
        event.prize.winners = stored;

        let event = store_winners(&mut *tx, &event).await?;
        tx.commit().await?;
        Ok((event, credits))
    }

    async fn mark_winner_paid(
        &self,
        event_id: Uuid,
        winner_id: Uuid,
        payment: PaymentConfirmation,
    ) -> RepoResult<Winner> {
        let mut tx = self.pool.begin().await?;
        let mut event = lock_event(&mut *tx, event_id, PrizeStatus::Distributed).await?;

        let winner = event
            .prize
            .find_winner_mut(winner_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("winner {}", winner_id)))?;
        if winner.payment_status == PaymentStatus::Paid {
            return Err(RepositoryError::StatusConflict(format!(
                "winner {} is already paid",
                winner_id
            )));
        }
        winner.payment_status = PaymentStatus::Paid;
        winner.transaction_id = Some(payment.external_transaction_id);
        winner.payment_method = Some(payment.payment_method);
        winner.paid_amount = Some(payment.paid_amount);
        winner.paid_at = Some(Utc::now());
        let winner = winner.clone();

        store_winners(&mut *tx, &event).await?;
        tx.commit().await?;
        Ok(winner)
    }

    async fn refund_prizes(&self, event_id: Uuid, reason: String) -> RepoResult<Event> {
        let mut tx = self.pool.begin().await?;
        let mut event = lock_event(&mut *tx, event_id, PrizeStatus::Distributed).await?;

        for winner in event.prize.winners.iter_mut() {
            winner.clear_payment();
        }

        let row = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            UPDATE events
            SET prize_status = 'refunded', refund_reason = $2, refunded_at = NOW(),
                winners = $3, updated_at = NOW()
            WHERE id = $1 AND prize_status = 'distributed'
            RETURNING {}
            "#,
            EVENT_COLUMNS
        ))
        .bind(event_id)
        .bind(reason)
        .bind(Json(&event.prize.winners))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Event::try_from(row)
    }
}
