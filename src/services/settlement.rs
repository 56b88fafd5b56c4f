use crate::config::LedgerConfig;
use crate::error::{AppError, AppResult};
use crate::models::{
    check_amount, Event, EventKind, EventType, NewWinner, PaymentConfirmation, PrizeStatus,
    ResultStatus, Winner,
};
use crate::prize::{self, PrizeCalculation};
use crate::repositories::{EventRepository, ResultRepository};
use crate::services::audit::{self, AuditLogEntry, AuditTrailService};
use crate::services::persist;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Settlement service: events, prize calculation and distribution
pub struct SettlementService {
    events: Arc<dyn EventRepository>,
    results: Arc<dyn ResultRepository>,
    config: LedgerConfig,
    audit: Option<Arc<AuditTrailService>>,
}

impl SettlementService {
    /// Create a new settlement service
    pub fn new(
        events: Arc<dyn EventRepository>,
        results: Arc<dyn ResultRepository>,
        config: LedgerConfig,
        audit: Option<Arc<AuditTrailService>>,
    ) -> Self {
        Self {
            events,
            results,
            config,
            audit,
        }
    }

    pub async fn create_event(
        &self,
        name: &str,
        kind: EventKind,
        event_type: EventType,
        prize_pool: Decimal,
    ) -> AppResult<Event> {
        info!("Creating event: name={}, type={}", name, event_type.as_str());

        if name.trim().is_empty() {
            return Err(AppError::InvalidInput("Event name is required".to_string()));
        }
        if prize_pool < Decimal::ZERO {
            return Err(AppError::InvalidInput(
                "Prize pool cannot be negative".to_string(),
            ));
        }
        check_amount(prize_pool).map_err(AppError::InvalidInput)?;

        let event = Event::new(name.trim().to_string(), kind, event_type, prize_pool);
        let event = persist(
            self.config.operation_timeout(),
            "insert event",
            self.events.insert_event(&event),
        )
        .await?;

        info!("Created event {} ({})", event.name, event.id);
        Ok(event)
    }

    pub async fn get_event(&self, event_id: Uuid) -> AppResult<Event> {
        persist(
            self.config.operation_timeout(),
            "find event",
            self.events.find_event(event_id),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event {} not found", event_id)))
    }

    /// Rank the event's verified results and split its prize pool
    pub async fn calculate_winners(&self, event_id: Uuid) -> AppResult<PrizeCalculation> {
        let event = self.get_event(event_id).await?;

        let verified = persist(
            self.config.operation_timeout(),
            "list verified results",
            self.results
                .list_results(event_id, Some(ResultStatus::Verified)),
        )
        .await?;

        if verified.is_empty() {
            return Err(AppError::InvalidInput(format!(
                "Event {} has no verified results",
                event_id
            )));
        }

        let winners =
            prize::calculate_winners(&verified, event.prize.prize_pool, &event.event_type);
        let total_distributed = winners.iter().map(|w| w.prize_amount).sum();

        info!(
            "Calculated {} winners for event {}: total {} of pool {}",
            winners.len(),
            event_id,
            total_distributed,
            event.prize.prize_pool
        );

        Ok(PrizeCalculation {
            event_id,
            winners,
            total_distributed,
        })
    }

    /// Store the winners and credit their wallets, at most once per event
    pub async fn apply_winners(
        &self,
        event_id: Uuid,
        winners: Vec<NewWinner>,
        distributed_by: Uuid,
    ) -> AppResult<Event> {
        info!(
            "Prize distribution initiated for event {} by {}",
            event_id, distributed_by
        );

        // Validate winners
        for winner in &winners {
            if winner.rank == 0 {
                return Err(AppError::InvalidInput("Winner rank must be 1 or greater".to_string()));
            }
            if winner.prize_amount < Decimal::ZERO {
                return Err(AppError::InvalidInput(format!(
                    "Prize for rank {} cannot be negative",
                    winner.rank
                )));
            }
            check_amount(winner.prize_amount).map_err(|e| {
                AppError::InvalidInput(format!("Prize for rank {}: {}", winner.rank, e))
            })?;
        }

        let event = self.get_event(event_id).await?;
        if event.prize.prize_status != PrizeStatus::Pending {
            warn!("Prizes for event {} were already distributed", event_id);
            return Err(AppError::AlreadyDistributed(event_id));
        }

        // Each prize fits a money column, but enough of them can still overflow
        let requested = winners
            .iter()
            .try_fold(Decimal::ZERO, |total, w| total.checked_add(w.prize_amount))
            .ok_or_else(|| AppError::InvalidInput("Prize total is out of range".to_string()))?;
        if requested > event.prize.prize_pool {
            return Err(AppError::PrizePoolExceeded {
                prize_pool: event.prize.prize_pool,
                requested,
            });
        }

        let winners: Vec<Winner> = winners.into_iter().map(Winner::from_new).collect();

        // The repository re-checks the status under lock; the check above only
        // saves the round trip
        let (event, credits) = persist(
            self.config.operation_timeout(),
            "distribute prizes",
            self.events
                .distribute_prizes(event_id, winners, distributed_by),
        )
        .await
        .map_err(|e| {
            match &e {
                AppError::AlreadyDistributed(_) => {
                    warn!("Prizes for event {} were already distributed", event_id)
                }
                AppError::PersistenceFailure(_) => {
                    error!("Prize distribution for event {} rolled back", event_id)
                }
                _ => {}
            }
            e
        })?;

        let total: Decimal = credits.iter().map(|tx| tx.amount).sum();
        info!(
            "Distributed prizes for event {}: {} winners, {} wallet credits, total {}",
            event_id,
            event.prize.winners.len(),
            credits.len(),
            total
        );
        audit::record(&self.audit, AuditLogEntry::prizes_distributed(&event, total)).await;

        Ok(event)
    }

    /// Calculate winners from verified results and distribute in one step
    pub async fn settle_from_results(
        &self,
        event_id: Uuid,
        distributed_by: Uuid,
    ) -> AppResult<Event> {
        let calculation = self.calculate_winners(event_id).await?;
        let winners = calculation.winners.into_iter().map(NewWinner::from).collect();
        self.apply_winners(event_id, winners, distributed_by).await
    }

    /// Record an off-platform payout for one winner; no wallet effect
    pub async fn mark_paid(
        &self,
        event_id: Uuid,
        winner_id: Uuid,
        payment: PaymentConfirmation,
    ) -> AppResult<Winner> {
        if payment.external_transaction_id.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "External transaction id is required".to_string(),
            ));
        }
        if payment.paid_amount <= Decimal::ZERO {
            return Err(AppError::InvalidInput(
                "Paid amount must be greater than zero".to_string(),
            ));
        }
        check_amount(payment.paid_amount).map_err(AppError::InvalidInput)?;

        let winner = persist(
            self.config.operation_timeout(),
            "mark winner paid",
            self.events.mark_winner_paid(event_id, winner_id, payment),
        )
        .await?;

        info!(
            "Winner {} of event {} marked paid: {:?}",
            winner.id, event_id, winner.paid_amount
        );
        audit::record(&self.audit, AuditLogEntry::winner_paid(event_id, &winner)).await;

        Ok(winner)
    }

    /// Mark the distribution refunded and reset payout tracking.
    ///
    /// Wallet credits made at distribution stay where they are.
    pub async fn refund(&self, event_id: Uuid, reason: &str) -> AppResult<Event> {
        if reason.trim().is_empty() {
            return Err(AppError::InvalidInput("Refund reason is required".to_string()));
        }

        let event = persist(
            self.config.operation_timeout(),
            "refund prizes",
            self.events.refund_prizes(event_id, reason.trim().to_string()),
        )
        .await?;

        info!("Prizes for event {} refunded: {}", event_id, reason);
        audit::record(&self.audit, AuditLogEntry::prizes_refunded(&event)).await;

        Ok(event)
    }
}
