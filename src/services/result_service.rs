use crate::config::LedgerConfig;
use crate::error::{AppError, AppResult};
use crate::models::{
    MatchResult, PerformanceReport, ResultStatus, VerificationDecision, VerificationRecord,
};
use crate::repositories::{EventRepository, ResultRepository};
use crate::services::persist;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Per-event registry of player-submitted results awaiting verification
pub struct ResultService {
    results: Arc<dyn ResultRepository>,
    events: Arc<dyn EventRepository>,
    config: LedgerConfig,
}

impl ResultService {
    pub fn new(
        results: Arc<dyn ResultRepository>,
        events: Arc<dyn EventRepository>,
        config: LedgerConfig,
    ) -> Self {
        Self {
            results,
            events,
            config,
        }
    }

    /// Submit one player's result; a player submits at most once per event
    pub async fn submit(
        &self,
        event_id: Uuid,
        player_id: Uuid,
        report: PerformanceReport,
    ) -> AppResult<MatchResult> {
        report.validate().map_err(AppError::InvalidInput)?;

        // Event must exist
        persist(
            self.config.operation_timeout(),
            "find event",
            self.events.find_event(event_id),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event {} not found", event_id)))?;

        let result = MatchResult::new(event_id, player_id, report);
        let result = persist(
            self.config.operation_timeout(),
            "insert result",
            self.results.insert_result(&result),
        )
        .await
        .map_err(|e| {
            if matches!(e, AppError::DuplicateSubmission(_)) {
                warn!("Duplicate result: event={}, player={}", event_id, player_id);
            }
            e
        })?;

        info!(
            "Result {} submitted: event={}, player={}, kills={}, rank={}",
            result.id, event_id, player_id, result.kills, result.self_reported_rank
        );
        Ok(result)
    }

    /// Record an admin decision. A later call overwrites the decision; every
    /// call is kept in the verification history.
    pub async fn verify(
        &self,
        event_id: Uuid,
        result_id: Uuid,
        decision: VerificationDecision,
        admin_id: Uuid,
        notes: Option<String>,
    ) -> AppResult<MatchResult> {
        let existing = self.get_result(result_id).await?;
        if existing.event_id != event_id {
            return Err(AppError::NotFound(format!(
                "Result {} not found in event {}",
                result_id, event_id
            )));
        }

        let (result, record) = persist(
            self.config.operation_timeout(),
            "verify result",
            self.results
                .apply_verification(result_id, decision, admin_id, notes),
        )
        .await?;

        info!(
            "Result {} {} -> {} by {}",
            result.id,
            record.previous_status.as_str(),
            record.new_status.as_str(),
            admin_id
        );
        Ok(result)
    }

    /// Apply one decision to many results in order, skipping unknown ids.
    ///
    /// Returns how many results were updated.
    pub async fn bulk_verify(
        &self,
        event_id: Uuid,
        result_ids: &[Uuid],
        decision: VerificationDecision,
        admin_id: Uuid,
        notes: Option<String>,
    ) -> AppResult<usize> {
        let mut updated = 0;
        for &result_id in result_ids {
            match self
                .verify(event_id, result_id, decision, admin_id, notes.clone())
                .await
            {
                Ok(_) => updated += 1,
                Err(AppError::NotFound(msg)) => debug!("Bulk verify skipped: {}", msg),
                Err(e) => return Err(e),
            }
        }

        info!(
            "Bulk verify on event {}: {} of {} results updated",
            event_id,
            updated,
            result_ids.len()
        );
        Ok(updated)
    }

    /// Results for one event in submission order
    pub async fn list_results(
        &self,
        event_id: Uuid,
        status: Option<ResultStatus>,
    ) -> AppResult<Vec<MatchResult>> {
        persist(
            self.config.operation_timeout(),
            "list results",
            self.results.list_results(event_id, status),
        )
        .await
    }

    pub async fn get_result(&self, result_id: Uuid) -> AppResult<MatchResult> {
        persist(
            self.config.operation_timeout(),
            "find result",
            self.results.find_result(result_id),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Result {} not found", result_id)))
    }

    /// Every decision ever recorded for a result, oldest first
    pub async fn verification_history(
        &self,
        result_id: Uuid,
    ) -> AppResult<Vec<VerificationRecord>> {
        self.get_result(result_id).await?;

        persist(
            self.config.operation_timeout(),
            "verification history",
            self.results.verification_history(result_id),
        )
        .await
    }
}
