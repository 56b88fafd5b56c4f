use super::{decode, decode_count};
use crate::error::RepositoryError;
use crate::models::{MatchResult, ResultStatus, VerificationDecision, VerificationRecord};
use crate::repositories::{RepoResult, ResultRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

const RESULT_COLUMNS: &str = "id, event_id, player_id, player_name, team_name, kills, damage, \
     self_reported_rank, screenshot_reference, status, verified_by, verified_at, admin_notes, \
     submitted_at, updated_at";

const VERIFICATION_COLUMNS: &str =
    "id, result_id, event_id, previous_status, new_status, admin_id, notes, recorded_at";

#[derive(Debug, FromRow)]
struct ResultRow {
    id: Uuid,
    event_id: Uuid,
    player_id: Uuid,
    player_name: String,
    team_name: Option<String>,
    kills: i64,
    damage: i64,
    self_reported_rank: i64,
    screenshot_reference: Option<String>,
    status: String,
    verified_by: Option<Uuid>,
    verified_at: Option<DateTime<Utc>>,
    admin_notes: Option<String>,
    submitted_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ResultRow> for MatchResult {
    type Error = RepositoryError;

    fn try_from(row: ResultRow) -> Result<Self, Self::Error> {
        Ok(MatchResult {
            id: row.id,
            event_id: row.event_id,
            player_id: row.player_id,
            player_name: row.player_name,
            team_name: row.team_name,
            kills: decode_count(row.kills, "kills")?,
            damage: decode_count(row.damage, "damage")?,
            self_reported_rank: decode_count(row.self_reported_rank, "self_reported_rank")?,
            screenshot_reference: row.screenshot_reference,
            status: decode(ResultStatus::from_str(&row.status))?,
            verified_by: row.verified_by,
            verified_at: row.verified_at,
            admin_notes: row.admin_notes,
            submitted_at: row.submitted_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct VerificationRow {
    id: Uuid,
    result_id: Uuid,
    event_id: Uuid,
    previous_status: String,
    new_status: String,
    admin_id: Uuid,
    notes: Option<String>,
    recorded_at: DateTime<Utc>,
}

impl TryFrom<VerificationRow> for VerificationRecord {
    type Error = RepositoryError;

    fn try_from(row: VerificationRow) -> Result<Self, Self::Error> {
        Ok(VerificationRecord {
            id: row.id,
            result_id: row.result_id,
            event_id: row.event_id,
            previous_status: decode(ResultStatus::from_str(&row.previous_status))?,
            new_status: decode(ResultStatus::from_str(&row.new_status))?,
            admin_id: row.admin_id,
            notes: row.notes,
            recorded_at: row.recorded_at,
        })
    }
}

pub struct PgResultRepository {
    pool: PgPool,
}

impl PgResultRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResultRepository for PgResultRepository {
    async fn insert_result(&self, result: &MatchResult) -> RepoResult<MatchResult> {
        let row = sqlx::query_as::<_, ResultRow>(&format!(
            r#"
            INSERT INTO match_results (
                id, event_id, player_id, player_name, team_name, kills, damage,
                self_reported_rank, screenshot_reference, status, submitted_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {}
            "#,
            RESULT_COLUMNS
        ))
        .bind(result.id)
        .bind(result.event_id)
        .bind(result.player_id)
        .bind(&result.player_name)
        .bind(&result.team_name)
        .bind(i64::from(result.kills))
        .bind(i64::from(result.damage))
        .bind(i64::from(result.self_reported_rank))
        .bind(&result.screenshot_reference)
        .bind(result.status.as_str())
        .bind(result.submitted_at)
        .bind(result.updated_at)
        .fetch_one(&self.pool)
        .await?;

        MatchResult::try_from(row)
    }

    async fn find_result(&self, result_id: Uuid) -> RepoResult<Option<MatchResult>> {
        let row = sqlx::query_as::<_, ResultRow>(&format!(
            "SELECT {} FROM match_results WHERE id = $1",
            RESULT_COLUMNS
        ))
        .bind(result_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(MatchResult::try_from).transpose()
    }

    async fn apply_verification(
        &self,
        result_id: Uuid,
        decision: VerificationDecision,
        admin_id: Uuid,
        notes: Option<String>,
    ) -> RepoResult<(MatchResult, VerificationRecord)> {
        let mut tx = self.pool.begin().await?;

        let previous: String =
            sqlx::query_scalar("SELECT status FROM match_results WHERE id = $1 FOR UPDATE")
                .bind(result_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| RepositoryError::NotFound(format!("result {}", result_id)))?;
        let new_status = ResultStatus::from(decision);

        let row = sqlx::query_as::<_, ResultRow>(&format!(
            r#"
            UPDATE match_results
            SET status = $2, verified_by = $3, verified_at = NOW(), admin_notes = $4,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            RESULT_COLUMNS
        ))
        .bind(result_id)
        .bind(new_status.as_str())
        .bind(admin_id)
        .bind(&notes)
        .fetch_one(&mut *tx)
        .await?;
        let result = MatchResult::try_from(row)?;

        let record = sqlx::query_as::<_, VerificationRow>(&format!(
            r#"
            INSERT INTO result_verifications (
                id, result_id, event_id, previous_status, new_status, admin_id, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            VERIFICATION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(result_id)
        .bind(result.event_id)
        .bind(&previous)
        .bind(new_status.as_str())
        .bind(admin_id)
        .bind(notes)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((result, VerificationRecord::try_from(record)?))
    }

    async fn list_results(
        &self,
        event_id: Uuid,
        status: Option<ResultStatus>,
    ) -> RepoResult<Vec<MatchResult>> {
        let rows = sqlx::query_as::<_, ResultRow>(&format!(
            r#"
            SELECT {}
            FROM match_results
            WHERE event_id = $1 AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY submitted_at, id
            "#,
            RESULT_COLUMNS
        ))
        .bind(event_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(MatchResult::try_from).collect()
    }

    async fn verification_history(&self, result_id: Uuid) -> RepoResult<Vec<VerificationRecord>> {
        let rows = sqlx::query_as::<_, VerificationRow>(&format!(
            "SELECT {} FROM result_verifications WHERE result_id = $1 ORDER BY recorded_at, id",
            VERIFICATION_COLUMNS
        ))
        .bind(result_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(VerificationRecord::try_from).collect()
    }
}
