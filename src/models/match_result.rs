use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Pending,
    Verified,
    Rejected,
}

impl ResultStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ResultStatus::Pending),
            "verified" => Ok(ResultStatus::Verified),
            "rejected" => Ok(ResultStatus::Rejected),
            _ => Err(format!("Invalid result status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Pending => "pending",
            ResultStatus::Verified => "verified",
            ResultStatus::Rejected => "rejected",
        }
    }
}

/// Admin verdict on a submitted result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationDecision {
    Verified,
    Rejected,
}

impl From<VerificationDecision> for ResultStatus {
    fn from(decision: VerificationDecision) -> Self {
        match decision {
            VerificationDecision::Verified => ResultStatus::Verified,
            VerificationDecision::Rejected => ResultStatus::Rejected,
        }
    }
}

/// Performance fields a player reports for one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub player_name: String,
    pub team_name: Option<String>,
    pub kills: u32,
    pub damage: u32,
    pub self_reported_rank: u32,
    pub screenshot_reference: Option<String>,
}

impl PerformanceReport {
    pub fn validate(&self) -> Result<(), String> {
        if self.player_name.trim().is_empty() {
            return Err("Player name is required".to_string());
        }
        if self.self_reported_rank == 0 {
            return Err("Rank must be 1 or greater".to_string());
        }
        Ok(())
    }
}

/// One player's self-reported performance for one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub id: Uuid,
    pub event_id: Uuid,
    pub player_id: Uuid,
    pub player_name: String,
    pub team_name: Option<String>,
    pub kills: u32,
    pub damage: u32,
    pub self_reported_rank: u32,
    pub screenshot_reference: Option<String>,
    pub status: ResultStatus,
    pub verified_by: Option<Uuid>,
    pub verified_at: Option<DateTime<Utc>>,
    pub admin_notes: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MatchResult {
    pub fn new(event_id: Uuid, player_id: Uuid, report: PerformanceReport) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            event_id,
            player_id,
            player_name: report.player_name,
            team_name: report.team_name,
            kills: report.kills,
            damage: report.damage,
            self_reported_rank: report.self_reported_rank,
            screenshot_reference: report.screenshot_reference,
            status: ResultStatus::Pending,
            verified_by: None,
            verified_at: None,
            admin_notes: None,
            submitted_at: now,
            updated_at: now,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.status == ResultStatus::Verified
    }
}

/// One entry in a result's verification history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub id: Uuid,
    pub result_id: Uuid,
    pub event_id: Uuid,
    pub previous_status: ResultStatus,
    pub new_status: ResultStatus,
    pub admin_id: Uuid,
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
}
