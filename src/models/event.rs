use crate::models::{EntityRef, LedgerEntry, TransactionCategory};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether the event is a single match or a multi-round tournament
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Match,
    Tournament,
}

impl EventKind {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "match" => Ok(EventKind::Match),
            "tournament" => Ok(EventKind::Tournament),
            _ => Err(format!("Invalid event kind: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Match => "match",
            EventKind::Tournament => "tournament",
        }
    }
}

/// Team format; drives scoring and the prize split
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Solo,
    Duo,
    Squad,
    /// Any other format; scored and split like solo
    Other(String),
}

impl EventType {
    /// Convert from database string; unknown formats are kept verbatim
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "solo" => EventType::Solo,
            "duo" => EventType::Duo,
            "squad" => EventType::Squad,
            other => EventType::Other(other.to_string()),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &str {
        match self {
            EventType::Solo => "solo",
            EventType::Duo => "duo",
            EventType::Squad => "squad",
            EventType::Other(name) => name,
        }
    }
}

/// Prize settlement status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrizeStatus {
    Pending,
    Distributed,
    Refunded,
}

impl PrizeStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(PrizeStatus::Pending),
            "distributed" => Ok(PrizeStatus::Distributed),
            "refunded" => Ok(PrizeStatus::Refunded),
            _ => Err(format!("Invalid prize status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            PrizeStatus::Pending => "pending",
            PrizeStatus::Distributed => "distributed",
            PrizeStatus::Refunded => "refunded",
        }
    }
}

/// Off-platform payout tracking for one winner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

/// Winner as supplied to settlement, either calculated or entered manually
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWinner {
    pub rank: u32,
    /// Manually entered winners may not map to a platform account
    pub player_id: Option<Uuid>,
    pub player_name: String,
    pub team_name: Option<String>,
    pub kills: u32,
    pub damage: u32,
    pub total_score: Decimal,
    pub prize_amount: Decimal,
}

/// Winner stored on the event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Winner {
    pub id: Uuid,
    pub rank: u32,
    pub player_id: Option<Uuid>,
    pub player_name: String,
    pub team_name: Option<String>,
    pub kills: u32,
    pub damage: u32,
    pub total_score: Decimal,
    pub prize_amount: Decimal,
    pub payment_status: PaymentStatus,
    /// External payout reference recorded by MarkPaid
    pub transaction_id: Option<String>,
    pub payment_method: Option<String>,
    pub paid_amount: Option<Decimal>,
    pub paid_at: Option<DateTime<Utc>>,
    /// Wallet credit applied at distribution
    pub credit_transaction_id: Option<Uuid>,
}

impl Winner {
    pub fn from_new(winner: NewWinner) -> Self {
        Self {
            id: Uuid::new_v4(),
            rank: winner.rank,
            player_id: winner.player_id,
            player_name: winner.player_name,
            team_name: winner.team_name,
            kills: winner.kills,
            damage: winner.damage,
            total_score: winner.total_score,
            prize_amount: winner.prize_amount,
            payment_status: PaymentStatus::Pending,
            transaction_id: None,
            payment_method: None,
            paid_amount: None,
            paid_at: None,
            credit_transaction_id: None,
        }
    }

    /// Whether distribution should credit a wallet for this winner
    pub fn is_creditable(&self) -> bool {
        self.player_id.is_some() && self.prize_amount > Decimal::ZERO
    }

    pub(crate) fn clear_payment(&mut self) {
        self.payment_status = PaymentStatus::Pending;
        self.transaction_id = None;
        self.payment_method = None;
        self.paid_amount = None;
        self.paid_at = None;
    }
}

/// Manual payout confirmation for one winner
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentConfirmation {
    pub external_transaction_id: String,
    pub payment_method: String,
    pub paid_amount: Decimal,
}

/// Prize settlement state embedded in the event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPrizeState {
    pub prize_pool: Decimal,
    pub prize_status: PrizeStatus,
    pub winners: Vec<Winner>,
    pub distribution_date: Option<DateTime<Utc>>,
    pub distributed_by: Option<Uuid>,
    pub refund_reason: Option<String>,
    pub refunded_at: Option<DateTime<Utc>>,
}

impl EventPrizeState {
    pub fn new(prize_pool: Decimal) -> Self {
        Self {
            prize_pool,
            prize_status: PrizeStatus::Pending,
            winners: Vec::new(),
            distribution_date: None,
            distributed_by: None,
            refund_reason: None,
            refunded_at: None,
        }
    }

    pub fn total_prizes(&self) -> Decimal {
        self.winners.iter().map(|w| w.prize_amount).sum()
    }

    pub fn find_winner_mut(&mut self, winner_id: Uuid) -> Option<&mut Winner> {
        self.winners.iter_mut().find(|w| w.id == winner_id)
    }
}

/// A match or tournament owning a prize pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub kind: EventKind,
    pub event_type: EventType,
    pub prize: EventPrizeState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Create a new Event
    pub fn new(name: String, kind: EventKind, event_type: EventType, prize_pool: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            kind,
            event_type,
            prize: EventPrizeState::new(prize_pool),
            created_at: now,
            updated_at: now,
        }
    }

    /// Wallet credit for one winner; `None` when the winner has no account
    /// or no prize
    pub fn prize_entry(&self, winner: &Winner) -> Option<LedgerEntry> {
        if !winner.is_creditable() {
            return None;
        }
        let player_id = winner.player_id?;
        Some(
            LedgerEntry::new(
                player_id,
                winner.prize_amount,
                TransactionCategory::Prize,
                format!("prize for rank {} in {}", winner.rank, self.name),
            )
            .method("prize")
            .related(EntityRef::Event(self.id))
            .meta("event_id", self.id)
            .meta("winner_id", winner.id)
            .meta("rank", i64::from(winner.rank)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_parsing() {
        assert_eq!(EventType::parse("SQUAD"), EventType::Squad);
        assert_eq!(EventType::parse("duo").as_str(), "duo");
        let custom = EventType::parse("clash");
        assert_eq!(custom, EventType::Other("clash".into()));
        assert_eq!(custom.as_str(), "clash");
    }

    #[test]
    fn test_prize_status_conversion() {
        assert_eq!(PrizeStatus::from_str("distributed").unwrap(), PrizeStatus::Distributed);
        assert_eq!(PrizeStatus::Refunded.as_str(), "refunded");
        assert!(PrizeStatus::from_str("paid").is_err());
    }

    #[test]
    fn test_winner_creditable_requires_player() {
        let mut winner = Winner::from_new(NewWinner {
            rank: 1,
            player_id: None,
            player_name: "walk-in".into(),
            team_name: None,
            kills: 0,
            damage: 0,
            total_score: Decimal::ZERO,
            prize_amount: Decimal::new(100, 0),
        });
        assert!(!winner.is_creditable());
        winner.player_id = Some(Uuid::new_v4());
        assert!(winner.is_creditable());
    }
}
