use crate::models::{EntityRef, LedgerEntry, PaymentMethod, TransactionCategory};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepositStatus {
    Pending,
    Approved,
    Rejected,
}

impl DepositStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(DepositStatus::Pending),
            "approved" => Ok(DepositStatus::Approved),
            "rejected" => Ok(DepositStatus::Rejected),
            _ => Err(format!("Invalid deposit status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            DepositStatus::Pending => "pending",
            DepositStatus::Approved => "approved",
            DepositStatus::Rejected => "rejected",
        }
    }
}

/// A user's claim of an external payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deposit {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub external_transaction_id: String,
    pub proof_reference: Option<String>,
    pub status: DepositStatus,
    pub admin_note: Option<String>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<Uuid>,
    pub rejected_at: Option<DateTime<Utc>>,
    /// Wallet credit produced by approval
    pub transaction_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deposit {
    pub fn new(
        user_id: Uuid,
        amount: Decimal,
        method: PaymentMethod,
        external_transaction_id: String,
        proof_reference: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            amount,
            method,
            external_transaction_id,
            proof_reference,
            status: DepositStatus::Pending,
            admin_note: None,
            approved_by: None,
            approved_at: None,
            rejected_by: None,
            rejected_at: None,
            transaction_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == DepositStatus::Pending
    }

    /// The single wallet credit an approval produces
    pub fn credit_entry(&self) -> LedgerEntry {
        LedgerEntry::new(self.user_id, self.amount, TransactionCategory::Deposit, "deposit approved")
            .method(self.method.as_str())
            .related(EntityRef::Deposit(self.id))
            .meta("deposit_id", self.id)
            .meta("external_transaction_id", self.external_transaction_id.clone())
    }
}
