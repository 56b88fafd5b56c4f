use crate::models::{
    is_valid_mobile_number, EntityRef, LedgerEntry, PaymentMethod, TransactionCategory,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Withdrawal lifecycle.
///
/// `pending -> approved | rejected`, then `approved -> processing -> completed`
/// for payouts that are executed asynchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
    Processing,
    Completed,
}

impl WithdrawalStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(WithdrawalStatus::Pending),
            "approved" => Ok(WithdrawalStatus::Approved),
            "rejected" => Ok(WithdrawalStatus::Rejected),
            "processing" => Ok(WithdrawalStatus::Processing),
            "completed" => Ok(WithdrawalStatus::Completed),
            _ => Err(format!("Invalid withdrawal status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Rejected => "rejected",
            WithdrawalStatus::Processing => "processing",
            WithdrawalStatus::Completed => "completed",
        }
    }

    pub fn can_transition_to(&self, next: WithdrawalStatus) -> bool {
        use WithdrawalStatus::*;
        matches!(
            (self, next),
            (Pending, Approved) | (Pending, Rejected) | (Approved, Processing) | (Processing, Completed)
        )
    }
}

/// Method-specific payout destination
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_name: Option<String>,
}

impl AccountDetails {
    pub fn mobile(phone: impl Into<String>) -> Self {
        Self {
            phone: Some(phone.into()),
            ..Self::default()
        }
    }

    /// Check the details carry what the payout channel needs
    pub fn validate_for(&self, method: PaymentMethod) -> Result<(), String> {
        if method.is_mobile() {
            let phone = self
                .phone
                .as_deref()
                .ok_or_else(|| format!("Phone number is required for {}", method))?;
            if !is_valid_mobile_number(phone) {
                return Err("Phone number must be 11 digits starting with 01".to_string());
            }
        } else if self.account_number.as_deref().map_or(true, |n| n.trim().is_empty()) {
            return Err("Account number is required for bank transfers".to_string());
        }
        Ok(())
    }
}

/// A user's request to move funds out of the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub account_details: AccountDetails,
    pub note: Option<String>,
    pub status: WithdrawalStatus,
    /// External payout reference, set on approval
    pub transaction_id: Option<String>,
    /// Ledger debit that reserved the funds
    pub reservation_transaction_id: Option<Uuid>,
    pub admin_notes: Option<String>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<Uuid>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Withdrawal {
    pub fn new(
        user_id: Uuid,
        amount: Decimal,
        payment_method: PaymentMethod,
        account_details: AccountDetails,
        note: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            amount,
            payment_method,
            account_details,
            note,
            status: WithdrawalStatus::Pending,
            transaction_id: None,
            reservation_transaction_id: None,
            admin_notes: None,
            approved_by: None,
            approved_at: None,
            rejected_by: None,
            rejected_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Debit that reserves the funds at request time
    pub fn reservation_entry(&self) -> LedgerEntry {
        LedgerEntry::new(
            self.user_id,
            self.amount,
            TransactionCategory::Withdrawal,
            format!("withdrawal request {}", self.id),
        )
        .method(self.payment_method.as_str())
        .related(EntityRef::Withdrawal(self.id))
        .meta("withdrawal_id", self.id)
    }

    /// Credit that returns the reserved funds on rejection
    pub fn refund_entry(&self) -> LedgerEntry {
        LedgerEntry::new(
            self.user_id,
            self.amount,
            TransactionCategory::Refund,
            format!("refund for rejected withdrawal {}", self.id),
        )
        .method(self.payment_method.as_str())
        .related(EntityRef::Withdrawal(self.id))
        .meta("withdrawal_id", self.id)
    }
}

/// Admin decision on a pending withdrawal
#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawalDecision {
    pub admin_id: Uuid,
    pub external_transaction_id: Option<String>,
    pub note: Option<String>,
}

/// Outcome of a rejection: the refund went back to the wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalRefund {
    pub withdrawal: Withdrawal,
    pub refunded_amount: Decimal,
    pub new_balance: Decimal,
    pub refund_transaction_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalStats {
    pub pending_count: u64,
    pub pending_amount: Decimal,
    pub total_withdrawn: Decimal,
}
