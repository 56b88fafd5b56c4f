//! Wallet and transaction models for fund tracking

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Per-user balance projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Wallet {
    pub user_id: Uuid,
    pub balance: Decimal,
    pub total_earned: Decimal,
    pub total_spent: Decimal,
    pub total_withdrawn: Decimal,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Decimal places a stored amount may carry
pub const AMOUNT_SCALE: u32 = 2;

/// Largest value a `NUMERIC(20, 2)` money column holds
pub fn max_amount() -> Decimal {
    Decimal::from_i128_with_scale(99_999_999_999_999_999_999, AMOUNT_SCALE)
}

/// Check that `amount` fits the money columns: at most two decimal places and
/// no larger than [`max_amount`]. Sign checks are left to the caller.
pub fn check_amount(amount: Decimal) -> Result<(), String> {
    if amount.normalize().scale() > AMOUNT_SCALE {
        return Err(format!(
            "Amount {} has more than {} decimal places",
            amount, AMOUNT_SCALE
        ));
    }
    if amount > max_amount() {
        return Err(format!("Amount exceeds the maximum of {}", max_amount()));
    }
    Ok(())
}

impl Wallet {
    /// A zeroed wallet, used for lazy creation and for reads of unused users
    pub fn empty(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            balance: Decimal::ZERO,
            total_earned: Decimal::ZERO,
            total_spent: Decimal::ZERO,
            total_withdrawn: Decimal::ZERO,
            last_activity_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn can_cover(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }
}

/// Direction of a balance movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Credit,
    Debit,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credit => "credit",
            Self::Debit => "debit",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "credit" => Ok(Self::Credit),
            "debit" => Ok(Self::Debit),
            _ => Err(format!("Invalid transaction kind: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid transaction status: {}", s)),
        }
    }
}

/// Business reason behind a balance movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionCategory {
    Deposit,
    Withdrawal,
    Refund,
    Prize,
    Transfer,
    Adjustment,
}

impl TransactionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::Refund => "refund",
            Self::Prize => "prize",
            Self::Transfer => "transfer",
            Self::Adjustment => "adjustment",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "deposit" => Ok(Self::Deposit),
            "withdrawal" => Ok(Self::Withdrawal),
            "refund" => Ok(Self::Refund),
            "prize" => Ok(Self::Prize),
            "transfer" => Ok(Self::Transfer),
            "adjustment" => Ok(Self::Adjustment),
            _ => Err(format!("Invalid transaction category: {}", s)),
        }
    }
}

/// Pointer from a transaction to the entity that caused it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum EntityRef {
    Withdrawal(Uuid),
    Deposit(Uuid),
    Event(Uuid),
    Transfer(Uuid),
}

impl EntityRef {
    pub fn entity_type(&self) -> &'static str {
        match self {
            Self::Withdrawal(_) => "withdrawal",
            Self::Deposit(_) => "deposit",
            Self::Event(_) => "event",
            Self::Transfer(_) => "transfer",
        }
    }

    pub fn entity_id(&self) -> Uuid {
        match self {
            Self::Withdrawal(id) | Self::Deposit(id) | Self::Event(id) | Self::Transfer(id) => *id,
        }
    }

    /// Rebuild from the two stored columns
    pub fn from_parts(entity_type: &str, id: Uuid) -> Result<Self, String> {
        match entity_type {
            "withdrawal" => Ok(Self::Withdrawal(id)),
            "deposit" => Ok(Self::Deposit(id)),
            "event" => Ok(Self::Event(id)),
            "transfer" => Ok(Self::Transfer(id)),
            _ => Err(format!("Invalid entity type: {}", entity_type)),
        }
    }
}

/// Primitive value stored in transaction metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        MetaValue::Text(value.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        MetaValue::Text(value)
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        MetaValue::Int(value)
    }
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        MetaValue::Bool(value)
    }
}

impl From<Uuid> for MetaValue {
    fn from(value: Uuid) -> Self {
        MetaValue::Text(value.to_string())
    }
}

impl From<Decimal> for MetaValue {
    fn from(value: Decimal) -> Self {
        MetaValue::Text(value.to_string())
    }
}

/// Ordered string-keyed metadata; ordering keeps serialization deterministic
pub type Metadata = BTreeMap<String, MetaValue>;

/// Immutable record of one balance-affecting event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: TransactionKind,
    pub category: TransactionCategory,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub description: String,
    pub status: TransactionStatus,
    pub method: String,
    pub related: Option<EntityRef>,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn is_completed(&self) -> bool {
        self.status == TransactionStatus::Completed
    }

    /// Signed effect on the balance: positive for credits, negative for debits
    pub fn signed_amount(&self) -> Decimal {
        match self.kind {
            TransactionKind::Credit => self.amount,
            TransactionKind::Debit => -self.amount,
        }
    }
}

/// Request to move funds into or out of one wallet
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub user_id: Uuid,
    pub amount: Decimal,
    pub category: TransactionCategory,
    pub description: String,
    pub method: String,
    pub related: Option<EntityRef>,
    pub metadata: Metadata,
}

impl LedgerEntry {
    pub fn new(
        user_id: Uuid,
        amount: Decimal,
        category: TransactionCategory,
        description: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            amount,
            category,
            description: description.into(),
            method: "wallet".to_string(),
            related: None,
            metadata: Metadata::new(),
        }
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn related(mut self, related: EntityRef) -> Self {
        self.related = Some(related);
        self
    }

    pub fn meta(mut self, key: &str, value: impl Into<MetaValue>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata.extend(metadata);
        self
    }

    /// Validate the entry before any mutation
    pub fn validate(&self) -> Result<(), String> {
        if self.amount <= Decimal::ZERO {
            return Err("Amount must be greater than zero".to_string());
        }
        check_amount(self.amount)
    }

    /// Materialize the completed transaction this entry produces
    pub fn into_transaction(
        self,
        kind: TransactionKind,
        status: TransactionStatus,
        balance_after: Decimal,
    ) -> Transaction {
        let now = Utc::now();
        Transaction {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            kind,
            category: self.category,
            amount: self.amount,
            balance_after,
            description: self.description,
            status,
            method: self.method,
            related: self.related,
            metadata: self.metadata,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Both legs of a wallet-to-wallet transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub transfer_id: Uuid,
    pub sender: Wallet,
    pub recipient: Wallet,
    pub debit: Transaction,
    pub credit: Transaction,
}
