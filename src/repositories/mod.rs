//! Storage layer.
//!
//! Each trait method is one atomic unit: either everything it describes is
//! committed or nothing is. Services never compose two mutating calls where
//! the pair has to be atomic; the pair becomes one method here instead.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::{
    PgDepositRepository, PgEventRepository, PgResultRepository, PgWalletRepository,
    PgWithdrawalRepository,
};

use crate::error::RepositoryError;
use crate::models::{
    Deposit, DepositStatus, Event, LedgerEntry, MatchResult, Page, PageRequest,
    PaymentConfirmation, ResultStatus, Transaction, TransactionStatus, TransferReceipt,
    VerificationDecision, VerificationRecord, Wallet, Winner, Withdrawal, WithdrawalDecision,
    WithdrawalRefund, WithdrawalStats, WithdrawalStatus,
};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait WalletRepository: Send + Sync {
    async fn find_wallet(&self, user_id: Uuid) -> RepoResult<Option<Wallet>>;

    /// Create the wallet if missing, add to balance and total_earned, append a
    /// completed credit
    async fn credit(&self, entry: LedgerEntry) -> RepoResult<(Wallet, Transaction)>;

    /// Subtract from balance, add to total_spent, append a completed debit.
    /// Fails with `InsufficientBalance` and leaves nothing behind when the
    /// balance does not cover the amount.
    async fn debit(&self, entry: LedgerEntry) -> RepoResult<(Wallet, Transaction)>;

    /// Debit one wallet and credit another as a single unit
    async fn transfer(
        &self,
        debit: LedgerEntry,
        credit: LedgerEntry,
    ) -> RepoResult<TransferReceipt>;

    async fn find_transaction(&self, transaction_id: Uuid) -> RepoResult<Option<Transaction>>;

    /// Newest first
    async fn list_transactions(
        &self,
        user_id: Uuid,
        status: Option<TransactionStatus>,
        page: PageRequest,
    ) -> RepoResult<Page<Transaction>>;
}

#[async_trait]
pub trait DepositRepository: Send + Sync {
    /// `Duplicate` when the external transaction id is already recorded
    async fn insert_deposit(&self, deposit: &Deposit) -> RepoResult<Deposit>;

    async fn find_deposit(&self, deposit_id: Uuid) -> RepoResult<Option<Deposit>>;

    /// `pending -> approved` plus exactly one wallet credit
    async fn approve_deposit(
        &self,
        deposit_id: Uuid,
        admin_id: Uuid,
        note: Option<String>,
    ) -> RepoResult<(Deposit, Wallet, Transaction)>;

    /// `pending -> rejected`; no wallet effect
    async fn reject_deposit(
        &self,
        deposit_id: Uuid,
        admin_id: Uuid,
        note: Option<String>,
    ) -> RepoResult<Deposit>;

    async fn list_deposits(
        &self,
        user_id: Option<Uuid>,
        status: Option<DepositStatus>,
        page: PageRequest,
    ) -> RepoResult<Page<Deposit>>;
}

#[async_trait]
pub trait WithdrawalRepository: Send + Sync {
    /// Insert the request and debit the reservation as one unit
    async fn create_withdrawal(
        &self,
        withdrawal: &Withdrawal,
    ) -> RepoResult<(Withdrawal, Wallet, Transaction)>;

    async fn find_withdrawal(&self, withdrawal_id: Uuid) -> RepoResult<Option<Withdrawal>>;

    /// `pending -> approved`; bumps total_withdrawn, leaves balance alone
    async fn approve_withdrawal(
        &self,
        withdrawal_id: Uuid,
        decision: WithdrawalDecision,
    ) -> RepoResult<Withdrawal>;

    /// `pending -> rejected` plus a refund credit of the reserved amount
    async fn reject_withdrawal(
        &self,
        withdrawal_id: Uuid,
        decision: WithdrawalDecision,
    ) -> RepoResult<WithdrawalRefund>;

    /// Compare-and-swap `from -> to` for the payout path
    async fn advance_withdrawal(
        &self,
        withdrawal_id: Uuid,
        from: WithdrawalStatus,
        to: WithdrawalStatus,
        external_transaction_id: Option<String>,
    ) -> RepoResult<Withdrawal>;

    async fn list_withdrawals(
        &self,
        user_id: Option<Uuid>,
        status: Option<WithdrawalStatus>,
        page: PageRequest,
    ) -> RepoResult<Page<Withdrawal>>;

    async fn withdrawal_stats(&self, user_id: Uuid) -> RepoResult<WithdrawalStats>;
}

#[async_trait]
pub trait ResultRepository: Send + Sync {
    /// `Duplicate` when the player already submitted for the event
    async fn insert_result(&self, result: &MatchResult) -> RepoResult<MatchResult>;

    async fn find_result(&self, result_id: Uuid) -> RepoResult<Option<MatchResult>>;

    /// Overwrite the decision and append the history record
    async fn apply_verification(
        &self,
        result_id: Uuid,
        decision: VerificationDecision,
        admin_id: Uuid,
        notes: Option<String>,
    ) -> RepoResult<(MatchResult, VerificationRecord)>;

    /// Submission order
    async fn list_results(
        &self,
        event_id: Uuid,
        status: Option<ResultStatus>,
    ) -> RepoResult<Vec<MatchResult>>;

    /// Oldest first
    async fn verification_history(&self, result_id: Uuid) -> RepoResult<Vec<VerificationRecord>>;
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn insert_event(&self, event: &Event) -> RepoResult<Event>;

    async fn find_event(&self, event_id: Uuid) -> RepoResult<Option<Event>>;

    /// Compare-and-swap `pending -> distributed`, store the winners and credit
    /// every creditable winner, all as one unit. `AlreadyDistributed` when the
    /// event has left `pending`.
    async fn distribute_prizes(
        &self,
        event_id: Uuid,
        winners: Vec<Winner>,
        distributed_by: Uuid,
    ) -> RepoResult<(Event, Vec<Transaction>)>;

    async fn mark_winner_paid(
        &self,
        event_id: Uuid,
        winner_id: Uuid,
        payment: PaymentConfirmation,
    ) -> RepoResult<Winner>;

    /// `distributed -> refunded`, clearing every winner's payment tracking
    async fn refund_prizes(&self, event_id: Uuid, reason: String) -> RepoResult<Event>;
}

/// One storage handle, shared by every service
#[derive(Clone)]
pub struct Repositories {
    pub wallets: Arc<dyn WalletRepository>,
    pub deposits: Arc<dyn DepositRepository>,
    pub withdrawals: Arc<dyn WithdrawalRepository>,
    pub results: Arc<dyn ResultRepository>,
    pub events: Arc<dyn EventRepository>,
}

impl Repositories {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            wallets: Arc::new(PgWalletRepository::new(pool.clone())),
            deposits: Arc::new(PgDepositRepository::new(pool.clone())),
            withdrawals: Arc::new(PgWithdrawalRepository::new(pool.clone())),
            results: Arc::new(PgResultRepository::new(pool.clone())),
            events: Arc::new(PgEventRepository::new(pool)),
        }
    }

    /// All five traits backed by one lock, so every unit is serialized
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            wallets: store.clone(),
            deposits: store.clone(),
            withdrawals: store.clone(),
            results: store.clone(),
            events: store,
        }
    }
}
