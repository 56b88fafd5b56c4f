//! In-memory storage used by tests and the `memory` backend.
//!
//! Every trait method takes the single state lock for its whole body, so each
//! unit is atomic and wallet mutations are serialized. Methods validate before
//! touching state; a failed call leaves the state exactly as it found it.

use crate::error::RepositoryError;
use crate::models::{
    max_amount, Deposit, DepositStatus, Event, LedgerEntry, MatchResult, Page, PageRequest,
    PaymentConfirmation, PaymentStatus, PrizeStatus, ResultStatus, Transaction, TransactionKind,
    TransactionStatus, TransferReceipt, VerificationDecision, VerificationRecord, Wallet, Winner,
    Withdrawal, WithdrawalDecision, WithdrawalRefund, WithdrawalStats, WithdrawalStatus,
};
use crate::repositories::{
    DepositRepository, EventRepository, RepoResult, ResultRepository, WalletRepository,
    WithdrawalRepository,
};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    wallets: HashMap<Uuid, Wallet>,
    /// Append order
    transactions: Vec<Transaction>,
    deposits: Vec<Deposit>,
    withdrawals: Vec<Withdrawal>,
    results: Vec<MatchResult>,
    verifications: Vec<VerificationRecord>,
    events: HashMap<Uuid, Event>,
}

impl MemoryState {
    fn apply_credit(&mut self, entry: LedgerEntry) -> RepoResult<(Wallet, Transaction)> {
        let mut wallet = self
            .wallets
            .get(&entry.user_id)
            .cloned()
            .unwrap_or_else(|| Wallet::empty(entry.user_id));
        let now = Utc::now();
        wallet.balance = bounded_add(wallet.balance, entry.amount, "balance")?;
        wallet.total_earned = bounded_add(wallet.total_earned, entry.amount, "total_earned")?;
        wallet.last_activity_at = Some(now);
        wallet.updated_at = now;
        self.wallets.insert(entry.user_id, wallet.clone());

        let tx = entry.into_transaction(
            TransactionKind::Credit,
            TransactionStatus::Completed,
            wallet.balance,
        );
        self.transactions.push(tx.clone());
        Ok((wallet, tx))
    }

    fn apply_debit(&mut self, entry: LedgerEntry) -> RepoResult<(Wallet, Transaction)> {
        let insufficient = RepositoryError::InsufficientBalance {
            required: entry.amount,
        };
        let wallet = self.wallets.get_mut(&entry.user_id).ok_or(insufficient)?;
        if !wallet.can_cover(entry.amount) {
            return Err(RepositoryError::InsufficientBalance {
                required: entry.amount,
            });
        }

        let total_spent = bounded_add(wallet.total_spent, entry.amount, "total_spent")?;
        let now = Utc::now();
        wallet.balance -= entry.amount;
        wallet.total_spent = total_spent;
        wallet.last_activity_at = Some(now);
        wallet.updated_at = now;
        let wallet = wallet.clone();

        let tx = entry.into_transaction(
            TransactionKind::Debit,
            TransactionStatus::Completed,
            wallet.balance,
        );
        self.transactions.push(tx.clone());
        Ok((wallet, tx))
    }

    /// Run a multi-step unit; on error the wallets and the log are restored
    fn atomically<T>(
        &mut self,
        unit: impl FnOnce(&mut Self) -> RepoResult<T>,
    ) -> RepoResult<T> {
        let wallets = self.wallets.clone();
        let logged = self.transactions.len();
        let outcome = unit(self);
        if outcome.is_err() {
            self.wallets = wallets;
            self.transactions.truncate(logged);
        }
        outcome
    }

    fn deposit_mut(&mut self, deposit_id: Uuid) -> RepoResult<&mut Deposit> {
        self.deposits
            .iter_mut()
            .find(|d| d.id == deposit_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("deposit {}", deposit_id)))
    }

    fn pending_deposit(&mut self, deposit_id: Uuid) -> RepoResult<Deposit> {
        let deposit = self.deposit_mut(deposit_id)?;
        if !deposit.is_pending() {
            return Err(RepositoryError::StatusConflict(format!(
                "deposit {} is {}",
                deposit_id,
                deposit.status.as_str()
            )));
        }
        Ok(deposit.clone())
    }

    fn withdrawal_in(
        &self,
        withdrawal_id: Uuid,
        expected: WithdrawalStatus,
    ) -> RepoResult<Withdrawal> {
        let withdrawal = self
            .withdrawals
            .iter()
            .find(|w| w.id == withdrawal_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("withdrawal {}", withdrawal_id)))?;
        if withdrawal.status != expected {
            return Err(RepositoryError::StatusConflict(format!(
                "withdrawal {} is {}",
                withdrawal_id,
                withdrawal.status.as_str()
            )));
        }
        Ok(withdrawal.clone())
    }

    fn store_withdrawal(&mut self, withdrawal: Withdrawal) {
        if let Some(slot) = self.withdrawals.iter_mut().find(|w| w.id == withdrawal.id) {
            *slot = withdrawal;
        }
    }

    fn event_in(&self, event_id: Uuid, expected: PrizeStatus) -> RepoResult<Event> {
        let event = self
            .events
            .get(&event_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("event {}", event_id)))?;
        if event.prize.prize_status != expected {
            return Err(RepositoryError::StatusConflict(format!(
                "prizes for event {} are {}",
                event_id,
                event.prize.prize_status.as_str()
            )));
        }
        Ok(event.clone())
    }
}

/// Add to a money column, refusing anything past what `NUMERIC(20, 2)` holds
fn bounded_add(current: Decimal, amount: Decimal, column: &str) -> RepoResult<Decimal> {
    current
        .checked_add(amount)
        .filter(|total| *total <= max_amount())
        .ok_or_else(|| {
            RepositoryError::OutOfRange(format!("{} would exceed {}", column, max_amount()))
        })
}

/// Newest first, then paged
fn newest_first<T>(mut items: Vec<T>, page: PageRequest) -> Page<T> {
    items.reverse();
    Page::from_ordered(items, page)
}

pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WalletRepository for MemoryStore {
    async fn find_wallet(&self, user_id: Uuid) -> RepoResult<Option<Wallet>> {
        let state = self.state.lock().await;
        Ok(state.wallets.get(&user_id).cloned())
    }

    async fn credit(&self, entry: LedgerEntry) -> RepoResult<(Wallet, Transaction)> {
        let mut state = self.state.lock().await;
        state.apply_credit(entry)
    }

    async fn debit(&self, entry: LedgerEntry) -> RepoResult<(Wallet, Transaction)> {
        let mut state = self.state.lock().await;
        state.apply_debit(entry)
    }

    async fn transfer(
        &self,
        debit: LedgerEntry,
        credit: LedgerEntry,
    ) -> RepoResult<TransferReceipt> {
        let mut state = self.state.lock().await;
        let transfer_id = debit
            .related
            .map(|r| r.entity_id())
            .unwrap_or_else(Uuid::new_v4);

        let ((sender, debit), (recipient, credit)) = state.atomically(|state| {
            let debit = state.apply_debit(debit)?;
            let credit = state.apply_credit(credit)?;
            Ok((debit, credit))
        })?;

        Ok(TransferReceipt {
            transfer_id,
            sender,
            recipient,
            debit,
            credit,
        })
    }

    async fn find_transaction(&self, transaction_id: Uuid) -> RepoResult<Option<Transaction>> {
        let state = self.state.lock().await;
        Ok(state
            .transactions
            .iter()
            .find(|t| t.id == transaction_id)
            .cloned())
    }

    async fn list_transactions(
        &self,
        user_id: Uuid,
        status: Option<TransactionStatus>,
        page: PageRequest,
    ) -> RepoResult<Page<Transaction>> {
        let state = self.state.lock().await;
        let matching = state
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .filter(|t| status.map_or(true, |s| t.status == s))
            .cloned()
            .collect::<Vec<_>>();
        Ok(newest_first(matching, page))
    }
}

#[async_trait]
impl DepositRepository for MemoryStore {
    async fn insert_deposit(&self, deposit: &Deposit) -> RepoResult<Deposit> {
        let mut state = self.state.lock().await;
        if state
            .deposits
            .iter()
            .any(|d| d.external_transaction_id == deposit.external_transaction_id)
        {
            return Err(RepositoryError::Duplicate(format!(
                "external transaction {} already recorded",
                deposit.external_transaction_id
            )));
        }
        state.deposits.push(deposit.clone());
        Ok(deposit.clone())
    }

    async fn find_deposit(&self, deposit_id: Uuid) -> RepoResult<Option<Deposit>> {
        let state = self.state.lock().await;
        Ok(state.deposits.iter().find(|d| d.id == deposit_id).cloned())
    }

    async fn approve_deposit(
        &self,
        deposit_id: Uuid,
        admin_id: Uuid,
        note: Option<String>,
    ) -> RepoResult<(Deposit, Wallet, Transaction)> {
        let mut state = self.state.lock().await;
        let pending = state.pending_deposit(deposit_id)?;
        let (wallet, tx) = state.apply_credit(pending.credit_entry())?;

        let now = Utc::now();
        let deposit = state.deposit_mut(deposit_id)?;
        deposit.status = DepositStatus::Approved;
        deposit.approved_by = Some(admin_id);
        deposit.approved_at = Some(now);
        deposit.admin_note = note;
        deposit.transaction_id = Some(tx.id);
        deposit.updated_at = now;

        Ok((deposit.clone(), wallet, tx))
    }

    async fn reject_deposit(
        &self,
        deposit_id: Uuid,
        admin_id: Uuid,
        note: Option<String>,
    ) -> RepoResult<Deposit> {
        let mut state = self.state.lock().await;
        state.pending_deposit(deposit_id)?;

        let now = Utc::now();
        let deposit = state.deposit_mut(deposit_id)?;
        deposit.status = DepositStatus::Rejected;
        deposit.rejected_by = Some(admin_id);
        deposit.rejected_at = Some(now);
        deposit.admin_note = note;
        deposit.updated_at = now;

        Ok(deposit.clone())
    }

    async fn list_deposits(
        &self,
        user_id: Option<Uuid>,
        status: Option<DepositStatus>,
        page: PageRequest,
    ) -> RepoResult<Page<Deposit>> {
        let state = self.state.lock().await;
        let matching = state
            .deposits
            .iter()
            .filter(|d| user_id.map_or(true, |u| d.user_id == u))
            .filter(|d| status.map_or(true, |s| d.status == s))
            .cloned()
            .collect::<Vec<_>>();
        Ok(newest_first(matching, page))
    }
}

#[async_trait]
impl WithdrawalRepository for MemoryStore {
    async fn create_withdrawal(
        &self,
        withdrawal: &Withdrawal,
    ) -> RepoResult<(Withdrawal, Wallet, Transaction)> {
        let mut state = self.state.lock().await;
        let (wallet, tx) = state.apply_debit(withdrawal.reservation_entry())?;

        let mut stored = withdrawal.clone();
        stored.reservation_transaction_id = Some(tx.id);
        state.withdrawals.push(stored.clone());

        Ok((stored, wallet, tx))
    }

    async fn find_withdrawal(&self, withdrawal_id: Uuid) -> RepoResult<Option<Withdrawal>> {
        let state = self.state.lock().await;
        Ok(state
            .withdrawals
            .iter()
            .find(|w| w.id == withdrawal_id)
            .cloned())
    }

    async fn approve_withdrawal(
        &self,
        withdrawal_id: Uuid,
        decision: WithdrawalDecision,
    ) -> RepoResult<Withdrawal> {
        let mut state = self.state.lock().await;
        let mut withdrawal = state.withdrawal_in(withdrawal_id, WithdrawalStatus::Pending)?;

        let now = Utc::now();
        if let Some(wallet) = state.wallets.get_mut(&withdrawal.user_id) {
            wallet.total_withdrawn =
                bounded_add(wallet.total_withdrawn, withdrawal.amount, "total_withdrawn")?;
            wallet.last_activity_at = Some(now);
            wallet.updated_at = now;
        }
        if let Some(reservation) = withdrawal.reservation_transaction_id {
            if let Some(tx) = state
                .transactions
                .iter_mut()
                .find(|t| t.id == reservation && t.status == TransactionStatus::Pending)
            {
                tx.status = TransactionStatus::Completed;
                tx.updated_at = now;
            }
        }

        withdrawal.status = WithdrawalStatus::Approved;
        withdrawal.transaction_id = decision.external_transaction_id;
        withdrawal.admin_notes = decision.note;
        withdrawal.approved_by = Some(decision.admin_id);
        withdrawal.approved_at = Some(now);
        withdrawal.updated_at = now;
        state.store_withdrawal(withdrawal.clone());

        Ok(withdrawal)
    }

    async fn reject_withdrawal(
        &self,
        withdrawal_id: Uuid,
        decision: WithdrawalDecision,
    ) -> RepoResult<WithdrawalRefund> {
        let mut state = self.state.lock().await;
        let mut withdrawal = state.withdrawal_in(withdrawal_id, WithdrawalStatus::Pending)?;
        let (wallet, refund) = state.apply_credit(withdrawal.refund_entry())?;

        let now = Utc::now();
        withdrawal.status = WithdrawalStatus::Rejected;
        withdrawal.admin_notes = decision.note;
        withdrawal.rejected_by = Some(decision.admin_id);
        withdrawal.rejected_at = Some(now);
        withdrawal.updated_at = now;
        state.store_withdrawal(withdrawal.clone());

        Ok(WithdrawalRefund {
            refunded_amount: withdrawal.amount,
            withdrawal,
            new_balance: wallet.balance,
            refund_transaction_id: refund.id,
        })
    }

    async fn advance_withdrawal(
        &self,
        withdrawal_id: Uuid,
        from: WithdrawalStatus,
        to: WithdrawalStatus,
        external_transaction_id: Option<String>,
    ) -> RepoResult<Withdrawal> {
        let mut state = self.state.lock().await;
        let mut withdrawal = state.withdrawal_in(withdrawal_id, from)?;

        let now = Utc::now();
        withdrawal.status = to;
        if to == WithdrawalStatus::Completed {
            withdrawal.completed_at = Some(now);
        }
        if external_transaction_id.is_some() {
            withdrawal.transaction_id = external_transaction_id;
        }
        withdrawal.updated_at = now;
        state.store_withdrawal(withdrawal.clone());

        Ok(withdrawal)
    }

    async fn list_withdrawals(
        &self,
        user_id: Option<Uuid>,
        status: Option<WithdrawalStatus>,
        page: PageRequest,
    ) -> RepoResult<Page<Withdrawal>> {
        let state = self.state.lock().await;
        let matching = state
            .withdrawals
            .iter()
            .filter(|w| user_id.map_or(true, |u| w.user_id == u))
            .filter(|w| status.map_or(true, |s| w.status == s))
            .cloned()
            .collect::<Vec<_>>();
        Ok(newest_first(matching, page))
    }

    async fn withdrawal_stats(&self, user_id: Uuid) -> RepoResult<WithdrawalStats> {
        let state = self.state.lock().await;
        let pending = state
            .withdrawals
            .iter()
            .filter(|w| w.user_id == user_id && w.status == WithdrawalStatus::Pending);

        let (pending_count, pending_amount) = pending
            .fold((0u64, Decimal::ZERO), |(count, sum), w| (count + 1, sum + w.amount));
        let total_withdrawn = state
            .wallets
            .get(&user_id)
            .map_or(Decimal::ZERO, |w| w.total_withdrawn);

        Ok(WithdrawalStats {
            pending_count,
            pending_amount,
            total_withdrawn,
        })
    }
}

#[async_trait]
impl ResultRepository for MemoryStore {
    async fn insert_result(&self, result: &MatchResult) -> RepoResult<MatchResult> {
        let mut state = self.state.lock().await;
        if state
            .results
            .iter()
            .any(|r| r.event_id == result.event_id && r.player_id == result.player_id)
        {
            return Err(RepositoryError::Duplicate(format!(
                "player {} already submitted a result for event {}",
                result.player_id, result.event_id
            )));
        }
        state.results.push(result.clone());
        Ok(result.clone())
    }

    async fn find_result(&self, result_id: Uuid) -> RepoResult<Option<MatchResult>> {
        let state = self.state.lock().await;
        Ok(state.results.iter().find(|r| r.id == result_id).cloned())
    }

    async fn apply_verification(
        &self,
        result_id: Uuid,
        decision: VerificationDecision,
        admin_id: Uuid,
        notes: Option<String>,
    ) -> RepoResult<(MatchResult, VerificationRecord)> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let result = state
            .results
            .iter_mut()
            .find(|r| r.id == result_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("result {}", result_id)))?;

        let previous_status = result.status;
        result.status = ResultStatus::from(decision);
        result.verified_by = Some(admin_id);
        result.verified_at = Some(now);
        result.admin_notes = notes.clone();
        result.updated_at = now;
        let result = result.clone();

        let record = VerificationRecord {
            id: Uuid::new_v4(),
            result_id,
            event_id: result.event_id,
            previous_status,
            new_status: result.status,
            admin_id,
            notes,
            recorded_at: now,
        };
        state.verifications.push(record.clone());

        Ok((result, record))
    }

    async fn list_results(
        &self,
        event_id: Uuid,
        status: Option<ResultStatus>,
    ) -> RepoResult<Vec<MatchResult>> {
        let state = self.state.lock().await;
        Ok(state
            .results
            .iter()
            .filter(|r| r.event_id == event_id)
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect())
    }

    async fn verification_history(&self, result_id: Uuid) -> RepoResult<Vec<VerificationRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .verifications
            .iter()
            .filter(|v| v.result_id == result_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EventRepository for MemoryStore {
    async fn insert_event(&self, event: &Event) -> RepoResult<Event> {
        let mut state = self.state.lock().await;
        if state.events.contains_key(&event.id) {
            return Err(RepositoryError::Duplicate(format!("event {}", event.id)));
        }
        state.events.insert(event.id, event.clone());
        Ok(event.clone())
    }

    async fn find_event(&self, event_id: Uuid) -> RepoResult<Option<Event>> {
        let state = self.state.lock().await;
        Ok(state.events.get(&event_id).cloned())
    }

    async fn distribute_prizes(
        &self,
        event_id: Uuid,
        winners: Vec<Winner>,
        distributed_by: Uuid,
    ) -> RepoResult<(Event, Vec<Transaction>)> {
        let mut state = self.state.lock().await;
        let mut event = state
            .event_in(event_id, PrizeStatus::Pending)
            .map_err(|err| match err {
                RepositoryError::StatusConflict(_) => RepositoryError::AlreadyDistributed(event_id),
                other => other,
            })?;

        let (stored, credits) = state.atomically(|state| {
            let mut credits = Vec::new();
            let mut stored = Vec::with_capacity(winners.len());
            for mut winner in winners {
                if let Some(entry) = event.prize_entry(&winner) {
                    let (_, tx) = state.apply_credit(entry)?;
                    winner.credit_transaction_id = Some(tx.id);
                    credits.push(tx);
                }
                stored.push(winner);
            }
            Ok((stored, credits))
        })?;

        let now = Utc::now();
        event.prize.winners = stored;
        event.prize.prize_status = PrizeStatus::Distributed;
        event.prize.distribution_date = Some(now);
        event.prize.distributed_by = Some(distributed_by);
        event.updated_at = now;
        state.events.insert(event_id, event.clone());

        Ok((event, credits))
    }

    async fn mark_winner_paid(
        &self,
        event_id: Uuid,
        winner_id: Uuid,
        payment: PaymentConfirmation,
    ) -> RepoResult<Winner> {
        let mut state = self.state.lock().await;
        let mut event = state.event_in(event_id, PrizeStatus::Distributed)?;

        let now = Utc::now();
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
        winner.paid_at = Some(now);
        let winner = winner.clone();

        event.updated_at = now;
        state.events.insert(event_id, event);

        Ok(winner)
    }

    async fn refund_prizes(&self, event_id: Uuid, reason: String) -> RepoResult<Event> {
        let mut state = self.state.lock().await;
        let mut event = state.event_in(event_id, PrizeStatus::Distributed)?;

        let now = Utc::now();
        for winner in event.prize.winners.iter_mut() {
            winner.clear_payment();
        }
        event.prize.prize_status = PrizeStatus::Refunded;
        event.prize.refund_reason = Some(reason);
        event.prize.refunded_at = Some(now);
        event.updated_at = now;
        state.events.insert(event_id, event.clone());

        Ok(event)
    }
}
