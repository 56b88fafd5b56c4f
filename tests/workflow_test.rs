mod helpers;

use arena_ledger::models::*;
use arena_ledger::AppError;
use helpers::*;
use rust_decimal::Decimal;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Deposits
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_deposit_approval_credits_once() {
    let t = TestEngine::new();
    let user = Uuid::new_v4();

    let deposit = t
        .engine
        .deposits
        .submit(user, dec(500), "bkash", "TXN1", Some("receipt.jpg".into()))
        .await
        .unwrap();
    assert_eq!(deposit.status, DepositStatus::Pending);

    // Nothing moves until an admin decides
    assert_eq!(t.balance(user).await, Decimal::ZERO);

    let approved = t
        .engine
        .deposits
        .approve(deposit.id, t.admin, Some("checked".into()))
        .await
        .unwrap();
    assert_eq!(approved.status, DepositStatus::Approved);
    assert_eq!(approved.approved_by, Some(t.admin));
    assert!(approved.approved_at.is_some());

    assert_eq!(t.balance(user).await, dec(500));
    let transactions = t.transactions(user).await;
    assert_eq!(transactions.len(), 1);
    let credit = &transactions[0];
    assert_eq!(credit.kind, TransactionKind::Credit);
    assert_eq!(credit.category, TransactionCategory::Deposit);
    assert_eq!(credit.status, TransactionStatus::Completed);
    assert_eq!(credit.related, Some(EntityRef::Deposit(deposit.id)));
    assert_eq!(approved.transaction_id, Some(credit.id));

    let again = t
        .engine
        .deposits
        .approve(deposit.id, t.admin, None)
        .await
        .unwrap_err();
    assert!(matches!(again, AppError::InvalidStateTransition(_)));

    let late_reject = t
        .engine
        .deposits
        .reject(deposit.id, t.admin, Some("too late".into()))
        .await
        .unwrap_err();
    assert!(matches!(late_reject, AppError::InvalidStateTransition(_)));

    assert_eq!(t.balance(user).await, dec(500));
    assert_eq!(t.transactions(user).await.len(), 1);
}

#[tokio::test]
async fn test_duplicate_external_transaction_rejected() {
    let t = TestEngine::new();
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();

    t.engine
        .deposits
        .submit(first, dec(200), "nagad", "NGD-42", None)
        .await
        .unwrap();

    let err = t
        .engine
        .deposits
        .submit(second, dec(200), "nagad", "NGD-42", None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DuplicateExternalTransaction(ref id) if id == "NGD-42"));

    let queue = t
        .engine
        .deposits
        .list_deposits(Some(DepositStatus::Pending), PageRequest::new(1, 20))
        .await
        .unwrap();
    assert_eq!(queue.total, 1);
}

#[tokio::test]
async fn test_deposit_rejection_has_no_wallet_effect() {
    let t = TestEngine::new();
    let user = Uuid::new_v4();

    let deposit = t
        .engine
        .deposits
        .submit(user, dec(300), "rocket", "RKT-7", None)
        .await
        .unwrap();
    let rejected = t
        .engine
        .deposits
        .reject(deposit.id, t.admin, Some("no such payment".into()))
        .await
        .unwrap();

    assert_eq!(rejected.status, DepositStatus::Rejected);
    assert_eq!(rejected.rejected_by, Some(t.admin));
    assert_eq!(rejected.admin_note.as_deref(), Some("no such payment"));
    assert_eq!(t.balance(user).await, Decimal::ZERO);
    assert!(t.transactions(user).await.is_empty());

    let err = t
        .engine
        .deposits
        .approve(deposit.id, t.admin, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition(_)));
}

#[tokio::test]
async fn test_deposit_validation() {
    let t = TestEngine::new();
    let user = Uuid::new_v4();
    let deposits = &t.engine.deposits;

    let below_minimum = deposits.submit(user, dec(5), "bkash", "T-1", None).await;
    assert!(matches!(below_minimum, Err(AppError::InvalidInput(_))));

    let unknown_method = deposits.submit(user, dec(50), "paypal", "T-2", None).await;
    assert!(matches!(unknown_method, Err(AppError::InvalidInput(_))));

    let blank_reference = deposits.submit(user, dec(50), "bkash", "   ", None).await;
    assert!(matches!(blank_reference, Err(AppError::InvalidInput(_))));

    let sub_cent = deposits
        .submit(user, Decimal::new(10_005, 3), "bkash", "T-3", None)
        .await;
    assert!(matches!(sub_cent, Err(AppError::InvalidInput(_))));

    let missing = deposits.approve(Uuid::new_v4(), t.admin, None).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));

    // Bank transfers are accepted for deposits
    deposits.submit(user, dec(50), "bank", "BANK-1", None).await.unwrap();
    let mine = deposits
        .list_user_deposits(user, PageRequest::new(1, 10))
        .await
        .unwrap();
    assert_eq!(mine.items.len(), 1);
}

// ---------------------------------------------------------------------------
// Withdrawals
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_withdrawal_request_reserves_funds() {
    let t = TestEngine::new();
    let user = t.funded_user(1_000).await;

    let (withdrawal, wallet) = t
        .engine
        .withdrawals
        .request(user, dec(400), "bkash", bkash_account(), Some("rent".into()))
        .await
        .unwrap();

    assert_eq!(withdrawal.status, WithdrawalStatus::Pending);
    assert_eq!(wallet.balance, dec(600));
    assert_eq!(t.balance(user).await, dec(600));

    let reservation = &t.transactions(user).await[0];
    assert_eq!(reservation.kind, TransactionKind::Debit);
    assert_eq!(reservation.category, TransactionCategory::Withdrawal);
    assert_eq!(reservation.related, Some(EntityRef::Withdrawal(withdrawal.id)));
    assert_eq!(withdrawal.reservation_transaction_id, Some(reservation.id));

    let stats = t.engine.withdrawals.stats(user).await.unwrap();
    assert_eq!(stats.pending_count, 1);
    assert_eq!(stats.pending_amount, dec(400));
    assert_eq!(stats.total_withdrawn, Decimal::ZERO);
}

#[tokio::test]
async fn test_withdrawal_rejection_refunds_reservation() {
    let t = TestEngine::new();
    let user = t.funded_user(1_000).await;

    let (withdrawal, _) = t
        .engine
        .withdrawals
        .request(user, dec(250), "nagad", bkash_account(), None)
        .await
        .unwrap();

    let refund = t
        .engine
        .withdrawals
        .reject(withdrawal.id, t.admin, Some("account mismatch".into()))
        .await
        .unwrap();

    assert_eq!(refund.withdrawal.status, WithdrawalStatus::Rejected);
    assert_eq!(refund.refunded_amount, dec(250));
    assert_eq!(refund.new_balance, dec(1_000));
    assert_eq!(t.balance(user).await, dec(1_000));

    // Opening credit, reservation debit and refund credit
    let transactions = t.transactions(user).await;
    assert_eq!(transactions.len(), 3);
    assert_eq!(transactions[0].id, refund.refund_transaction_id);
    assert_eq!(transactions[0].category, TransactionCategory::Refund);
    assert_eq!(ledger_sum(&transactions), dec(1_000));

    let again = t
        .engine
        .withdrawals
        .reject(withdrawal.id, t.admin, None)
        .await
        .unwrap_err();
    assert!(matches!(again, AppError::InvalidStateTransition(_)));
    assert_eq!(t.balance(user).await, dec(1_000));
}

#[tokio::test]
async fn test_withdrawal_approval_through_completion() {
    let t = TestEngine::new();
    let user = t.funded_user(2_000).await;
    let withdrawals = &t.engine.withdrawals;

    let (withdrawal, _) = withdrawals
        .request(user, dec(1_500), "bkash", bkash_account(), None)
        .await
        .unwrap();

    let approved = withdrawals
        .approve(withdrawal.id, t.admin, None, Some("ok".into()))
        .await
        .unwrap();
    assert_eq!(approved.status, WithdrawalStatus::Approved);
    assert_eq!(approved.approved_by, Some(t.admin));

    // Approval never touches the balance again
    assert_eq!(t.balance(user).await, dec(500));
    let wallet = t.engine.wallets.get_wallet(user).await.unwrap();
    assert_eq!(wallet.total_withdrawn, dec(1_500));

    let rejected_late = withdrawals.reject(withdrawal.id, t.admin, None).await;
    assert!(matches!(rejected_late, Err(AppError::InvalidStateTransition(_))));

    let early_complete = withdrawals.complete(withdrawal.id, "BK-PAYOUT-1").await;
    assert!(matches!(early_complete, Err(AppError::InvalidStateTransition(_))));

    let processing = withdrawals.start_processing(withdrawal.id).await.unwrap();
    assert_eq!(processing.status, WithdrawalStatus::Processing);

    let completed = withdrawals
        .complete(withdrawal.id, "BK-PAYOUT-1")
        .await
        .unwrap();
    assert_eq!(completed.status, WithdrawalStatus::Completed);
    assert_eq!(completed.transaction_id.as_deref(), Some("BK-PAYOUT-1"));
    assert!(completed.completed_at.is_some());

    assert_eq!(t.balance(user).await, dec(500));
    assert_eq!(t.transactions(user).await.len(), 2);

    let stats = withdrawals.stats(user).await.unwrap();
    assert_eq!(stats.pending_count, 0);
    assert_eq!(stats.total_withdrawn, dec(1_500));
}

#[tokio::test]
async fn test_withdrawal_validation() {
    let t = TestEngine::new();
    let user = t.funded_user(500).await;
    let withdrawals = &t.engine.withdrawals;

    let below_minimum = withdrawals
        .request(user, dec(50), "bkash", bkash_account(), None)
        .await;
    assert!(matches!(below_minimum, Err(AppError::InvalidInput(_))));

    let above_maximum = withdrawals
        .request(user, dec(30_000), "bkash", bkash_account(), None)
        .await;
    assert!(matches!(above_maximum, Err(AppError::InvalidInput(_))));

    let bank = withdrawals
        .request(user, dec(200), "bank", bkash_account(), None)
        .await;
    assert!(matches!(bank, Err(AppError::InvalidInput(_))));

    let bad_phone = withdrawals
        .request(user, dec(200), "bkash", AccountDetails::mobile("12345"), None)
        .await;
    assert!(matches!(bad_phone, Err(AppError::InvalidInput(_))));

    let sub_cent = withdrawals
        .request(user, Decimal::new(150_001, 3), "bkash", bkash_account(), None)
        .await;
    assert!(matches!(sub_cent, Err(AppError::InvalidInput(_))));

    let overdraw = withdrawals
        .request(user, dec(600), "bkash", bkash_account(), None)
        .await;
    assert!(matches!(overdraw, Err(AppError::InsufficientBalance { .. })));

    // None of the failures left a withdrawal or a ledger entry behind
    assert_eq!(t.balance(user).await, dec(500));
    assert_eq!(t.transactions(user).await.len(), 1);
    let mine = withdrawals
        .list_user_withdrawals(user, PageRequest::new(1, 10))
        .await
        .unwrap();
    assert_eq!(mine.total, 0);
}

#[tokio::test]
async fn test_withdrawal_queue_filters_by_status() {
    let t = TestEngine::new();
    let user = t.funded_user(1_000).await;
    let withdrawals = &t.engine.withdrawals;

    let (first, _) = withdrawals
        .request(user, dec(100), "bkash", bkash_account(), None)
        .await
        .unwrap();
    withdrawals
        .request(user, dec(200), "rocket", bkash_account(), None)
        .await
        .unwrap();
    withdrawals.approve(first.id, t.admin, None, None).await.unwrap();

    let pending = withdrawals
        .list_withdrawals(Some(WithdrawalStatus::Pending), PageRequest::new(1, 10))
        .await
        .unwrap();
    assert_eq!(pending.total, 1);
    assert_eq!(pending.items[0].amount, dec(200));

    let all = withdrawals
        .list_withdrawals(None, PageRequest::new(1, 10))
        .await
        .unwrap();
    assert_eq!(all.total, 2);
}
