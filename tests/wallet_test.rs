mod helpers;

use arena_ledger::models::*;
use arena_ledger::AppError;
use futures::future::join_all;
use helpers::*;
use rust_decimal::Decimal;
use uuid::Uuid;

#[tokio::test]
async fn test_credit_creates_wallet_lazily() {
    let t = TestEngine::new();
    let user = Uuid::new_v4();

    let untouched = t.engine.wallets.get_wallet(user).await.unwrap();
    assert_eq!(untouched.balance, Decimal::ZERO);
    assert!(untouched.last_activity_at.is_none());

    let (wallet, tx) = t
        .engine
        .wallets
        .credit(user, dec(250), "bonus", Metadata::new())
        .await
        .unwrap();

    assert_eq!(wallet.balance, dec(250));
    assert_eq!(wallet.total_earned, dec(250));
    assert!(wallet.last_activity_at.is_some());
    assert_eq!(tx.kind, TransactionKind::Credit);
    assert_eq!(tx.status, TransactionStatus::Completed);
    assert_eq!(tx.balance_after, dec(250));
}

#[tokio::test]
async fn test_invalid_amounts_rejected_without_effect() {
    let t = TestEngine::new();
    let user = t.funded_user(100).await;

    let err = t
        .engine
        .wallets
        .credit(user, Decimal::ZERO, "nothing", Metadata::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    let err = t
        .engine
        .wallets
        .debit(user, dec(-5), "negative", Metadata::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    assert_eq!(t.balance(user).await, dec(100));
    assert_eq!(t.transactions(user).await.len(), 1);
}

#[tokio::test]
async fn test_amounts_must_fit_two_decimal_places() {
    let t = TestEngine::new();
    let user = t.funded_user(100).await;

    let err = t
        .engine
        .wallets
        .credit(user, Decimal::new(1, 3), "dust", Metadata::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    let err = t
        .engine
        .wallets
        .transfer(user, Uuid::new_v4(), Decimal::new(10_005, 3), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    let (wallet, _) = t
        .engine
        .wallets
        .credit(user, Decimal::new(1_234, 2), "cents", Metadata::new())
        .await
        .unwrap();
    assert_eq!(wallet.balance, Decimal::new(11_234, 2));
    assert_eq!(t.transactions(user).await.len(), 2);
}

#[tokio::test]
async fn test_balance_cannot_grow_past_column_limit() {
    let t = TestEngine::new();
    let user = Uuid::new_v4();

    let err = t
        .engine
        .wallets
        .credit(user, Decimal::MAX, "overflow", Metadata::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    t.engine
        .wallets
        .credit(user, max_amount(), "jackpot", Metadata::new())
        .await
        .unwrap();

    // A second credit runs in its own task; it must fail cleanly, not panic
    let wallets = t.engine.wallets.clone();
    let outcome = tokio::spawn(async move {
        wallets
            .credit(user, max_amount(), "jackpot", Metadata::new())
            .await
    })
    .await
    .expect("credit task panicked");
    assert!(matches!(outcome, Err(AppError::InvalidInput(_))));

    assert_eq!(t.balance(user).await, max_amount());
    assert_eq!(t.transactions(user).await.len(), 1);
}

#[tokio::test]
async fn test_balance_matches_ledger_after_mixed_operations() {
    let t = TestEngine::new();
    let user = Uuid::new_v4();
    let wallets = &t.engine.wallets;

    wallets.credit(user, dec(500), "a", Metadata::new()).await.unwrap();
    wallets.debit(user, dec(120), "b", Metadata::new()).await.unwrap();
    wallets.credit(user, dec(30), "c", Metadata::new()).await.unwrap();
    let err = wallets
        .debit(user, dec(1000), "too much", Metadata::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientBalance { .. }));
    wallets.debit(user, dec(410), "d", Metadata::new()).await.unwrap();

    let wallet = wallets.get_wallet(user).await.unwrap();
    assert_eq!(wallet.balance, Decimal::ZERO);
    assert_eq!(wallet.total_earned, dec(530));
    assert_eq!(wallet.total_spent, dec(530));

    let transactions = t.transactions(user).await;
    assert_eq!(transactions.len(), 4);
    assert_eq!(ledger_sum(&transactions), wallet.balance);
    assert!(transactions.iter().all(|tx| tx.balance_after >= Decimal::ZERO));
}

#[tokio::test]
async fn test_concurrent_debits_only_one_succeeds() {
    let t = TestEngine::new();
    let user = t.funded_user(100).await;

    let debits = (0..2).map(|_| {
        t.engine
            .wallets
            .debit(user, dec(60), "concurrent", Metadata::new())
    });
    let outcomes = join_all(debits).await;

    let succeeded = outcomes.iter().filter(|o| o.is_ok()).count();
    let insufficient = outcomes
        .iter()
        .filter(|o| matches!(o, Err(AppError::InsufficientBalance { .. })))
        .count();
    assert_eq!(succeeded, 1);
    assert_eq!(insufficient, 1);
    assert_eq!(t.balance(user).await, dec(40));
}

#[tokio::test]
async fn test_concurrent_debits_across_tasks() {
    let t = TestEngine::new();
    let user = t.funded_user(100).await;
    let wallets = t.engine.wallets.clone();

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let wallets = wallets.clone();
            tokio::spawn(async move {
                wallets
                    .debit(user, dec(15), "spawned", Metadata::new())
                    .await
                    .is_ok()
            })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        if handle.await.unwrap() {
            succeeded += 1;
        }
    }

    // 6 x 15 = 90 fits, a 7th would not
    assert_eq!(succeeded, 6);
    assert_eq!(t.balance(user).await, dec(10));
    assert_eq!(ledger_sum(&t.transactions(user).await), dec(10));
}

#[tokio::test]
async fn test_transfer_moves_funds_atomically() {
    let t = TestEngine::new();
    let sender = t.funded_user(300).await;
    let recipient = Uuid::new_v4();

    let receipt = t
        .engine
        .wallets
        .transfer(sender, recipient, dec(120), Some("team fee".into()))
        .await
        .unwrap();

    assert_eq!(receipt.sender.balance, dec(180));
    assert_eq!(receipt.recipient.balance, dec(120));
    assert_eq!(receipt.debit.related, Some(EntityRef::Transfer(receipt.transfer_id)));
    assert_eq!(receipt.credit.related, Some(EntityRef::Transfer(receipt.transfer_id)));
    assert_eq!(receipt.debit.category, TransactionCategory::Transfer);
    assert_eq!(
        receipt.credit.metadata.get("note"),
        Some(&MetaValue::Text("team fee".into()))
    );

    // Failing transfer leaves both sides alone
    let err = t
        .engine
        .wallets
        .transfer(sender, recipient, dec(500), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientBalance { .. }));
    assert_eq!(t.balance(sender).await, dec(180));
    assert_eq!(t.balance(recipient).await, dec(120));
    assert_eq!(t.transactions(recipient).await.len(), 1);
}

#[tokio::test]
async fn test_self_transfer_rejected() {
    let t = TestEngine::new();
    let user = t.funded_user(100).await;

    let err = t
        .engine
        .wallets
        .transfer(user, user, dec(10), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
    assert_eq!(t.transactions(user).await.len(), 1);
}

#[tokio::test]
async fn test_transaction_lookup_and_paging() {
    let t = TestEngine::new();
    let user = Uuid::new_v4();
    let mut ids = Vec::new();
    for amount in 1..=5 {
        let (_, tx) = t
            .engine
            .wallets
            .credit(user, dec(amount), "drip", Metadata::new())
            .await
            .unwrap();
        ids.push(tx.id);
    }

    let found = t.engine.wallets.get_transaction(ids[2]).await.unwrap();
    assert_eq!(found.amount, dec(3));

    let missing = t.engine.wallets.get_transaction(Uuid::new_v4()).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));

    let page = t
        .engine
        .wallets
        .list_transactions(user, PageRequest::new(2, 2), None)
        .await
        .unwrap();
    let amounts: Vec<_> = page.items.iter().map(|tx| tx.amount).collect();
    assert_eq!(amounts, vec![dec(3), dec(2)]);
    assert_eq!(page.total, 5);

    let err = t
        .engine
        .wallets
        .list_transactions(user, PageRequest::new(1, 500), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
}
