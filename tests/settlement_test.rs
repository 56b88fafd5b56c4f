mod helpers;

use arena_ledger::models::*;
use arena_ledger::AppError;
use helpers::*;
use rust_decimal::Decimal;
use uuid::Uuid;

fn payout(amount: i64) -> PaymentConfirmation {
    PaymentConfirmation {
        external_transaction_id: "BK-PRIZE-9".to_string(),
        payment_method: "bkash".to_string(),
        paid_amount: dec(amount),
    }
}

// ---------------------------------------------------------------------------
// Result registry
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_duplicate_result_rejected() {
    let t = TestEngine::new();
    let event = t.create_event(EventType::Solo, 1_000).await;
    let player = Uuid::new_v4();

    t.engine
        .results
        .submit(event.id, player, report(5, 800, 3))
        .await
        .unwrap();
    let err = t
        .engine
        .results
        .submit(event.id, player, report(9, 1_200, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DuplicateSubmission(_)));

    let results = t.engine.results.list_results(event.id, None).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].kills, 5);
    assert_eq!(results[0].status, ResultStatus::Pending);
}

#[tokio::test]
async fn test_result_for_unknown_event_rejected() {
    let t = TestEngine::new();
    let err = t
        .engine
        .results
        .submit(Uuid::new_v4(), Uuid::new_v4(), report(1, 100, 10))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_reverification_keeps_history() {
    let t = TestEngine::new();
    let event = t.create_event(EventType::Solo, 1_000).await;
    let result = t
        .engine
        .results
        .submit(event.id, Uuid::new_v4(), report(4, 600, 5))
        .await
        .unwrap();

    let rejected = t
        .engine
        .results
        .verify(
            event.id,
            result.id,
            VerificationDecision::Rejected,
            t.admin,
            Some("blurry screenshot".into()),
        )
        .await
        .unwrap();
    assert_eq!(rejected.status, ResultStatus::Rejected);

    let verified = t
        .engine
        .results
        .verify(event.id, result.id, VerificationDecision::Verified, t.admin, None)
        .await
        .unwrap();
    assert_eq!(verified.status, ResultStatus::Verified);
    assert_eq!(verified.verified_by, Some(t.admin));

    let history = t
        .engine
        .results
        .verification_history(result.id)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].previous_status, ResultStatus::Pending);
    assert_eq!(history[0].new_status, ResultStatus::Rejected);
    assert_eq!(history[1].previous_status, ResultStatus::Rejected);
    assert_eq!(history[1].new_status, ResultStatus::Verified);

    // The result belongs to a different event
    let other = t.create_event(EventType::Solo, 10).await;
    let err = t
        .engine
        .results
        .verify(other.id, result.id, VerificationDecision::Rejected, t.admin, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_bulk_verify_skips_unknown_results() {
    let t = TestEngine::new();
    let event = t.create_event(EventType::Squad, 2_000).await;

    let mut ids = Vec::new();
    for kills in 1..=3 {
        let result = t
            .engine
            .results
            .submit(event.id, Uuid::new_v4(), report(kills, 100, 10))
            .await
            .unwrap();
        ids.push(result.id);
    }
    ids.insert(1, Uuid::new_v4());

    let updated = t
        .engine
        .results
        .bulk_verify(event.id, &ids, VerificationDecision::Verified, t.admin, None)
        .await
        .unwrap();
    assert_eq!(updated, 3);

    let verified = t
        .engine
        .results
        .list_results(event.id, Some(ResultStatus::Verified))
        .await
        .unwrap();
    assert_eq!(verified.len(), 3);
}

// ---------------------------------------------------------------------------
// Prize calculation and distribution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_solo_event_settles_from_verified_results() {
    let t = TestEngine::new();
    let event = t.create_event(EventType::Solo, 1_000).await;

    let top = Uuid::new_v4();
    let second = Uuid::new_v4();
    let third = Uuid::new_v4();
    let fourth = Uuid::new_v4();
    t.verified_result(event.id, top, 12, 2_000, 1).await;
    t.verified_result(event.id, second, 8, 1_500, 2).await;
    t.verified_result(event.id, third, 5, 900, 4).await;
    t.verified_result(event.id, fourth, 1, 100, 40).await;

    // Unverified results never rank
    t.engine
        .results
        .submit(event.id, Uuid::new_v4(), report(30, 5_000, 1))
        .await
        .unwrap();

    let calculation = t.engine.settlement.calculate_winners(event.id).await.unwrap();
    let prizes: Vec<_> = calculation.winners.iter().map(|w| w.prize_amount).collect();
    assert_eq!(prizes, vec![dec(500), dec(300), dec(200)]);
    assert_eq!(calculation.winners[0].player_id, top);
    assert_eq!(calculation.total_distributed, dec(1_000));

    let settled = t
        .engine
        .settlement
        .settle_from_results(event.id, t.admin)
        .await
        .unwrap();
    assert_eq!(settled.prize.prize_status, PrizeStatus::Distributed);
    assert_eq!(settled.prize.distributed_by, Some(t.admin));
    assert_eq!(settled.prize.winners.len(), 3);

    assert_eq!(t.balance(top).await, dec(500));
    assert_eq!(t.balance(second).await, dec(300));
    assert_eq!(t.balance(third).await, dec(200));
    assert_eq!(t.balance(fourth).await, Decimal::ZERO);

    let prize_credit = &t.transactions(top).await[0];
    assert_eq!(prize_credit.category, TransactionCategory::Prize);
    assert_eq!(prize_credit.related, Some(EntityRef::Event(event.id)));
}

#[tokio::test]
async fn test_calculation_requires_verified_results() {
    let t = TestEngine::new();
    let event = t.create_event(EventType::Duo, 500).await;
    t.engine
        .results
        .submit(event.id, Uuid::new_v4(), report(3, 300, 2))
        .await
        .unwrap();

    let err = t
        .engine
        .settlement
        .calculate_winners(event.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
}

#[tokio::test]
async fn test_prizes_distributed_at_most_once() {
    let t = TestEngine::new();
    let event = t.create_event(EventType::Duo, 1_000).await;
    let player = Uuid::new_v4();
    let winners = vec![manual_winner(1, Some(player), 600)];

    t.engine
        .settlement
        .apply_winners(event.id, winners.clone(), t.admin)
        .await
        .unwrap();
    let err = t
        .engine
        .settlement
        .apply_winners(event.id, winners, t.admin)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyDistributed(id) if id == event.id));

    assert_eq!(t.balance(player).await, dec(600));
    assert_eq!(t.transactions(player).await.len(), 1);
}

#[tokio::test]
async fn test_concurrent_distribution_credits_once() {
    let t = TestEngine::new();
    let event = t.create_event(EventType::Solo, 900).await;
    let player = Uuid::new_v4();

    let attempts = (0..4).map(|_| {
        t.engine.settlement.apply_winners(
            event.id,
            vec![manual_winner(1, Some(player), 450)],
            t.admin,
        )
    });
    let outcomes = futures::future::join_all(attempts).await;

    assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .filter_map(|o| o.as_ref().err())
        .all(|e| matches!(e, AppError::AlreadyDistributed(_))));
    assert_eq!(t.balance(player).await, dec(450));
}

#[tokio::test]
async fn test_prize_pool_cannot_be_exceeded() {
    let t = TestEngine::new();
    let event = t.create_event(EventType::Duo, 1_000).await;
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();

    let err = t
        .engine
        .settlement
        .apply_winners(
            event.id,
            vec![
                manual_winner(1, Some(first), 700),
                manual_winner(2, Some(second), 400),
            ],
            t.admin,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::PrizePoolExceeded { prize_pool, requested }
            if prize_pool == dec(1_000) && requested == dec(1_100)
    ));

    let event = t.engine.settlement.get_event(event.id).await.unwrap();
    assert_eq!(event.prize.prize_status, PrizeStatus::Pending);
    assert!(event.prize.winners.is_empty());
    assert_eq!(t.balance(first).await, Decimal::ZERO);
}

#[tokio::test]
async fn test_amounts_outside_money_range_rejected() {
    let t = TestEngine::new();
    let settlement = &t.engine.settlement;

    let huge_pool = settlement
        .create_event("Mega Cup", EventKind::Tournament, EventType::Solo, Decimal::MAX)
        .await;
    assert!(matches!(huge_pool, Err(AppError::InvalidInput(_))));

    let sub_cent_pool = settlement
        .create_event("Dust Cup", EventKind::Match, EventType::Solo, Decimal::new(1, 3))
        .await;
    assert!(matches!(sub_cent_pool, Err(AppError::InvalidInput(_))));

    let event = t.create_event(EventType::Duo, 1_000).await;
    let player = Uuid::new_v4();
    let mut dust = manual_winner(1, Some(player), 0);
    dust.prize_amount = Decimal::new(1, 3);
    let err = settlement
        .apply_winners(event.id, vec![dust], t.admin)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
    assert_eq!(t.balance(player).await, Decimal::ZERO);

    let event = settlement
        .apply_winners(event.id, vec![manual_winner(1, Some(player), 600)], t.admin)
        .await
        .unwrap();
    let mut confirmation = payout(600);
    confirmation.paid_amount = Decimal::new(600_001, 3);
    let err = settlement
        .mark_paid(event.id, event.prize.winners[0].id, confirmation)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
}

#[tokio::test]
async fn test_winners_without_player_are_not_credited() {
    let t = TestEngine::new();
    let event = t.create_event(EventType::Squad, 1_000).await;
    let player = Uuid::new_v4();

    let event = t
        .engine
        .settlement
        .apply_winners(
            event.id,
            vec![
                manual_winner(1, Some(player), 400),
                manual_winner(2, None, 300),
                manual_winner(3, Some(Uuid::new_v4()), 0),
            ],
            t.admin,
        )
        .await
        .unwrap();

    assert_eq!(event.prize.winners.len(), 3);
    assert_eq!(event.prize.total_prizes(), dec(700));
    assert!(event.prize.winners[0].credit_transaction_id.is_some());
    assert!(event.prize.winners[1].credit_transaction_id.is_none());
    assert_eq!(t.balance(player).await, dec(400));
}

#[tokio::test]
async fn test_mark_paid_and_refund() {
    let t = TestEngine::new();
    let event = t.create_event(EventType::Solo, 1_000).await;
    let player = Uuid::new_v4();

    // Nothing to pay before distribution
    let early = t
        .engine
        .settlement
        .refund(event.id, "cancelled")
        .await
        .unwrap_err();
    assert!(matches!(early, AppError::InvalidStateTransition(_)));

    let event = t
        .engine
        .settlement
        .apply_winners(event.id, vec![manual_winner(1, Some(player), 500)], t.admin)
        .await
        .unwrap();
    let winner_id = event.prize.winners[0].id;

    let winner = t
        .engine
        .settlement
        .mark_paid(event.id, winner_id, payout(500))
        .await
        .unwrap();
    assert_eq!(winner.payment_status, PaymentStatus::Paid);
    assert_eq!(winner.paid_amount, Some(dec(500)));
    assert_eq!(winner.transaction_id.as_deref(), Some("BK-PRIZE-9"));

    let twice = t
        .engine
        .settlement
        .mark_paid(event.id, winner_id, payout(500))
        .await
        .unwrap_err();
    assert!(matches!(twice, AppError::InvalidStateTransition(_)));

    let unknown = t
        .engine
        .settlement
        .mark_paid(event.id, Uuid::new_v4(), payout(500))
        .await
        .unwrap_err();
    assert!(matches!(unknown, AppError::NotFound(_)));

    let refunded = t
        .engine
        .settlement
        .refund(event.id, "match replay ordered")
        .await
        .unwrap();
    assert_eq!(refunded.prize.prize_status, PrizeStatus::Refunded);
    assert_eq!(refunded.prize.refund_reason.as_deref(), Some("match replay ordered"));
    assert!(refunded.prize.refunded_at.is_some());

    // Wallet credits stay put and a refunded event cannot be distributed again
    assert_eq!(t.balance(player).await, dec(500));
    let err = t
        .engine
        .settlement
        .apply_winners(event.id, vec![manual_winner(1, Some(player), 500)], t.admin)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyDistributed(_)));
}
