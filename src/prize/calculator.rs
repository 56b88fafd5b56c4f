use crate::models::{EventType, MatchResult, NewWinner};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Points per kill
const KILL_POINTS: i64 = 10;
/// Points per placement step above the last rank
const PLACEMENT_POINTS: i64 = 5;

const SOLO_SPLIT: &[(u32, u32)] = &[(1, 50), (2, 30), (3, 20)];
const DUO_SPLIT: &[(u32, u32)] = &[(1, 60), (2, 40)];
const SQUAD_SPLIT: &[(u32, u32)] = &[(1, 40), (2, 30), (3, 20), (4, 10)];

/// Ranked winner derived from verified results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculatedWinner {
    pub rank: u32,
    pub player_id: Uuid,
    pub player_name: String,
    pub team_name: Option<String>,
    pub kills: u32,
    pub damage: u32,
    pub total_score: Decimal,
    pub prize_amount: Decimal,
}

impl From<CalculatedWinner> for NewWinner {
    fn from(winner: CalculatedWinner) -> Self {
        NewWinner {
            rank: winner.rank,
            player_id: Some(winner.player_id),
            player_name: winner.player_name,
            team_name: winner.team_name,
            kills: winner.kills,
            damage: winner.damage,
            total_score: winner.total_score,
            prize_amount: winner.prize_amount,
        }
    }
}

/// Calculated winners for one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrizeCalculation {
    pub event_id: Uuid,
    pub winners: Vec<CalculatedWinner>,
    pub total_distributed: Decimal,
}

/// Lowest rank that still earns placement points
fn max_rank(event_type: &EventType) -> i64 {
    match event_type {
        EventType::Solo => 100,
        _ => 25,
    }
}

/// Percentage of the pool paid per rank
///
/// Unknown formats pay out like solo.
pub fn prize_table(event_type: &EventType) -> &'static [(u32, u32)] {
    match event_type {
        EventType::Duo => DUO_SPLIT,
        EventType::Squad => SQUAD_SPLIT,
        EventType::Solo | EventType::Other(_) => SOLO_SPLIT,
    }
}

/// Placement bonus: `max(0, (max_rank - rank) * 5)`
pub fn rank_points(self_reported_rank: u32, event_type: &EventType) -> i64 {
    ((max_rank(event_type) - i64::from(self_reported_rank)) * PLACEMENT_POINTS).max(0)
}

/// Score = kills * 10 + damage * 0.1 + rank points
pub fn score_result(result: &MatchResult, event_type: &EventType) -> Decimal {
    let kills = Decimal::from(i64::from(result.kills) * KILL_POINTS);
    let damage = Decimal::from(result.damage) * Decimal::new(1, 1);
    let placement = Decimal::from(rank_points(result.self_reported_rank, event_type));
    kills + damage + placement
}

/// `percentage` of the pool, rounded half away from zero to whole units.
///
/// A pool too large for the exact product is divided first; the quotient never
/// exceeds the pool, so the share always fits.
fn prize_share(prize_pool: Decimal, percentage: u32) -> Decimal {
    let percentage = Decimal::from(percentage);
    prize_pool
        .checked_mul(percentage)
        .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED))
        .unwrap_or_else(|| prize_pool / Decimal::ONE_HUNDRED * percentage)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Rank verified results and split the prize pool.
///
/// Results that are not verified are ignored. Ordering is by score
/// descending; equal scores are ordered by player id so the ranking does not
/// depend on how the results were fetched. Only ranks present in the prize
/// table are returned, and only as many as there are players.
pub fn calculate_winners(
    results: &[MatchResult],
    prize_pool: Decimal,
    event_type: &EventType,
) -> Vec<CalculatedWinner> {
    let mut scored: Vec<(&MatchResult, Decimal)> = results
        .iter()
        .filter(|r| r.is_verified())
        .map(|r| (r, score_result(r, event_type)))
        .collect();

    if scored.is_empty() {
        return Vec::new();
    }

    scored.sort_by(|(a, a_score), (b, b_score)| {
        b_score
            .cmp(a_score)
            .then_with(|| a.player_id.cmp(&b.player_id))
    });

    let table = prize_table(event_type);

    scored
        .into_iter()
        .zip(1u32..)
        .filter_map(|((result, total_score), rank)| {
            let percentage = table.iter().find(|(r, _)| *r == rank).map(|(_, p)| *p)?;
            let prize_amount = prize_share(prize_pool, percentage);

            Some(CalculatedWinner {
                rank,
                player_id: result.player_id,
                player_name: result.player_name.clone(),
                team_name: result.team_name.clone(),
                kills: result.kills,
                damage: result.damage,
                total_score,
                prize_amount,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PerformanceReport, ResultStatus};

    fn verified(player_id: Uuid, kills: u32, damage: u32, rank: u32) -> MatchResult {
        let mut result = MatchResult::new(
            Uuid::nil(),
            player_id,
            PerformanceReport {
                player_name: format!("player-{}", kills),
                team_name: None,
                kills,
                damage,
                self_reported_rank: rank,
                screenshot_reference: None,
            },
        );
        result.status = ResultStatus::Verified;
        result
    }

    #[test]
    fn test_score_formula() {
        let result = verified(Uuid::new_v4(), 10, 500, 1);
        // 100 + 50 + (100 - 1) * 5
        assert_eq!(score_result(&result, &EventType::Solo), Decimal::new(645, 0));
        // 100 + 50 + (25 - 1) * 5
        assert_eq!(score_result(&result, &EventType::Squad), Decimal::new(270, 0));
    }

    #[test]
    fn test_rank_points_floor_at_zero() {
        assert_eq!(rank_points(30, &EventType::Duo), 0);
        assert_eq!(rank_points(25, &EventType::Duo), 0);
        assert_eq!(rank_points(24, &EventType::Duo), 5);
        assert_eq!(rank_points(100, &EventType::Solo), 0);
    }

    #[test]
    fn test_damage_contributes_fractionally() {
        let result = verified(Uuid::new_v4(), 0, 55, 200);
        assert_eq!(score_result(&result, &EventType::Solo), Decimal::new(55, 1));
    }

    #[test]
    fn test_better_performance_ranks_first() {
        let strong = verified(Uuid::new_v4(), 10, 500, 1);
        let weak = verified(Uuid::new_v4(), 2, 50, 5);
        assert!(score_result(&strong, &EventType::Solo) > score_result(&weak, &EventType::Solo));

        let winners = calculate_winners(&[weak.clone(), strong.clone()], Decimal::new(1000, 0), &EventType::Solo);
        assert_eq!(winners[0].player_id, strong.player_id);
        assert_eq!(winners[0].rank, 1);
        assert_eq!(winners[1].player_id, weak.player_id);
    }

    #[test]
    fn test_solo_split_of_thousand() {
        let results: Vec<_> = (0..5u32)
            .map(|i| verified(Uuid::new_v4(), 10 - i, 100, i + 1))
            .collect();

        let winners = calculate_winners(&results, Decimal::new(1000, 0), &EventType::Solo);
        let prizes: Vec<Decimal> = winners.iter().map(|w| w.prize_amount).collect();
        assert_eq!(prizes, vec![Decimal::new(500, 0), Decimal::new(300, 0), Decimal::new(200, 0)]);
        assert!(winners.iter().all(|w| w.rank <= 3));
    }

    #[test]
    fn test_duo_and_squad_splits() {
        let results: Vec<_> = (0..4u32)
            .map(|i| verified(Uuid::new_v4(), 10 - i, 0, 1))
            .collect();

        let duo = calculate_winners(&results, Decimal::new(1000, 0), &EventType::Duo);
        assert_eq!(duo.len(), 2);
        assert_eq!(duo[0].prize_amount, Decimal::new(600, 0));
        assert_eq!(duo[1].prize_amount, Decimal::new(400, 0));

        let squad = calculate_winners(&results, Decimal::new(1000, 0), &EventType::Squad);
        let prizes: Vec<Decimal> = squad.iter().map(|w| w.prize_amount).collect();
        assert_eq!(
            prizes,
            vec![Decimal::new(400, 0), Decimal::new(300, 0), Decimal::new(200, 0), Decimal::new(100, 0)]
        );
    }

    #[test]
    fn test_unknown_type_uses_solo_table() {
        let results = vec![verified(Uuid::new_v4(), 3, 0, 1)];
        let winners = calculate_winners(&results, Decimal::new(90, 0), &EventType::Other("clash".into()));
        assert_eq!(winners.len(), 1);
        assert_eq!(winners[0].prize_amount, Decimal::new(45, 0));
    }

    #[test]
    fn test_fewer_players_than_prize_ranks() {
        let results = vec![verified(Uuid::new_v4(), 1, 0, 1), verified(Uuid::new_v4(), 0, 0, 2)];
        let winners = calculate_winners(&results, Decimal::new(1000, 0), &EventType::Squad);
        assert_eq!(winners.len(), 2);
        assert_eq!(winners[1].rank, 2);
    }

    #[test]
    fn test_prizes_round_half_up() {
        let results = vec![verified(Uuid::new_v4(), 1, 0, 1)];
        // 50% of 5 = 2.5
        let winners = calculate_winners(&results, Decimal::new(5, 0), &EventType::Solo);
        assert_eq!(winners[0].prize_amount, Decimal::new(3, 0));
    }

    #[test]
    fn test_ties_break_by_player_id() {
        let low = Uuid::from_u128(1);
        let high = Uuid::from_u128(2);
        let results = vec![verified(high, 5, 100, 3), verified(low, 5, 100, 3)];

        let winners = calculate_winners(&results, Decimal::new(100, 0), &EventType::Solo);
        assert_eq!(winners[0].player_id, low);
        assert_eq!(winners[1].player_id, high);
    }

    #[test]
    fn test_unverified_and_empty_inputs() {
        assert!(calculate_winners(&[], Decimal::new(100, 0), &EventType::Solo).is_empty());

        let mut pending = verified(Uuid::new_v4(), 9, 900, 1);
        pending.status = ResultStatus::Pending;
        assert!(calculate_winners(&[pending], Decimal::new(100, 0), &EventType::Solo).is_empty());
    }

    #[test]
    fn test_huge_pool_does_not_overflow() {
        let results: Vec<_> = (0..3u32)
            .map(|i| verified(Uuid::new_v4(), 10 - i, 0, 1))
            .collect();

        let winners = calculate_winners(&results, Decimal::MAX, &EventType::Solo);
        assert_eq!(winners.len(), 3);
        assert!(winners.iter().all(|w| w.prize_amount > Decimal::ZERO));
        assert!(winners[0].prize_amount > winners[1].prize_amount);
        assert!(winners[1].prize_amount > winners[2].prize_amount);
    }
}
