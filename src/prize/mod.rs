//! Prize calculation: scoring verified results and splitting a prize pool.

pub mod calculator;

pub use calculator::{
    calculate_winners, prize_table, rank_points, score_result, CalculatedWinner, PrizeCalculation,
};
