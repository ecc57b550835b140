use itertools::Itertools;

use crate::model::constants::{ACC_BONUS_DIVISOR, BONUS_PP_BASE, BONUS_PP_CEILING, PP_DECAY_BASE};

/// One of a player's qualifying scores as seen by the aggregate calculation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedScore {
    pub id: i64,
    pub pp: f64,
    pub acc: f64
}

/// A player's rolled-up performance for one mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateStats {
    pub pp: i32,
    pub acc: f64,
    /// Number of scores that contributed
    pub score_count: usize
}

/// # Aggregate calculation
///
/// Scores are ranked by pp (descending) and the score at rank `i`
/// (zero-indexed) is weighted by `0.95^i`. Equal pp values are ordered
/// by score id so the result never depends on the order rows were read in.
///
/// - pp: `round(Σ pp_i · 0.95^i + 416.6667 · (1 − 0.9994^n))`
/// - acc: `(Σ acc_i · 0.95^i) · (100 / (20 · (1 − 0.95^n))) / 100`
///
/// Returns `None` when the player has no qualifying scores; callers must
/// leave their stored aggregate untouched in that case.
pub fn calculate_aggregate(scores: &[WeightedScore]) -> Option<AggregateStats> {
    if scores.is_empty() {
        return None;
    }

    let ranked = scores
        .iter()
        .sorted_by(|a, b| b.pp.total_cmp(&a.pp).then_with(|| a.id.cmp(&b.id)))
        .collect_vec();

    let n = ranked.len() as i32;

    let weighted_pp: f64 = ranked
        .iter()
        .enumerate()
        .map(|(i, s)| s.pp * decay_weight(i))
        .sum();
    let weighted_acc: f64 = ranked
        .iter()
        .enumerate()
        .map(|(i, s)| s.acc * decay_weight(i))
        .sum();

    Some(AggregateStats {
        pp: (weighted_pp + bonus_pp(n)).round() as i32,
        acc: (weighted_acc * bonus_acc_factor(n)) / 100.0,
        score_count: ranked.len()
    })
}

fn decay_weight(rank: usize) -> f64 {
    PP_DECAY_BASE.powi(rank as i32)
}

/// Flat bonus for the number of qualifying scores, capped at ~416.67pp
pub fn bonus_pp(n: i32) -> f64 {
    BONUS_PP_CEILING * (1.0 - BONUS_PP_BASE.powi(n))
}

/// Normalises weighted accuracy back to a percentage. Undefined for `n = 0`.
pub fn bonus_acc_factor(n: i32) -> f64 {
    100.0 / (ACC_BONUS_DIVISOR * (1.0 - PP_DECAY_BASE.powi(n)))
}
