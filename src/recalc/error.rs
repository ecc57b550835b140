use thiserror::Error;

use super::summary::ItemOutcome;
use crate::{calc::CalcError, database::DbError, ranking::RankingError};

/// Why a single item did not complete.
///
/// Only [`RecalcError::ResourceUnavailable`] is an expected condition
/// (the item is skipped); everything else marks the item as failed. None
/// of these stop a run.
#[derive(Debug, Error)]
pub enum RecalcError {
    #[error("Beatmap {0} is not available")]
    ResourceUnavailable(i32),

    #[error("Performance calculation failed: {0}")]
    Computation(#[from] CalcError),

    #[error("Persistence failed: {0}")]
    Persistence(#[from] DbError),

    #[error("Leaderboard update failed: {0}")]
    Ranking(#[from] RankingError),

    #[error("Unknown {kind} {id}")]
    UnknownEntity { kind: &'static str, id: i64 },

    #[error("Fetch gate closed")]
    GateClosed
}

impl RecalcError {
    pub fn outcome(&self) -> ItemOutcome {
        match self {
            RecalcError::ResourceUnavailable(_) => ItemOutcome::Skipped,
            _ => ItemOutcome::Failed
        }
    }
}
