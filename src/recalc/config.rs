use std::time::Duration;
use strum::IntoEnumIterator;

use crate::model::structures::game_mode::GameMode;

/// Every pp100 item needs its own availability check against the mirror
pub const MAPS_PP_CHUNK_SIZE: usize = 1;

/// Tunables of a run
#[derive(Debug, Clone, PartialEq)]
pub struct RecalcConfig {
    /// Outbound beatmap fetches allowed per `rate_window`
    pub rate_limit: usize,
    pub rate_window: Duration,
    /// Items fetching / parsing / calculating at once
    pub fetch_concurrency: usize,
    pub score_chunk_size: usize,
    pub stats_chunk_size: usize
}

impl Default for RecalcConfig {
    fn default() -> Self {
        RecalcConfig {
            rate_limit: 20,
            rate_window: Duration::from_secs(60),
            fetch_concurrency: 10,
            score_chunk_size: 100,
            stats_chunk_size: 100
        }
    }
}

/// Which phases to run, and for which modes.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    pub scores: bool,
    pub stats: bool,
    pub maps_pp: bool,
    pub modes: Vec<GameMode>
}

impl Default for RunPlan {
    fn default() -> Self {
        RunPlan {
            scores: true,
            stats: true,
            maps_pp: false,
            modes: GameMode::iter().collect()
        }
    }
}
