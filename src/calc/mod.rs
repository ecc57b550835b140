pub mod rosu;

use std::path::Path;
use thiserror::Error;

use crate::{
    database::db_structs::{HitCounts, MapMetadata, ScoreRecord},
    model::{constants::REFERENCE_ACCURACY, structures::game_mode::GameMode}
};

pub use rosu::RosuCalculator;

#[derive(Debug, Error)]
pub enum CalcError {
    #[error("Failed to parse beatmap {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("Invalid {field} value {value}")]
    InvalidInput { field: &'static str, value: i32 },

    #[error("Performance calculation panicked: {0}")]
    Panicked(String)
}

/// What was achieved on a beatmap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayResult {
    /// A real play, described by its judgements
    Hits { combo: i32, hits: HitCounts },
    /// An idealised play at the given accuracy with no misses and full combo
    Accuracy(f64)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceRequest {
    /// Ruleset to calculate for. Converted to its vanilla ruleset by the calculator.
    pub mode: GameMode,
    pub mods: i32,
    pub play: PlayResult
}

impl PerformanceRequest {
    pub fn from_score(score: &ScoreRecord) -> Self {
        PerformanceRequest {
            mode: score.mode,
            mods: score.mods,
            play: PlayResult::Hits {
                combo: score.max_combo,
                hits: score.hits
            }
        }
    }

    /// Nomod SS on the beatmap's own ruleset
    pub fn reference_max(map: &MapMetadata) -> Self {
        PerformanceRequest {
            mode: map.mode,
            mods: 0,
            play: PlayResult::Accuracy(REFERENCE_ACCURACY)
        }
    }
}

/// Deterministic pp calculation.
///
/// Parsing is separated from calculation so that a parsed beatmap can be
/// shared by every score set on it.
pub trait PerformanceCalculator: Send + Sync + 'static {
    type Beatmap: Send + Sync + 'static;

    fn parse(&self, path: &Path) -> Result<Self::Beatmap, CalcError>;

    fn performance(&self, beatmap: &Self::Beatmap, request: &PerformanceRequest) -> Result<f64, CalcError>;
}

/// NaN and infinite results are stored as 0
pub fn sanitize_pp(pp: f64) -> f64 {
    if pp.is_finite() {
        pp
    } else {
        0.0
    }
}
