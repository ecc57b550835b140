pub mod db;
pub mod db_structs;

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    database::db_structs::{MapMetadata, PlayerStanding, ScoreRecord},
    model::{
        stats::{AggregateStats, WeightedScore},
        structures::game_mode::GameMode
    }
};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database query failed: {0}")]
    Query(#[from] tokio_postgres::Error),

    #[error("Unexpected value {value} in column {column}")]
    InvalidValue { column: &'static str, value: i32 },

    #[error("Write rejected: {0}")]
    Rejected(String)
}

/// Read/write access to scores, stats and beatmap rows.
///
/// Every method is a single statement; writes touch exactly one column
/// set of one row so a run can be interrupted at any point.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Beatmaps whose nomod SS pp has not been computed yet
    async fn list_maps_missing_pp100(&self) -> Result<Vec<MapMetadata>, DbError>;

    /// Players that have a stats row for `mode`
    async fn list_player_ids(&self, mode: GameMode) -> Result<Vec<i32>, DbError>;

    /// Every best score of `mode`, ordered by stored pp (descending) then id
    async fn list_recalc_scores(&self, mode: GameMode) -> Result<Vec<ScoreRecord>, DbError>;

    /// A player's best scores on ranked or approved beatmaps, ordered by pp
    /// (descending) then score id
    async fn list_qualifying_scores(&self, player_id: i32, mode: GameMode) -> Result<Vec<WeightedScore>, DbError>;

    async fn update_score_pp(&self, score_id: i64, pp: f64) -> Result<(), DbError>;

    async fn update_stats(&self, player_id: i32, mode: GameMode, stats: &AggregateStats) -> Result<(), DbError>;

    async fn update_map_pp100(&self, map_id: i32, pp100: f64) -> Result<(), DbError>;

    async fn get_player_standing(&self, player_id: i32) -> Result<Option<PlayerStanding>, DbError>;
}
