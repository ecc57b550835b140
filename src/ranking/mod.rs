pub mod redis_store;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::structures::game_mode::GameMode;

pub use redis_store::RedisRankingStore;

#[derive(Debug, Error)]
pub enum RankingError {
    #[error("Redis command failed: {0}")]
    Redis(#[from] redis::RedisError)
}

/// Sorted leaderboards keyed by mode and optionally country.
#[async_trait]
pub trait RankingStore: Send + Sync {
    /// Inserts `member` into the set at `key` or moves it to `score`
    async fn upsert_member(&self, key: &str, member: i32, score: f64) -> Result<(), RankingError>;
}

/// `bancho:leaderboard:{mode}` or `bancho:leaderboard:{mode}:{country}`
pub fn leaderboard_key(mode: GameMode, country: Option<&str>) -> String {
    match country {
        Some(country) => format!("bancho:leaderboard:{}:{}", mode.as_i32(), country),
        None => format!("bancho:leaderboard:{}", mode.as_i32())
    }
}
