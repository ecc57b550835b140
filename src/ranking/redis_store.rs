use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands};
use tracing::info;

use super::{RankingError, RankingStore};

/// Leaderboards held in Redis sorted sets.
#[derive(Clone)]
pub struct RedisRankingStore {
    connection: MultiplexedConnection
}

impl RedisRankingStore {
    pub async fn connect(redis_url: &str) -> Result<Self, RankingError> {
        let client = redis::Client::open(redis_url)?;
        let connection = client.get_multiplexed_async_connection().await?;

        info!("Connected to redis at {}", redis_url);
        Ok(RedisRankingStore { connection })
    }
}

#[async_trait]
impl RankingStore for RedisRankingStore {
    async fn upsert_member(&self, key: &str, member: i32, score: f64) -> Result<(), RankingError> {
        let mut connection = self.connection.clone();
        let _: () = connection.zadd(key, member.to_string(), score).await?;

        Ok(())
    }
}
