use super::{
    db_structs::{HitCounts, MapMetadata, PlayerStanding, ScoreRecord},
    DbError, PersistenceGateway
};
use crate::model::{
    stats::{AggregateStats, WeightedScore},
    structures::{
        game_mode::GameMode,
        privileges::Privileges,
        ranked_status::{RankedStatus, ScoreStatus}
    }
};
use async_trait::async_trait;
use itertools::Itertools;
use postgres_types::ToSql;
use std::sync::Arc;
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, error, info};

#[derive(Clone)]
pub struct DbClient {
    client: Arc<Client>
}

impl DbClient {
    // Connect to the database and return a DbClient instance
    pub async fn connect(connection_str: &str) -> Result<Self, tokio_postgres::Error> {
        let (client, connection) = tokio_postgres::connect(connection_str, NoTls).await?;

        // Spawn the connection object to run in the background
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("connection error: {}", e);
            }
        });

        Ok(DbClient {
            client: Arc::new(client)
        })
    }

    fn accepted_statuses() -> Vec<i32> {
        RankedStatus::ACCEPTED.iter().map(|s| *s as i32).collect_vec()
    }

    fn score_from_row(row: &Row) -> Result<ScoreRecord, DbError> {
        Ok(ScoreRecord {
            id: row.try_get("id")?,
            player_id: row.try_get("userid")?,
            map_id: row.try_get("map_id")?,
            map_md5: row.try_get("map_md5")?,
            mode: Self::mode_from_row(row, "mode")?,
            mods: row.try_get("mods")?,
            max_combo: row.try_get("max_combo")?,
            hits: HitCounts {
                n_geki: row.try_get("ngeki")?,
                n300: row.try_get("n300")?,
                n_katu: row.try_get("nkatu")?,
                n100: row.try_get("n100")?,
                n50: row.try_get("n50")?,
                n_miss: row.try_get("nmiss")?
            },
            pp: row.try_get("pp")?,
            acc: row.try_get("acc")?
        })
    }

    fn map_from_row(row: &Row) -> Result<MapMetadata, DbError> {
        Ok(MapMetadata {
            id: row.try_get("id")?,
            md5: row.try_get("md5")?,
            mode: Self::mode_from_row(row, "mode")?,
            pp100: row.try_get("pp100")?
        })
    }

    fn mode_from_row(row: &Row, column: &'static str) -> Result<GameMode, DbError> {
        let value = row.try_get::<_, i32>(column)?;
        GameMode::try_from(value).map_err(|_| DbError::InvalidValue { column, value })
    }

    async fn execute(&self, query: &str, values: &[&(dyn ToSql + Sync)]) -> Result<u64, DbError> {
        Ok(self.client.execute(query, values).await?)
    }
}

#[async_trait]
impl PersistenceGateway for DbClient {
    async fn list_maps_missing_pp100(&self) -> Result<Vec<MapMetadata>, DbError> {
        info!("Fetching maps without pp100...");
        let rows = self
            .client
            .query("SELECT id, md5, mode, pp100 FROM maps WHERE pp100 IS NULL ORDER BY id", &[])
            .await?;

        rows.iter().map(Self::map_from_row).collect()
    }

    async fn list_player_ids(&self, mode: GameMode) -> Result<Vec<i32>, DbError> {
        let rows = self
            .client
            .query("SELECT id FROM stats WHERE mode = $1 ORDER BY id", &[&mode.as_i32()])
            .await?;

        Ok(rows
            .iter()
            .map(|row| row.try_get::<_, i32>("id"))
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn list_recalc_scores(&self, mode: GameMode) -> Result<Vec<ScoreRecord>, DbError> {
        info!("Fetching {} scores...", mode);
        let rows = self
            .client
            .query(
                "SELECT s.id, s.userid, s.mode, s.mods, s.map_md5, s.pp, s.acc, s.max_combo, \
                s.ngeki, s.n300, s.nkatu, s.n100, s.n50, s.nmiss, m.id AS map_id \
                FROM scores s \
                INNER JOIN maps m ON s.map_md5 = m.md5 \
                WHERE s.status = $1 AND s.mode = $2 \
                ORDER BY s.pp DESC, s.id",
                &[&(ScoreStatus::Best as i32), &mode.as_i32()]
            )
            .await?;

        let scores = rows
            .iter()
            .map(Self::score_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        info!("Fetched {} {} scores", scores.len(), mode);

        Ok(scores)
    }

    async fn list_qualifying_scores(&self, player_id: i32, mode: GameMode) -> Result<Vec<WeightedScore>, DbError> {
        let rows = self
            .client
            .query(
                "SELECT s.id, s.pp, s.acc FROM scores s \
                INNER JOIN maps m ON s.map_md5 = m.md5 \
                WHERE s.userid = $1 AND s.mode = $2 \
                AND s.status = $3 AND m.status = ANY($4) \
                ORDER BY s.pp DESC, s.id",
                &[
                    &player_id,
                    &mode.as_i32(),
                    &(ScoreStatus::Best as i32),
                    &Self::accepted_statuses()
                ]
            )
            .await?;

        rows.iter()
            .map(|row| -> Result<WeightedScore, DbError> {
                Ok(WeightedScore {
                    id: row.try_get("id")?,
                    pp: row.try_get("pp")?,
                    acc: row.try_get("acc")?
                })
            })
            .collect()
    }

    async fn update_score_pp(&self, score_id: i64, pp: f64) -> Result<(), DbError> {
        self.execute("UPDATE scores SET pp = $1 WHERE id = $2", &[&pp, &score_id])
            .await?;

        Ok(())
    }

    async fn update_stats(&self, player_id: i32, mode: GameMode, stats: &AggregateStats) -> Result<(), DbError> {
        let updated = self
            .execute(
                "UPDATE stats SET pp = $1, acc = $2 WHERE id = $3 AND mode = $4",
                &[&stats.pp, &stats.acc, &player_id, &mode.as_i32()]
            )
            .await?;

        if updated == 0 {
            debug!("No stats row for player {} in {}", player_id, mode);
        }

        Ok(())
    }

    async fn update_map_pp100(&self, map_id: i32, pp100: f64) -> Result<(), DbError> {
        self.execute("UPDATE maps SET pp100 = $1 WHERE id = $2", &[&pp100, &map_id])
            .await?;

        Ok(())
    }

    async fn get_player_standing(&self, player_id: i32) -> Result<Option<PlayerStanding>, DbError> {
        let row = self
            .client
            .query_opt("SELECT id, country, priv FROM users WHERE id = $1", &[&player_id])
            .await?;

        match row {
            Some(row) => Ok(Some(PlayerStanding {
                player_id: row.try_get("id")?,
                country: row.try_get("country")?,
                privileges: Privileges(row.try_get("priv")?)
            })),
            None => Ok(None)
        }
    }
}
