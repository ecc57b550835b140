use futures::future::join_all;
use std::{future::Future, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use super::{
    cache::BeatmapCache,
    config::{RecalcConfig, RunPlan, MAPS_PP_CHUNK_SIZE},
    error::RecalcError,
    fetch_gate::FetchGate,
    rate_limiter::RateLimiter,
    summary::{ItemOutcome, Phase, PhaseSummary, RunSummary}
};
use crate::{
    beatmaps::BeatmapSource,
    calc::{sanitize_pp, PerformanceCalculator, PerformanceRequest},
    database::{
        db_structs::{MapMetadata, ScoreRecord},
        PersistenceGateway
    },
    model::{
        stats::{calculate_aggregate, AggregateStats},
        structures::game_mode::GameMode
    },
    ranking::{leaderboard_key, RankingStore},
    utils::progress_utils::ProgressReporter
};

/// Drives a recalculation run.
///
/// Owns the run-scoped state (rate limiter, fetch gate, beatmap cache);
/// build one per run. Items are processed in chunks: every item of a chunk
/// runs concurrently and the next chunk starts once all of them finished.
/// An item's failure never affects other items.
pub struct Recalculator<G, R, S, C>
where
    C: PerformanceCalculator
{
    db: G,
    ranking: R,
    beatmaps: S,
    calculator: C,
    limiter: RateLimiter,
    gate: FetchGate,
    cache: BeatmapCache<C::Beatmap>,
    config: RecalcConfig,
    cancel: CancellationToken
}

impl<G, R, S, C> Recalculator<G, R, S, C>
where
    G: PersistenceGateway,
    R: RankingStore,
    S: BeatmapSource,
    C: PerformanceCalculator
{
    pub fn new(db: G, ranking: R, beatmaps: S, calculator: C, config: RecalcConfig) -> Self {
        Recalculator {
            db,
            ranking,
            beatmaps,
            calculator,
            limiter: RateLimiter::new(config.rate_limit, config.rate_window),
            gate: FetchGate::new(config.fetch_concurrency),
            cache: BeatmapCache::new(),
            config,
            cancel: CancellationToken::new()
        }
    }

    /// Once `cancel` fires no new chunk is started; the running one finishes
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn db(&self) -> &G {
        &self.db
    }

    pub fn ranking(&self) -> &R {
        &self.ranking
    }

    pub fn beatmaps(&self) -> &S {
        &self.beatmaps
    }

    pub fn calculator(&self) -> &C {
        &self.calculator
    }

    pub fn cache(&self) -> &BeatmapCache<C::Beatmap> {
        &self.cache
    }

    pub fn config(&self) -> &RecalcConfig {
        &self.config
    }

    /// Runs the phases selected by `plan`: pp100 first, then scores and
    /// stats for each mode in turn.
    ///
    /// Item failures are counted in the summary; only failing to list the
    /// items of a phase aborts the run.
    pub async fn run(&self, plan: &RunPlan) -> Result<RunSummary, RecalcError> {
        let mut summary = RunSummary::default();

        if plan.maps_pp {
            summary.record(Phase::MapsPp, None, self.recalculate_maps_pp().await?);
        }

        for mode in &plan.modes {
            if self.cancel.is_cancelled() {
                break;
            }

            if plan.scores {
                summary.record(Phase::Scores, Some(*mode), self.recalculate_mode_scores(*mode).await?);
            }

            if plan.stats && !self.cancel.is_cancelled() {
                summary.record(Phase::Stats, Some(*mode), self.recalculate_mode_stats(*mode).await?);
            }
        }

        summary.cancelled = self.cancel.is_cancelled();
        Ok(summary)
    }

    /// Fills in `pp100` for every beatmap that lacks it
    pub async fn recalculate_maps_pp(&self) -> Result<PhaseSummary, RecalcError> {
        let maps = self.db.list_maps_missing_pp100().await?;

        if maps.is_empty() {
            info!("All maps already have pp100 calculated!");
            return Ok(PhaseSummary::default());
        }

        info!("Found {} maps without pp100 calculation", maps.len());

        Ok(self
            .process_chunks(&maps, MAPS_PP_CHUNK_SIZE, "maps", |map| async move {
                let result = self.recalculate_map_pp100(map).await;
                Self::outcome("map", i64::from(map.id), result)
            })
            .await)
    }

    /// Recalculates and stores the pp of every best score in `mode`
    pub async fn recalculate_mode_scores(&self, mode: GameMode) -> Result<PhaseSummary, RecalcError> {
        let scores = self.db.list_recalc_scores(mode).await?;

        Ok(self
            .process_chunks(&scores, self.config.score_chunk_size, "scores", |score| async move {
                let result = self.recalculate_score(score).await;
                Self::outcome("score", score.id, result)
            })
            .await)
    }

    /// Rebuilds pp / accuracy of every player with stats in `mode`
    pub async fn recalculate_mode_stats(&self, mode: GameMode) -> Result<PhaseSummary, RecalcError> {
        let player_ids = self.db.list_player_ids(mode).await?;

        Ok(self
            .process_chunks(&player_ids, self.config.stats_chunk_size, "users", |player_id| async move {
                match self.recalculate_player(*player_id, mode).await {
                    Ok(None) => ItemOutcome::Skipped,
                    result => Self::outcome("user", i64::from(*player_id), result)
                }
            })
            .await)
    }

    async fn process_chunks<'a, T, F, Fut>(
        &'a self,
        items: &'a [T],
        chunk_size: usize,
        label: &'static str,
        process: F
    ) -> PhaseSummary
    where
        F: Fn(&'a T) -> Fut,
        Fut: Future<Output = ItemOutcome> + 'a
    {
        let mut summary = PhaseSummary::default();
        if items.is_empty() {
            return summary;
        }

        let mut progress = ProgressReporter::new(items.len(), label);

        for chunk in items.chunks(chunk_size.max(1)) {
            if self.cancel.is_cancelled() {
                warn!(
                    "Cancelled with {} {} left unprocessed",
                    items.len() as u64 - progress.processed(),
                    label
                );
                break;
            }

            let outcomes = join_all(chunk.iter().map(&process))
                .instrument(progress.span().clone())
                .await;

            for outcome in outcomes {
                summary.record(outcome);
            }

            progress.advance(chunk.len());
        }

        progress.finish(&summary);
        summary
    }

    fn outcome<T>(kind: &'static str, id: i64, result: Result<T, RecalcError>) -> ItemOutcome {
        match result {
            Ok(_) => ItemOutcome::Done,
            Err(e @ RecalcError::ResourceUnavailable(_)) => {
                warn!("Skipped {} {} ({})", kind, id, e);
                e.outcome()
            }
            Err(e) => {
                error!("Failed to recalculate {} {}: {}", kind, id, e);
                e.outcome()
            }
        }
    }

    /// Makes the beatmap file available, spending a rate limiter slot only
    /// when it has to come from the mirror. A hash mismatch is retried once
    /// without the hash.
    async fn ensure_beatmap(&self, map_id: i32, md5: &str) -> Result<(), RecalcError> {
        if self.available(map_id, Some(md5)).await {
            return Ok(());
        }

        debug!("Beatmap {} not available as {}, retrying without hash", map_id, md5);
        if self.available(map_id, None).await {
            return Ok(());
        }

        Err(RecalcError::ResourceUnavailable(map_id))
    }

    async fn available(&self, map_id: i32, md5: Option<&str>) -> bool {
        if self.beatmaps.is_present(map_id, md5).await {
            return true;
        }

        self.limiter.acquire().await;
        self.beatmaps.ensure_available(map_id, md5).await
    }

    /// Parsed beatmap from the cache, fetching and parsing it on a miss
    async fn beatmap(&self, map_id: i32, md5: &str) -> Result<Arc<C::Beatmap>, RecalcError> {
        self.cache
            .get_or_load(map_id, || async move {
                self.ensure_beatmap(map_id, md5).await?;
                let path = self.beatmaps.beatmap_path(map_id);

                Ok::<_, RecalcError>(self.calculator.parse(&path)?)
            })
            .await
    }

    async fn calculate(&self, map_id: i32, md5: &str, request: &PerformanceRequest) -> Result<f64, RecalcError> {
        let _permit = self.gate.acquire().await?;
        let beatmap = self.beatmap(map_id, md5).await?;

        Ok(sanitize_pp(self.calculator.performance(&beatmap, request)?))
    }

    pub async fn recalculate_score(&self, score: &ScoreRecord) -> Result<f64, RecalcError> {
        let request = PerformanceRequest::from_score(score);
        let pp = self.calculate(score.map_id, &score.map_md5, &request).await?;

        self.db.update_score_pp(score.id, pp).await?;

        debug!("Recalculated score {} ({:.3}pp -> {:.3}pp)", score.id, score.pp, pp);
        Ok(pp)
    }

    pub async fn recalculate_map_pp100(&self, map: &MapMetadata) -> Result<f64, RecalcError> {
        let request = PerformanceRequest::reference_max(map);
        let pp100 = self.calculate(map.id, &map.md5, &request).await?;

        self.db.update_map_pp100(map.id, pp100).await?;

        debug!("Map {} pp100 = {:.3}", map.id, pp100);
        Ok(pp100)
    }

    /// Returns `None` (and writes nothing) when the player has no
    /// qualifying scores.
    pub async fn recalculate_player(
        &self,
        player_id: i32,
        mode: GameMode
    ) -> Result<Option<AggregateStats>, RecalcError> {
        let scores = self.db.list_qualifying_scores(player_id, mode).await?;
        let stats = match calculate_aggregate(&scores) {
            Some(stats) => stats,
            None => return Ok(None)
        };

        self.db.update_stats(player_id, mode, &stats).await?;

        let standing = self
            .db
            .get_player_standing(player_id)
            .await?
            .ok_or(RecalcError::UnknownEntity {
                kind: "user",
                id: i64::from(player_id)
            })?;

        if standing.privileges.is_unrestricted() {
            let pp = f64::from(stats.pp);
            self.ranking
                .upsert_member(&leaderboard_key(mode, None), player_id, pp)
                .await?;
            self.ranking
                .upsert_member(&leaderboard_key(mode, Some(&standing.country)), player_id, pp)
                .await?;
        }

        debug!("Recalculated user {} ({}pp, {:.3}%)", player_id, stats.pp, stats.acc);
        Ok(Some(stats))
    }
}
