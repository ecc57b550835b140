use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex, MutexGuard, PoisonError
    },
    time::Duration
};

use crate::{
    beatmaps::{md5_hex, BeatmapSource},
    calc::{CalcError, PerformanceCalculator, PerformanceRequest, PlayResult},
    database::{
        db_structs::{HitCounts, MapMetadata, PlayerStanding, ScoreRecord},
        DbError, PersistenceGateway
    },
    model::{
        stats::{AggregateStats, WeightedScore},
        structures::{game_mode::GameMode, privileges::Privileges}
    },
    ranking::{RankingError, RankingStore}
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Hash the fakes agree on for a beatmap's current file
pub fn map_md5(map_id: i32) -> String {
    md5_hex(format!("beatmap {}", map_id).as_bytes())
}

pub fn generate_map(id: i32, mode: GameMode) -> MapMetadata {
    MapMetadata {
        id,
        md5: map_md5(id),
        mode,
        pp100: None
    }
}

pub fn generate_score(id: i64, player_id: i32, map_id: i32, mode: GameMode) -> ScoreRecord {
    ScoreRecord {
        id,
        player_id,
        map_id,
        map_md5: map_md5(map_id),
        mode,
        mods: 0,
        max_combo: 100,
        hits: HitCounts {
            n300: 90,
            n100: 8,
            n50: 1,
            n_miss: 1,
            ..Default::default()
        },
        pp: 0.0,
        acc: 95.0
    }
}

/// `n` scores with pp in `[10, 500)` and accuracy in `[80, 100]`, reproducible per `seed`
pub fn generate_weighted_scores(n: usize, seed: u64) -> Vec<WeightedScore> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    (0..n)
        .map(|i| WeightedScore {
            id: i as i64 + 1,
            pp: rng.random_range(10.0..500.0),
            acc: rng.random_range(80.0..=100.0)
        })
        .collect()
}

pub fn generate_standing(player_id: i32, country: &str, unrestricted: bool) -> PlayerStanding {
    PlayerStanding {
        player_id,
        country: country.to_string(),
        privileges: Privileges(if unrestricted {
            Privileges::UNRESTRICTED | Privileges::VERIFIED
        } else {
            Privileges::VERIFIED
        })
    }
}

/// In-memory [`PersistenceGateway`] that records every write.
#[derive(Default)]
pub struct MemoryDb {
    maps: Vec<MapMetadata>,
    scores: Vec<ScoreRecord>,
    qualifying: HashMap<(i32, GameMode), Vec<WeightedScore>>,
    players: HashMap<GameMode, Vec<i32>>,
    standings: HashMap<i32, PlayerStanding>,
    rejected_scores: HashSet<i64>,
    fail_listing: AtomicBool,
    score_pp: Mutex<HashMap<i64, f64>>,
    stats: Mutex<HashMap<(i32, GameMode), AggregateStats>>,
    pp100: Mutex<HashMap<i32, f64>>,
    writes: AtomicUsize
}

impl MemoryDb {
    pub fn with_maps(mut self, maps: Vec<MapMetadata>) -> Self {
        self.maps = maps;
        self
    }

    pub fn with_scores(mut self, scores: Vec<ScoreRecord>) -> Self {
        self.scores = scores;
        self
    }

    /// Registers a player with stats in `mode` and the given qualifying scores
    pub fn with_player(
        mut self,
        mode: GameMode,
        standing: Option<PlayerStanding>,
        player_id: i32,
        scores: Vec<WeightedScore>
    ) -> Self {
        self.players.entry(mode).or_default().push(player_id);
        self.qualifying.insert((player_id, mode), scores);
        if let Some(standing) = standing {
            self.standings.insert(player_id, standing);
        }
        self
    }

    /// Writes of this score's pp are refused
    pub fn rejecting_score(mut self, score_id: i64) -> Self {
        self.rejected_scores.insert(score_id);
        self
    }

    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub fn score_pp(&self, score_id: i64) -> Option<f64> {
        lock(&self.score_pp).get(&score_id).copied()
    }

    pub fn score_pp_writes(&self) -> HashMap<i64, f64> {
        lock(&self.score_pp).clone()
    }

    pub fn stats(&self, player_id: i32, mode: GameMode) -> Option<AggregateStats> {
        lock(&self.stats).get(&(player_id, mode)).copied()
    }

    pub fn pp100(&self, map_id: i32) -> Option<f64> {
        lock(&self.pp100).get(&map_id).copied()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_listing(&self) -> Result<(), DbError> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(DbError::Rejected("listing unavailable".to_string()));
        }

        Ok(())
    }
}

#[async_trait]
impl PersistenceGateway for MemoryDb {
    async fn list_maps_missing_pp100(&self) -> Result<Vec<MapMetadata>, DbError> {
        self.check_listing()?;
        let pp100 = lock(&self.pp100);

        Ok(self
            .maps
            .iter()
            .filter(|m| m.pp100.is_none() && !pp100.contains_key(&m.id))
            .cloned()
            .collect())
    }

    async fn list_player_ids(&self, mode: GameMode) -> Result<Vec<i32>, DbError> {
        self.check_listing()?;
        Ok(self.players.get(&mode).cloned().unwrap_or_default())
    }

    async fn list_recalc_scores(&self, mode: GameMode) -> Result<Vec<ScoreRecord>, DbError> {
        self.check_listing()?;
        let written = lock(&self.score_pp);

        Ok(self
            .scores
            .iter()
            .filter(|s| s.mode == mode)
            .map(|s| ScoreRecord {
                pp: written.get(&s.id).copied().unwrap_or(s.pp),
                ..s.clone()
            })
            .collect())
    }

    async fn list_qualifying_scores(&self, player_id: i32, mode: GameMode) -> Result<Vec<WeightedScore>, DbError> {
        Ok(self.qualifying.get(&(player_id, mode)).cloned().unwrap_or_default())
    }

    async fn update_score_pp(&self, score_id: i64, pp: f64) -> Result<(), DbError> {
        if self.rejected_scores.contains(&score_id) {
            return Err(DbError::Rejected(format!("score {} is locked", score_id)));
        }

        self.writes.fetch_add(1, Ordering::SeqCst);
        lock(&self.score_pp).insert(score_id, pp);
        Ok(())
    }

    async fn update_stats(&self, player_id: i32, mode: GameMode, stats: &AggregateStats) -> Result<(), DbError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        lock(&self.stats).insert((player_id, mode), *stats);
        Ok(())
    }

    async fn update_map_pp100(&self, map_id: i32, pp100: f64) -> Result<(), DbError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        lock(&self.pp100).insert(map_id, pp100);
        Ok(())
    }

    async fn get_player_standing(&self, player_id: i32) -> Result<Option<PlayerStanding>, DbError> {
        Ok(self.standings.get(&player_id).cloned())
    }
}

/// In-memory sorted sets
#[derive(Default)]
pub struct MemoryRanking {
    sets: Mutex<HashMap<String, HashMap<i32, f64>>>,
    writes: AtomicUsize
}

impl MemoryRanking {
    pub fn score(&self, key: &str, member: i32) -> Option<f64> {
        lock(&self.sets).get(key).and_then(|set| set.get(&member).copied())
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RankingStore for MemoryRanking {
    async fn upsert_member(&self, key: &str, member: i32, score: f64) -> Result<(), RankingError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        lock(&self.sets).entry(key.to_string()).or_default().insert(member, score);
        Ok(())
    }
}

/// [`BeatmapSource`] backed by sets of ids instead of a mirror.
///
/// - `present`: already on disk with the current hash
/// - `available`: the mirror serves the current hash
/// - `stale`: the mirror only serves a file with a different hash
///
/// Anything else is unavailable.
#[derive(Default)]
pub struct FakeBeatmapSource {
    present: HashSet<i32>,
    available: HashSet<i32>,
    stale: HashSet<i32>,
    delay: Option<Duration>,
    downloaded: Mutex<HashSet<i32>>,
    requests: Mutex<Vec<(i32, Option<String>)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize
}

impl FakeBeatmapSource {
    pub fn with_present(mut self, ids: impl IntoIterator<Item = i32>) -> Self {
        self.present.extend(ids);
        self
    }

    pub fn with_available(mut self, ids: impl IntoIterator<Item = i32>) -> Self {
        self.available.extend(ids);
        self
    }

    pub fn with_stale(mut self, ids: impl IntoIterator<Item = i32>) -> Self {
        self.stale.extend(ids);
        self
    }

    /// Every mirror request takes `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Mirror requests made, with the hash each one asked for
    pub fn requests(&self) -> Vec<(i32, Option<String>)> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BeatmapSource for FakeBeatmapSource {
    async fn ensure_available(&self, map_id: i32, expected_md5: Option<&str>) -> bool {
        lock(&self.requests).push((map_id, expected_md5.map(str::to_string)));

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let served = match expected_md5 {
            Some(_) => self.available.contains(&map_id),
            None => self.available.contains(&map_id) || self.stale.contains(&map_id)
        };
        if served {
            lock(&self.downloaded).insert(map_id);
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        served
    }

    async fn is_present(&self, map_id: i32, expected_md5: Option<&str>) -> bool {
        if self.present.contains(&map_id) {
            return true;
        }

        lock(&self.downloaded).contains(&map_id) && (expected_md5.is_none() || !self.stale.contains(&map_id))
    }

    fn beatmap_path(&self, map_id: i32) -> PathBuf {
        PathBuf::from(format!("{}.osu", map_id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FakeBeatmap {
    pub map_id: i32
}

/// Calculator with a transparent formula:
/// `map_id * 10 + n300 - 5 * n_miss + combo / 2` for plays and
/// `map_id * 10 + accuracy` for accuracy requests.
#[derive(Default)]
pub struct FakeCalculator {
    nan_maps: HashSet<i32>,
    panicking_maps: HashSet<i32>,
    parses: AtomicUsize,
    calculations: AtomicUsize
}

impl FakeCalculator {
    /// Calculations on these maps return NaN
    pub fn with_nan_maps(mut self, ids: impl IntoIterator<Item = i32>) -> Self {
        self.nan_maps.extend(ids);
        self
    }

    /// Calculations on these maps fail as if the engine crashed
    pub fn with_panicking_maps(mut self, ids: impl IntoIterator<Item = i32>) -> Self {
        self.panicking_maps.extend(ids);
        self
    }

    pub fn parse_count(&self) -> usize {
        self.parses.load(Ordering::SeqCst)
    }

    pub fn calculation_count(&self) -> usize {
        self.calculations.load(Ordering::SeqCst)
    }

    pub fn expected_pp(map_id: i32, play: &PlayResult) -> f64 {
        let base = f64::from(map_id) * 10.0;
        match play {
            PlayResult::Hits { combo, hits } => {
                base + f64::from(hits.n300) - 5.0 * f64::from(hits.n_miss) + f64::from(*combo) * 0.5
            }
            PlayResult::Accuracy(acc) => base + acc
        }
    }
}

impl PerformanceCalculator for FakeCalculator {
    type Beatmap = FakeBeatmap;

    fn parse(&self, path: &Path) -> Result<FakeBeatmap, CalcError> {
        self.parses.fetch_add(1, Ordering::SeqCst);

        path.file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| stem.parse().ok())
            .map(|map_id| FakeBeatmap { map_id })
            .ok_or_else(|| CalcError::Parse {
                path: path.display().to_string(),
                reason: "not a beatmap id".to_string()
            })
    }

    fn performance(&self, beatmap: &FakeBeatmap, request: &PerformanceRequest) -> Result<f64, CalcError> {
        self.calculations.fetch_add(1, Ordering::SeqCst);

        if self.panicking_maps.contains(&beatmap.map_id) {
            return Err(CalcError::Panicked(format!("beatmap {}", beatmap.map_id)));
        }
        if self.nan_maps.contains(&beatmap.map_id) {
            return Ok(f64::NAN);
        }

        Ok(Self::expected_pp(beatmap.map_id, &request.play))
    }
}
