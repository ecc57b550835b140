use approx::assert_abs_diff_eq;
use pp_recalc::{
    calc::{PerformanceRequest, PlayResult},
    model::{
        stats::{calculate_aggregate, WeightedScore},
        structures::game_mode::GameMode
    },
    ranking::leaderboard_key,
    recalc::{Phase, PhaseSummary, RecalcConfig, RecalcError, RunPlan},
    utils::test_utils::{
        generate_map, generate_score, generate_standing, generate_weighted_scores, map_md5, FakeBeatmapSource,
        FakeCalculator, MemoryDb
    }
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::common::{init_test_env, recalculator, test_config};

const MODE: GameMode = GameMode::VanillaOsu;

fn plan(scores: bool, stats: bool, maps_pp: bool) -> RunPlan {
    RunPlan {
        scores,
        stats,
        maps_pp,
        modes: vec![MODE]
    }
}

fn expected_score_pp(map_id: i32) -> f64 {
    let score = generate_score(0, 0, map_id, MODE);
    FakeCalculator::expected_pp(map_id, &PerformanceRequest::from_score(&score).play)
}

fn summary(done: usize, skipped: usize, failed: usize) -> PhaseSummary {
    PhaseSummary { done, skipped, failed }
}

#[tokio::test]
async fn test_failing_item_does_not_affect_its_chunk() {
    init_test_env();
    let scores = (1..=10).map(|i| generate_score(i, 1, i as i32, MODE)).collect();
    let db = MemoryDb::default().with_scores(scores).rejecting_score(4);
    let source = FakeBeatmapSource::default().with_present(1..=10);

    let recalc = recalculator(db, source, FakeCalculator::default(), test_config());
    let run = recalc.run(&plan(true, false, false)).await.unwrap();

    assert_eq!(run.get(Phase::Scores, Some(MODE)), Some(&summary(9, 0, 1)));
    assert_eq!(recalc.db().score_pp(4), None);
    for id in (1..=10).filter(|id| *id != 4) {
        assert_eq!(recalc.db().score_pp(id), Some(expected_score_pp(id as i32)));
    }
}

#[tokio::test]
async fn test_rerun_writes_identical_values() {
    init_test_env();
    let scores = (1..=25).map(|i| generate_score(i, 1, (i % 5) as i32 + 1, MODE)).collect();
    let db = MemoryDb::default().with_scores(scores).with_player(
        MODE,
        Some(generate_standing(1, "de", true)),
        1,
        generate_weighted_scores(25, 3)
    );
    let source = FakeBeatmapSource::default().with_present(1..=5);

    let recalc = recalculator(db, source, FakeCalculator::default(), test_config());

    recalc.run(&plan(true, true, false)).await.unwrap();
    let first_scores = recalc.db().score_pp_writes();
    let first_stats = recalc.db().stats(1, MODE);

    recalc.run(&plan(true, true, false)).await.unwrap();

    assert_eq!(recalc.db().score_pp_writes(), first_scores);
    assert_eq!(recalc.db().stats(1, MODE), first_stats);
    assert!(first_stats.is_some());
}

#[tokio::test]
async fn test_shared_beatmap_is_fetched_and_parsed_once() {
    init_test_env();
    let scores = (1..=5).map(|i| generate_score(i, i as i32, 7, MODE)).collect();
    let db = MemoryDb::default().with_scores(scores);
    let source = FakeBeatmapSource::default().with_available([7]);

    let recalc = recalculator(db, source, FakeCalculator::default(), test_config());
    let run = recalc.run(&plan(true, false, false)).await.unwrap();

    assert_eq!(run.get(Phase::Scores, Some(MODE)), Some(&summary(5, 0, 0)));
    assert_eq!(recalc.beatmaps().request_count(), 1);
    assert_eq!(recalc.calculator().parse_count(), 1);
    assert_eq!(recalc.calculator().calculation_count(), 5);
    assert_eq!(recalc.cache().len(), 1);
}

#[tokio::test]
async fn test_only_selected_phases_run() {
    init_test_env();
    let db = MemoryDb::default()
        .with_scores(vec![generate_score(1, 1, 1, MODE)])
        .with_maps(vec![generate_map(1, MODE)])
        .with_player(
            MODE,
            Some(generate_standing(1, "us", true)),
            1,
            vec![WeightedScore { id: 1, pp: 100.0, acc: 99.0 }]
        );
    let source = FakeBeatmapSource::default().with_present([1]);

    let recalc = recalculator(db, source, FakeCalculator::default(), test_config());
    let run = recalc.run(&plan(false, true, false)).await.unwrap();

    assert!(!run.ran(Phase::Scores));
    assert!(!run.ran(Phase::MapsPp));
    assert!(recalc.db().score_pp_writes().is_empty());
    assert_eq!(recalc.db().pp100(1), None);
    assert_eq!(recalc.db().write_count(), 1);
    assert_eq!(recalc.calculator().calculation_count(), 0);
}

#[tokio::test]
async fn test_non_finite_pp_is_stored_as_zero() {
    init_test_env();
    let db = MemoryDb::default().with_scores(vec![generate_score(1, 1, 3, MODE), generate_score(2, 1, 4, MODE)]);
    let source = FakeBeatmapSource::default().with_present([3, 4]);
    let calculator = FakeCalculator::default().with_nan_maps([3]);

    let recalc = recalculator(db, source, calculator, test_config());
    let run = recalc.run(&plan(true, false, false)).await.unwrap();

    assert_eq!(run.get(Phase::Scores, Some(MODE)), Some(&summary(2, 0, 0)));
    assert_eq!(recalc.db().score_pp(1), Some(0.0));
    assert_eq!(recalc.db().score_pp(2), Some(expected_score_pp(4)));
}

#[tokio::test]
async fn test_engine_crash_fails_only_that_score() {
    init_test_env();
    let db = MemoryDb::default().with_scores(vec![generate_score(1, 1, 3, MODE), generate_score(2, 1, 4, MODE)]);
    let source = FakeBeatmapSource::default().with_present([3, 4]);
    let calculator = FakeCalculator::default().with_panicking_maps([4]);

    let recalc = recalculator(db, source, calculator, test_config());
    let run = recalc.run(&plan(true, false, false)).await.unwrap();

    assert_eq!(run.get(Phase::Scores, Some(MODE)), Some(&summary(1, 0, 1)));
    assert_eq!(recalc.db().score_pp(2), None);
}

#[tokio::test]
async fn test_player_without_scores_is_left_untouched() {
    init_test_env();
    let db = MemoryDb::default().with_player(MODE, Some(generate_standing(5, "jp", true)), 5, vec![]);

    let recalc = recalculator(db, FakeBeatmapSource::default(), FakeCalculator::default(), test_config());
    let run = recalc.run(&plan(false, true, false)).await.unwrap();

    assert_eq!(run.get(Phase::Stats, Some(MODE)), Some(&summary(0, 1, 0)));
    assert_eq!(recalc.db().stats(5, MODE), None);
    assert_eq!(recalc.db().write_count(), 0);
    assert_eq!(recalc.ranking().write_count(), 0);
}

#[tokio::test]
async fn test_unrestricted_player_is_ranked_globally_and_by_country() {
    init_test_env();
    let scores = vec![
        WeightedScore { id: 1, pp: 500.0, acc: 95.0 },
        WeightedScore { id: 2, pp: 400.0, acc: 90.0 },
        WeightedScore { id: 3, pp: 300.0, acc: 85.0 },
    ];
    let db = MemoryDb::default().with_player(MODE, Some(generate_standing(3, "gb", true)), 3, scores);

    let recalc = recalculator(db, FakeBeatmapSource::default(), FakeCalculator::default(), test_config());
    recalc.run(&plan(false, true, false)).await.unwrap();

    let stats = recalc.db().stats(3, MODE).unwrap();
    assert_eq!(stats.pp, 1151);
    assert_abs_diff_eq!(stats.acc, 90.17, epsilon = 0.01);

    let ranking = recalc.ranking();
    assert_eq!(ranking.score(&leaderboard_key(MODE, None), 3), Some(1151.0));
    assert_eq!(ranking.score(&leaderboard_key(MODE, Some("gb")), 3), Some(1151.0));
    assert_eq!(ranking.write_count(), 2);
}

#[tokio::test]
async fn test_restricted_player_is_not_ranked() {
    init_test_env();
    let scores = generate_weighted_scores(40, 11);
    let expected = calculate_aggregate(&scores).unwrap();
    let db = MemoryDb::default().with_player(MODE, Some(generate_standing(8, "fr", false)), 8, scores);

    let recalc = recalculator(db, FakeBeatmapSource::default(), FakeCalculator::default(), test_config());
    let run = recalc.run(&plan(false, true, false)).await.unwrap();

    assert_eq!(run.get(Phase::Stats, Some(MODE)), Some(&summary(1, 0, 0)));
    assert_eq!(recalc.db().stats(8, MODE), Some(expected));
    assert_eq!(recalc.ranking().write_count(), 0);
}

#[tokio::test]
async fn test_player_without_standing_fails_alone() {
    init_test_env();
    let db = MemoryDb::default()
        .with_player(MODE, None, 1, generate_weighted_scores(5, 1))
        .with_player(MODE, Some(generate_standing(2, "kr", true)), 2, generate_weighted_scores(5, 2));

    let recalc = recalculator(db, FakeBeatmapSource::default(), FakeCalculator::default(), test_config());
    let run = recalc.run(&plan(false, true, false)).await.unwrap();

    assert_eq!(run.get(Phase::Stats, Some(MODE)), Some(&summary(1, 0, 1)));
    assert!(recalc.db().stats(2, MODE).is_some());
    assert_eq!(recalc.ranking().write_count(), 2);
}

#[tokio::test]
async fn test_stale_hash_falls_back_to_unhashed_fetch() {
    init_test_env();
    let db = MemoryDb::default().with_scores(vec![generate_score(1, 1, 9, MODE)]);
    let source = FakeBeatmapSource::default().with_stale([9]);

    let recalc = recalculator(db, source, FakeCalculator::default(), test_config());
    let run = recalc.run(&plan(true, false, false)).await.unwrap();

    assert_eq!(run.get(Phase::Scores, Some(MODE)), Some(&summary(1, 0, 0)));
    assert_eq!(recalc.beatmaps().requests(), vec![(9, Some(map_md5(9))), (9, None)]);
    assert_eq!(recalc.db().score_pp(1), Some(expected_score_pp(9)));
}

#[tokio::test]
async fn test_unavailable_beatmap_skips_its_scores() {
    init_test_env();
    let db = MemoryDb::default().with_scores(vec![generate_score(1, 1, 11, MODE), generate_score(2, 1, 12, MODE)]);
    let source = FakeBeatmapSource::default().with_present([12]);

    let recalc = recalculator(db, source, FakeCalculator::default(), test_config());
    let run = recalc.run(&plan(true, false, false)).await.unwrap();

    assert_eq!(run.get(Phase::Scores, Some(MODE)), Some(&summary(1, 1, 0)));
    assert_eq!(recalc.db().score_pp(1), None);
    assert_eq!(recalc.calculator().parse_count(), 1);
    // One hashed attempt and one fallback
    assert_eq!(recalc.beatmaps().request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_fetch_concurrency_is_bounded() {
    init_test_env();
    let scores = (1..=30).map(|i| generate_score(i, 1, i as i32, MODE)).collect();
    let db = MemoryDb::default().with_scores(scores);
    let source = FakeBeatmapSource::default()
        .with_available(1..=30)
        .with_delay(Duration::from_millis(100));
    let config = RecalcConfig {
        fetch_concurrency: 3,
        score_chunk_size: 30,
        ..test_config()
    };

    let recalc = recalculator(db, source, FakeCalculator::default(), config);
    let run = recalc.run(&plan(true, false, false)).await.unwrap();

    assert_eq!(run.get(Phase::Scores, Some(MODE)), Some(&summary(30, 0, 0)));
    assert_eq!(recalc.beatmaps().max_in_flight(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_downloads_respect_rate_limit() {
    init_test_env();
    let scores = (1..=6).map(|i| generate_score(i, 1, i as i32, MODE)).collect();
    let db = MemoryDb::default().with_scores(scores);
    let source = FakeBeatmapSource::default().with_available(1..=6);
    let config = RecalcConfig {
        rate_limit: 2,
        rate_window: Duration::from_secs(60),
        ..test_config()
    };

    let recalc = recalculator(db, source, FakeCalculator::default(), config);
    let started = tokio::time::Instant::now();
    recalc.run(&plan(true, false, false)).await.unwrap();

    // Two fetches per window: the 5th and 6th go out after two full windows
    assert!(started.elapsed() >= Duration::from_secs(120));
    assert!(started.elapsed() < Duration::from_secs(180));
    assert_eq!(recalc.beatmaps().request_count(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_local_beatmaps_do_not_use_rate_limit() {
    init_test_env();
    let scores = (1..=10).map(|i| generate_score(i, 1, i as i32, MODE)).collect();
    let db = MemoryDb::default().with_scores(scores);
    let source = FakeBeatmapSource::default().with_present(1..=10);
    let config = RecalcConfig {
        rate_limit: 1,
        ..test_config()
    };

    let recalc = recalculator(db, source, FakeCalculator::default(), config);
    let started = tokio::time::Instant::now();
    recalc.run(&plan(true, false, false)).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(recalc.beatmaps().request_count(), 0);
}

#[tokio::test]
async fn test_maps_pp_fills_missing_reference_values() {
    init_test_env();
    let db = MemoryDb::default().with_maps(vec![
        generate_map(1, GameMode::VanillaTaiko),
        generate_map(2, GameMode::VanillaMania),
        generate_map(3, GameMode::VanillaOsu),
        generate_map(4, GameMode::VanillaOsu),
    ]);
    // Map 4 is neither on disk nor on the mirror
    let source = FakeBeatmapSource::default().with_present([1, 2, 3]);
    let calculator = FakeCalculator::default().with_nan_maps([3]);

    let recalc = recalculator(db, source, calculator, test_config());
    let run = recalc.run(&plan(false, false, true)).await.unwrap();

    assert_eq!(run.get(Phase::MapsPp, None), Some(&summary(3, 1, 0)));
    for id in [1, 2] {
        assert_eq!(
            recalc.db().pp100(id),
            Some(FakeCalculator::expected_pp(id, &PlayResult::Accuracy(100.0)))
        );
    }
    assert_eq!(recalc.db().pp100(3), Some(0.0));
    assert_eq!(recalc.db().pp100(4), None);
    assert_eq!(recalc.db().write_count(), 3);
    assert_eq!(recalc.beatmaps().requests(), vec![(4, Some(map_md5(4))), (4, None)]);

    // Only the unavailable map is left for the next run
    let rerun = recalc.recalculate_maps_pp().await.unwrap();
    assert_eq!(rerun, summary(0, 1, 0));
    assert_eq!(recalc.db().write_count(), 3);
}

#[tokio::test]
async fn test_listing_failure_aborts_run() {
    init_test_env();
    let db = MemoryDb::default().with_scores(vec![generate_score(1, 1, 1, MODE)]);
    db.fail_listing(true);

    let recalc = recalculator(db, FakeBeatmapSource::default(), FakeCalculator::default(), test_config());
    let result = recalc.run(&plan(true, true, false)).await;

    assert!(matches!(result, Err(RecalcError::Persistence(_))));
}

#[tokio::test]
async fn test_cancelled_before_start() {
    init_test_env();
    let db = MemoryDb::default().with_scores(vec![generate_score(1, 1, 1, MODE)]);
    let token = CancellationToken::new();
    token.cancel();

    let recalc = recalculator(db, FakeBeatmapSource::default().with_present([1]), FakeCalculator::default(), test_config())
        .with_cancellation(token);
    let run = recalc.run(&plan(true, true, false)).await.unwrap();

    assert!(run.cancelled);
    assert_eq!(run.totals().total(), 0);
    assert_eq!(recalc.db().write_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_finishes_running_chunk() {
    init_test_env();
    let scores = (1..=5).map(|i| generate_score(i, 1, i as i32, MODE)).collect();
    let db = MemoryDb::default().with_scores(scores);
    let source = FakeBeatmapSource::default()
        .with_available(1..=5)
        .with_delay(Duration::from_secs(10));
    let config = RecalcConfig {
        score_chunk_size: 1,
        ..test_config()
    };
    let token = CancellationToken::new();

    tokio::spawn({
        let token = token.clone();
        async move {
            tokio::time::sleep(Duration::from_secs(15)).await;
            token.cancel();
        }
    });

    let recalc = recalculator(db, source, FakeCalculator::default(), config).with_cancellation(token);
    let run = recalc.run(&plan(true, true, false)).await.unwrap();

    assert!(run.cancelled);
    assert_eq!(run.get(Phase::Scores, Some(MODE)), Some(&summary(2, 0, 0)));
    assert!(!run.ran(Phase::Stats));
    assert_eq!(recalc.db().score_pp_writes().len(), 2);
}
