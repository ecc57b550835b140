use clap::Parser;
use dotenv::dotenv;
use pp_recalc::{
    args::Args,
    beatmaps::OsuFileStore,
    calc::RosuCalculator,
    database::db::DbClient,
    ranking::RedisRankingStore,
    recalc::Recalculator,
    utils::{progress_utils::format_duration, tracing_utils::init_tracing}
};
use std::{process::ExitCode, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    let args = Args::parse();
    init_tracing(&args.log_filter());

    let db = match DbClient::connect(&args.connection_string).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            error!("Application cannot start without a valid database connection");
            return ExitCode::FAILURE;
        }
    };

    let ranking = match RedisRankingStore::connect(&args.redis_url).await {
        Ok(ranking) => ranking,
        Err(e) => {
            error!("Failed to connect to redis at {}: {}", args.redis_url, e);
            return ExitCode::FAILURE;
        }
    };

    let beatmaps = match OsuFileStore::new(&args.beatmaps_path, &args.mirror_url) {
        Ok(beatmaps) => beatmaps,
        Err(e) => {
            error!("Failed to set up beatmap store: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, finishing the current chunk...");
                cancel.cancel();
            }
        }
    });

    let recalculator =
        Recalculator::new(db, ranking, beatmaps, RosuCalculator, args.recalc_config()).with_cancellation(cancel);

    let started = Instant::now();
    match recalculator.run(&args.run_plan()).await {
        Ok(summary) => {
            summary.log();
            info!("Finished in {}", format_duration(started.elapsed()));
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Recalculation aborted: {}", e);
            ExitCode::FAILURE
        }
    }
}
