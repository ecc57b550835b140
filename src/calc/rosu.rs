use rosu_pp::{model::mode::GameMode as RosuMode, Beatmap, Performance};
use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    path::Path
};

use super::{CalcError, PerformanceCalculator, PerformanceRequest, PlayResult};
use crate::model::structures::game_mode::GameMode;

/// pp calculation backed by rosu-pp.
#[derive(Debug, Clone, Copy, Default)]
pub struct RosuCalculator;

impl RosuCalculator {
    fn ruleset(mode: GameMode) -> RosuMode {
        match mode.as_vanilla() {
            GameMode::VanillaTaiko => RosuMode::Taiko,
            GameMode::VanillaCatch => RosuMode::Catch,
            GameMode::VanillaMania => RosuMode::Mania,
            _ => RosuMode::Osu
        }
    }

    fn count(field: &'static str, value: i32) -> Result<u32, CalcError> {
        u32::try_from(value).map_err(|_| CalcError::InvalidInput { field, value })
    }

    fn calculate(beatmap: &Beatmap, request: &PerformanceRequest) -> Result<f64, CalcError> {
        let mods = Self::count("mods", request.mods)?;
        let performance = Performance::new(beatmap)
            .mode_or_ignore(Self::ruleset(request.mode))
            .mods(mods);

        let performance = match request.play {
            PlayResult::Hits { combo, hits } => performance
                .combo(Self::count("max_combo", combo)?)
                .n_geki(Self::count("ngeki", hits.n_geki)?)
                .n300(Self::count("n300", hits.n300)?)
                .n_katu(Self::count("nkatu", hits.n_katu)?)
                .n100(Self::count("n100", hits.n100)?)
                .n50(Self::count("n50", hits.n50)?)
                .misses(Self::count("nmiss", hits.n_miss)?),
            PlayResult::Accuracy(acc) => performance.accuracy(acc).misses(0)
        };

        // rosu-pp asserts on some malformed beatmaps; keep that contained to the score
        catch_unwind(AssertUnwindSafe(|| performance.calculate().pp())).map_err(|payload| {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            CalcError::Panicked(reason)
        })
    }
}

impl PerformanceCalculator for RosuCalculator {
    type Beatmap = Beatmap;

    fn parse(&self, path: &Path) -> Result<Beatmap, CalcError> {
        Beatmap::from_path(path).map_err(|e| CalcError::Parse {
            path: path.display().to_string(),
            reason: e.to_string()
        })
    }

    fn performance(&self, beatmap: &Beatmap, request: &PerformanceRequest) -> Result<f64, CalcError> {
        Self::calculate(beatmap, request)
    }
}
