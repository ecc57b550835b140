use crate::model::structures::{game_mode::GameMode, privileges::Privileges};

/// Judgement counts of a play, in the server's column naming
/// (`n_geki` doubles as mania 320s, `n_katu` as mania 200s / catch tiny droplet misses).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HitCounts {
    pub n_geki: i32,
    pub n300: i32,
    pub n_katu: i32,
    pub n100: i32,
    pub n50: i32,
    pub n_miss: i32
}

/// A best score with everything needed to recalculate its pp.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRecord {
    pub id: i64,
    pub player_id: i32,
    pub map_id: i32,
    /// MD5 of the beatmap file the score was set on
    pub map_md5: String,
    pub mode: GameMode,
    pub mods: i32,
    pub max_combo: i32,
    pub hits: HitCounts,
    /// Currently stored pp, overwritten by recalculation
    pub pp: f64,
    pub acc: f64
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapMetadata {
    pub id: i32,
    pub md5: String,
    pub mode: GameMode,
    /// pp of a nomod SS, unset until precomputed
    pub pp100: Option<f64>
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStanding {
    pub player_id: i32,
    pub country: String,
    pub privileges: Privileges
}
