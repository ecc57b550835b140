use std::{convert::TryFrom, fmt};
use strum_macros::EnumIter;

/// Score partitions stored by the server. Relax and autopilot
/// scores live in their own partitions but are scored with the
/// vanilla ruleset they are played on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter)]
#[repr(u8)]
pub enum GameMode {
    VanillaOsu = 0,
    VanillaTaiko = 1,
    VanillaCatch = 2,
    VanillaMania = 3,
    RelaxOsu = 4,
    RelaxTaiko = 5,
    RelaxCatch = 6,
    AutopilotOsu = 8
}

impl GameMode {
    /// The ruleset the scoring function understands.
    pub fn as_vanilla(self) -> GameMode {
        match self {
            GameMode::VanillaOsu | GameMode::RelaxOsu | GameMode::AutopilotOsu => GameMode::VanillaOsu,
            GameMode::VanillaTaiko | GameMode::RelaxTaiko => GameMode::VanillaTaiko,
            GameMode::VanillaCatch | GameMode::RelaxCatch => GameMode::VanillaCatch,
            GameMode::VanillaMania => GameMode::VanillaMania
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for GameMode {
    type Error = ();

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(GameMode::VanillaOsu),
            1 => Ok(GameMode::VanillaTaiko),
            2 => Ok(GameMode::VanillaCatch),
            3 => Ok(GameMode::VanillaMania),
            4 => Ok(GameMode::RelaxOsu),
            5 => Ok(GameMode::RelaxTaiko),
            6 => Ok(GameMode::RelaxCatch),
            8 => Ok(GameMode::AutopilotOsu),
            _ => Err(())
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GameMode::VanillaOsu => "vn!std",
            GameMode::VanillaTaiko => "vn!taiko",
            GameMode::VanillaCatch => "vn!catch",
            GameMode::VanillaMania => "vn!mania",
            GameMode::RelaxOsu => "rx!std",
            GameMode::RelaxTaiko => "rx!taiko",
            GameMode::RelaxCatch => "rx!catch",
            GameMode::AutopilotOsu => "ap!std"
        };

        write!(f, "{}", name)
    }
}
