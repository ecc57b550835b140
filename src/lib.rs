pub mod args;
pub mod beatmaps;
pub mod calc;
pub mod database;
pub mod model;
pub mod ranking;
pub mod recalc;
pub mod utils;
