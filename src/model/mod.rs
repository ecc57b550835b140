pub mod constants;
pub mod stats;
pub mod structures;
