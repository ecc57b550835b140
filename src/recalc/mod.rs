pub mod cache;
pub mod config;
pub mod error;
pub mod fetch_gate;
pub mod rate_limiter;
pub mod recalculator;
pub mod summary;

pub use config::{RecalcConfig, RunPlan};
pub use error::RecalcError;
pub use recalculator::Recalculator;
pub use summary::{ItemOutcome, Phase, PhaseSummary, RunSummary};
