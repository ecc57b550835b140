use indexmap::IndexMap;
use std::fmt;
use tracing::{info, warn};

use crate::model::structures::game_mode::GameMode;

/// Terminal state of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemOutcome {
    Done,
    /// Nothing to do, or the beatmap could not be obtained
    Skipped,
    Failed
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseSummary {
    pub done: usize,
    pub skipped: usize,
    pub failed: usize
}

impl PhaseSummary {
    pub fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Done => self.done += 1,
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Failed => self.failed += 1
        }
    }

    pub fn merge(&mut self, other: &PhaseSummary) {
        self.done += other.done;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }

    pub fn total(&self) -> usize {
        self.done + self.skipped + self.failed
    }
}

impl FromIterator<ItemOutcome> for PhaseSummary {
    fn from_iter<I: IntoIterator<Item = ItemOutcome>>(iter: I) -> Self {
        let mut summary = PhaseSummary::default();
        for outcome in iter {
            summary.record(outcome);
        }
        summary
    }
}

impl fmt::Display for PhaseSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} done, {} skipped, {} failed",
            self.done, self.skipped, self.failed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    MapsPp,
    Scores,
    Stats
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::MapsPp => "map pp100",
            Phase::Scores => "scores",
            Phase::Stats => "user stats"
        };

        write!(f, "{}", name)
    }
}

/// Per-phase results of a run, in the order the phases ran.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    phases: IndexMap<(Phase, Option<GameMode>), PhaseSummary>,
    pub cancelled: bool
}

impl RunSummary {
    pub fn record(&mut self, phase: Phase, mode: Option<GameMode>, summary: PhaseSummary) {
        self.phases.entry((phase, mode)).or_default().merge(&summary);
    }

    pub fn get(&self, phase: Phase, mode: Option<GameMode>) -> Option<&PhaseSummary> {
        self.phases.get(&(phase, mode))
    }

    pub fn phases(&self) -> impl Iterator<Item = (&(Phase, Option<GameMode>), &PhaseSummary)> {
        self.phases.iter()
    }

    pub fn ran(&self, phase: Phase) -> bool {
        self.phases.keys().any(|(p, _)| *p == phase)
    }

    pub fn totals(&self) -> PhaseSummary {
        let mut totals = PhaseSummary::default();
        for summary in self.phases.values() {
            totals.merge(summary);
        }
        totals
    }

    pub fn log(&self) {
        for ((phase, mode), summary) in &self.phases {
            match mode {
                Some(mode) => info!("{} ({}): {}", phase, mode, summary),
                None => info!("{}: {}", phase, summary)
            }
        }

        if self.cancelled {
            warn!("Run was interrupted; remaining items are left for the next run");
        }

        info!("Total: {}", self.totals());
    }
}
