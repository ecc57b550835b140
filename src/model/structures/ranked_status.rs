#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum RankedStatus {
    NotSubmitted = -1,
    Pending = 0,
    UpdateAvailable = 1,
    Ranked = 2,
    Approved = 3,
    Qualified = 4,
    Loved = 5
}

impl RankedStatus {
    /// Statuses whose scores count towards a player's aggregate
    pub const ACCEPTED: [RankedStatus; 2] = [RankedStatus::Ranked, RankedStatus::Approved];
}

/// Submission state of a score row. Only a player's best score on a
/// beatmap (per mode) is recalculated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ScoreStatus {
    Failed = 0,
    Submitted = 1,
    Best = 2
}
