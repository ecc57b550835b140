// Aggregate weighting
pub const PP_DECAY_BASE: f64 = 0.95;
pub const BONUS_PP_CEILING: f64 = 416.6667;
pub const BONUS_PP_BASE: f64 = 0.9994;
pub const ACC_BONUS_DIVISOR: f64 = 20.0;
// Idealized play used for a beatmap's reference maximum
pub const REFERENCE_ACCURACY: f64 = 100.0;
