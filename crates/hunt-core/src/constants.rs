/// Mean Earth radius in meters (IUGG), used for great-circle distance.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Coordinates closer than this (degrees, both axes) are treated as the same point.
/// Roughly 10 m at the equator.
pub const SAME_POINT_TOLERANCE_DEG: f64 = 0.0001;

/// Upper bound on a treasure's discovery radius (meters, inclusive).
pub const MAX_DISCOVERY_RADIUS_M: f64 = 500.0;

/// Horizontal accuracy above which a fix counts as a weak GPS signal (meters).
pub const WEAK_SIGNAL_ACCURACY_M: f64 = 50.0;

/// Accuracy assumed for a fix that does not report one (meters).
pub const DEFAULT_FIX_ACCURACY_M: f64 = 5.0;

/// Distance bands for feedback intensity (meters, lower bound inclusive).
pub const VERY_STRONG_BELOW_M: f64 = 10.0;
pub const STRONG_BELOW_M: f64 = 50.0;
pub const MEDIUM_BELOW_M: f64 = 100.0;

/// Automatic recovery attempts allowed per error kind before giving up.
pub const MAX_RECOVERY_ATTEMPTS: u32 = 3;

/// Error history ring capacity. Oldest records are evicted first.
pub const ERROR_HISTORY_CAPACITY: usize = 100;
