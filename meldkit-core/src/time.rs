use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the unix epoch. Clamps instead of failing: a clock
/// before the epoch yields 0, which downstream code treats as "long ago".
pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}
