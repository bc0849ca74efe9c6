//! Timestamp utilities
//!
//! Capture timestamps are UNIX epoch seconds in UTC. Frames other than
//! snapshots carry a burst index in the last digit, which is not part of the
//! capture instant.

use chrono::{DateTime, Utc};

/// Replace the trailing burst digit of an epoch timestamp with zero
pub fn burst_aligned(epoch_seconds: i64) -> i64 {
    epoch_seconds - epoch_seconds.rem_euclid(10)
}

/// Convert epoch seconds to a UTC datetime, aligned to the burst boundary
///
/// Returns `None` when the value is outside chrono's representable range.
pub fn capture_instant(epoch_seconds: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(burst_aligned(epoch_seconds), 0)
}
