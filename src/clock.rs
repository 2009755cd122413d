// =============================================================================
// Clock — injectable wall-clock capability
// =============================================================================
//
// The fetch window's upper bound defaults to "now"; resolving that through a
// trait instead of an ambient system-time call lets the fetch loop be driven
// deterministically in tests.
// =============================================================================

use chrono::{NaiveDateTime, Timelike, Utc};

/// Source of the current UTC time.
pub trait Clock {
    fn now_utc(&self) -> NaiveDateTime;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> NaiveDateTime {
        Utc::now().naive_utc()
    }
}

/// Clock pinned to a fixed instant. Used by tests to resolve the "now"
/// sentinel deterministically.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now_utc(&self) -> NaiveDateTime {
        self.0
    }
}

/// Truncate a timestamp to its minute boundary (seconds and sub-seconds
/// zeroed). The live end of a fetch window never extends past the last
/// whole minute.
pub fn truncate_to_minute(t: NaiveDateTime) -> NaiveDateTime {
    t.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}
