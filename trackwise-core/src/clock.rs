//! Time source for audit timestamps.

use chrono::{Duration, SubsecRound, Utc};

use crate::Timestamp;

/// Source of "now" for audit fields.
///
/// Implementations must return values at microsecond precision so that a
/// timestamp read back from PostgreSQL compares equal to the one written.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        truncate_to_micros(Utc::now())
    }
}

/// Drop sub-microsecond precision.
pub fn truncate_to_micros(ts: Timestamp) -> Timestamp {
    ts.trunc_subsecs(6)
}

/// Timestamp for a modification that follows `previous`.
///
/// Always strictly greater than `previous`, even when the clock has not
/// advanced or has stepped backwards.
pub fn next_modification(clock: &dyn Clock, previous: Timestamp) -> Timestamp {
    let now = clock.now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct Frozen(Timestamp);

    impl Clock for Frozen {
        fn now(&self) -> Timestamp {
            self.0
        }
    }

    #[test]
    fn test_truncate_to_micros_drops_nanos() {
        let ts = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let truncated = truncate_to_micros(ts);
        assert_eq!(truncated.timestamp_subsec_nanos(), 123_456_000);
    }

    #[test]
    fn test_next_modification_uses_clock_when_ahead() {
        let previous = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let clock = Frozen(previous + Duration::seconds(5));
        assert_eq!(next_modification(&clock, previous), clock.0);
    }

    #[test]
    fn test_next_modification_strictly_increases_when_clock_stalls() {
        let previous = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let clock = Frozen(previous);
        let next = next_modification(&clock, previous);
        assert!(next > previous);
        assert_eq!(next - previous, Duration::microseconds(1));
    }

    #[test]
    fn test_next_modification_survives_clock_going_backwards() {
        let previous = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let clock = Frozen(previous - Duration::minutes(3));
        assert!(next_modification(&clock, previous) > previous);
    }
}
