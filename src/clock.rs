//! Internal clock (§3 `InternalClock`, §6 Time source interface).
//!
//! All `tmst` comparisons must use modular (wrap-around) arithmetic per the
//! source's own design note — never a signed comparison of two `u32`s.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

/// Gateway-local time source: a free-running microsecond counter for
/// scheduling, and a wall-clock reading for the `rxpk.time` ISO-8601 field.
///
/// The two are intentionally distinct (§9 open question 3): `now_tmst`
/// drives scheduling and must never jump or stall; `utc_now` is informational.
pub trait TimeSource: Send + Sync {
    /// Monotonic microsecond counter, wraps at `u32::MAX`.
    fn now_tmst(&self) -> u32;

    /// Wall-clock reading as (seconds since UNIX_EPOCH, subsecond micros).
    fn utc_now(&self) -> (u64, u32);
}

/// Returns `true` once `delta = (now - anchor) mod 2^32` has reached `delay`.
///
/// This is the single piece of wrap-around arithmetic the scheduler (§4.6)
/// and its tests lean on; expressed once so nobody is tempted to write a
/// signed comparison at a call site.
pub fn due(now: u32, anchor: u32, delay: u32) -> bool {
    now.wrapping_sub(anchor) >= delay
}

/// Signed distance `target - now` in clock ticks, resolving the wrap-around
/// ambiguity by treating the modular difference as a two's-complement `i32`
/// (valid as long as the true distance is under half the `u32` range, which
/// holds for any tolerance/horizon this crate configures). Positive means
/// `target` is ahead of `now`; negative means it has already passed.
pub fn signed_delta(target: u32, now: u32) -> i32 {
    target.wrapping_sub(now) as i32
}

/// `TimeSource` backed by the host OS clock, for use under the `tokio` runtime.
pub struct SystemTimeSource {
    epoch: Instant,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemTimeSource {
    fn now_tmst(&self) -> u32 {
        self.epoch.elapsed().as_micros() as u32
    }

    fn utc_now(&self) -> (u64, u32) {
        let d = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        (d.as_secs(), d.subsec_micros())
    }
}

/// Format a Unix timestamp as an ISO-8601 UTC string for the advisory
/// `stat.time` / `rxpk.time` fields. Not used for scheduling (§9 design
/// note 3 keeps wall clock and `tmst` independent).
pub fn format_unix_time(secs: u64) -> String {
    let dt: DateTime<Utc> = DateTime::from_timestamp(secs as i64, 0).unwrap_or_default();
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Software test doubles, also used by integration tests outside this crate.
pub mod testing {
    use super::TimeSource;
    use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

    /// A fully controllable clock for scheduler boundary tests (§8).
    pub struct SimTimeSource {
        tmst: AtomicU32,
        utc_secs: AtomicU64,
    }

    impl SimTimeSource {
        pub fn new(start_tmst: u32) -> Self {
            Self {
                tmst: AtomicU32::new(start_tmst),
                utc_secs: AtomicU64::new(0),
            }
        }

        pub fn set_tmst(&self, value: u32) {
            self.tmst.store(value, Ordering::SeqCst);
        }

        pub fn advance_tmst(&self, delta: u32) {
            self.tmst.fetch_add(delta, Ordering::SeqCst);
        }
    }

    impl TimeSource for SimTimeSource {
        fn now_tmst(&self) -> u32 {
            self.tmst.load(Ordering::SeqCst)
        }

        fn utc_now(&self) -> (u64, u32) {
            (self.utc_secs.load(Ordering::SeqCst), 0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_simple() {
        assert!(due(100, 0, 100));
        assert!(due(150, 0, 100));
        assert!(!due(99, 0, 100));
    }

    #[test]
    fn due_wraps_around_u32_max() {
        // enqueued near the top of the range, target small: delta = 512.
        let anchor = 0xFFFF_FF00u32;
        let now = 0x0000_0200u32;
        assert_eq!(now.wrapping_sub(anchor), 512);
        assert!(due(now, anchor, 512));
        assert!(!due(now, anchor, 513));
    }

    #[test]
    fn signed_delta_reports_direction_across_the_wrap() {
        assert_eq!(signed_delta(100, 0), 100);
        assert_eq!(signed_delta(0, 100), -100);
        assert_eq!(signed_delta(5, u32::MAX - 4), 10);
    }

    #[test]
    fn due_never_uses_signed_comparison() {
        // now < anchor numerically, but the *wrapped* delta is small and due.
        assert!(due(5, u32::MAX - 4, 10));
    }

    #[test]
    fn unix_time_formats_midnight_epoch() {
        assert_eq!(format_unix_time(0), "1970-01-01T00:00:00Z");
    }

    #[test]
    fn unix_time_advances_with_seconds() {
        assert_eq!(format_unix_time(3725), "1970-01-01T01:02:05Z");
    }

    #[test]
    fn unix_time_rolls_over_month_and_year_boundaries() {
        // 31 days after the epoch: January has 31 days, so this lands on Feb 1st.
        assert_eq!(format_unix_time(31 * 86_400), "1970-02-01T00:00:00Z");
        // 365 days after the epoch: 1970 isn't a leap year, so this lands a year later.
        assert_eq!(format_unix_time(365 * 86_400), "1971-01-01T00:00:00Z");
    }
}
