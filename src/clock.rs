//! The process-wide live clock, shared by the render and control contexts.
//!
//! The clock stores the last accepted sample together with the [`Instant`] it arrived,
//! and derives "now" from the time elapsed since then. Reading it is lock-free and never
//! blocks the render loop.

use embassy_time::Instant;
use portable_atomic::{AtomicBool, AtomicI32, AtomicI64, AtomicU8, AtomicU64, Ordering};
use time::{OffsetDateTime, UtcOffset};

use crate::unix_seconds::{TimeSample, TimeSource, UnixSeconds};

// ============================================================================
// Constants
// ============================================================================

const SECONDS_PER_MINUTE: i32 = 60;

// ============================================================================
// LiveClock
// ============================================================================

/// Wall-clock time derived from the last accepted [`TimeSample`].
///
/// Writers are the startup sequence and the time synchronizer; every other party only
/// reads. The fields are independent atomics, so a reader racing a `set` may see the new
/// sample with the old source for one poll, which is harmless here.
///
/// Seconds roll over a whole number of seconds after the sample was taken, not on
/// uptime boundaries.
pub struct LiveClock {
    sample_unix_seconds: AtomicI64,
    // `Instant` ticks when the sample was accepted
    set_at_ticks: AtomicU64,
    offset_minutes: AtomicI32,
    source: AtomicU8,
    is_set: AtomicBool,
}

impl Default for LiveClock {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveClock {
    /// An unset clock. Until [`set`](Self::set) is called, [`now`](Self::now) reads
    /// as midnight, 1970-01-01 UTC.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sample_unix_seconds: AtomicI64::new(0),
            set_at_ticks: AtomicU64::new(0),
            offset_minutes: AtomicI32::new(0),
            source: AtomicU8::new(TimeSource::SystemFallback.to_u8()),
            is_set: AtomicBool::new(false),
        }
    }

    /// Accept `sample` as the current UTC time and display it with `offset`.
    pub fn set(&self, sample: TimeSample, offset: UtcOffset) {
        self.sample_unix_seconds
            .store(sample.unix_seconds.as_i64(), Ordering::Relaxed);
        self.set_at_ticks
            .store(Instant::now().as_ticks(), Ordering::Relaxed);
        self.offset_minutes.store(
            i32::from(offset.whole_minutes()),
            Ordering::Relaxed,
        );
        self.source.store(sample.source.to_u8(), Ordering::Relaxed);
        self.is_set.store(true, Ordering::Release);
        info!(
            "Live clock set to {} (source {})",
            sample.unix_seconds.as_i64(),
            sample.source.to_u8()
        );
    }

    /// Whether any sample has been accepted yet.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.is_set.load(Ordering::Acquire)
    }

    /// Current UTC time as Unix seconds.
    #[must_use]
    pub fn unix_now(&self) -> UnixSeconds {
        if !self.is_set() {
            return UnixSeconds(0);
        }
        let set_at = Instant::from_ticks(self.set_at_ticks.load(Ordering::Relaxed));
        let elapsed = i64::try_from(Instant::now().saturating_duration_since(set_at).as_secs())
            .unwrap_or(i64::MAX);
        UnixSeconds(
            self.sample_unix_seconds
                .load(Ordering::Relaxed)
                .saturating_add(elapsed),
        )
    }

    /// Current local time, with second resolution.
    #[must_use]
    pub fn now(&self) -> OffsetDateTime {
        self.unix_now()
            .to_offset_datetime(self.offset())
            .unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }

    /// The offset applied by [`now`](Self::now).
    #[must_use]
    pub fn offset(&self) -> UtcOffset {
        let minutes = self.offset_minutes.load(Ordering::Relaxed);
        UtcOffset::from_whole_seconds(minutes.saturating_mul(SECONDS_PER_MINUTE))
            .unwrap_or(UtcOffset::UTC)
    }

    /// Where the current time came from.
    #[must_use]
    pub fn source(&self) -> TimeSource {
        TimeSource::from_u8(self.source.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unix_seconds::utc_offset_from_hours;
    use embassy_futures::block_on;
    use embassy_time::Timer;

    #[test]
    fn unset_clock_reads_epoch() {
        let clock = LiveClock::new();
        assert!(!clock.is_set());
        assert_eq!(clock.now(), OffsetDateTime::UNIX_EPOCH);
        assert_eq!(clock.source(), TimeSource::SystemFallback);
    }

    #[test]
    fn set_applies_offset_and_source() {
        let clock = LiveClock::new();
        // 2024-03-09 23:30:00 UTC
        let sample = TimeSample::new(UnixSeconds(1_710_027_000), TimeSource::Network);

        clock.set(sample, utc_offset_from_hours(2));

        let now = clock.now();
        assert_eq!(clock.source(), TimeSource::Network);
        assert_eq!(clock.offset().whole_hours(), 2);
        assert_eq!((now.year(), u8::from(now.month()), now.day()), (2024, 3, 10));
        assert_eq!(now.hour(), 1);
        assert_eq!(clock.unix_now(), UnixSeconds(1_710_027_000));
    }

    #[test]
    fn seconds_count_from_the_sample_not_from_boot() {
        // Set the clock late in an uptime second; a quarter second later it must not
        // have ticked yet.
        while Instant::now().as_micros() % 1_000_000 < 850_000 {
            block_on(Timer::after_millis(5));
        }
        let clock = LiveClock::new();
        let sample = TimeSample::new(UnixSeconds(1_710_027_000), TimeSource::Network);
        clock.set(sample, UtcOffset::UTC);

        block_on(Timer::after_millis(250));
        assert_eq!(clock.unix_now(), UnixSeconds(1_710_027_000));

        block_on(Timer::after_millis(800));
        assert_eq!(clock.unix_now(), UnixSeconds(1_710_027_001));
    }
}
