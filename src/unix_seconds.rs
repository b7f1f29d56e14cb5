//! Unix timestamp type and tagged time samples for the live clock.

use time::{OffsetDateTime, UtcOffset};

/// Seconds between the NTP epoch (1900-01-01) and the Unix epoch (1970-01-01).
pub const NTP_TO_UNIX_SECONDS: i64 = 2_208_988_800;

/// Whole seconds since 1970-01-01 00:00:00 UTC.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub struct UnixSeconds(pub i64);

impl UnixSeconds {
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }

    /// Seconds on the NTP timescale (since 1900-01-01), or `None` for an instant before
    /// 1970.
    #[must_use]
    pub const fn from_ntp_seconds(ntp: u32) -> Option<Self> {
        match (ntp as i64).checked_sub(NTP_TO_UNIX_SECONDS) {
            Some(seconds) if seconds >= 0 => Some(Self(seconds)),
            _ => None,
        }
    }

    /// The same instant as a calendar time at `offset`. `None` only for instants outside
    /// the range of the `time` crate.
    #[must_use]
    pub fn to_offset_datetime(self, offset: UtcOffset) -> Option<OffsetDateTime> {
        let utc = OffsetDateTime::from_unix_timestamp(self.0).ok()?;
        Some(utc.to_offset(offset))
    }
}

/// Build a whole-hour UTC offset, falling back to UTC when out of range.
#[must_use]
pub fn utc_offset_from_hours(hours: i8) -> UtcOffset {
    UtcOffset::from_hms(hours, 0, 0).unwrap_or(UtcOffset::UTC)
}

/// Where a [`TimeSample`] came from.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimeSource {
    Network,
    PersistentClock,
    SystemFallback,
}

impl TimeSource {
    pub(crate) const fn to_u8(self) -> u8 {
        match self {
            Self::Network => 0,
            Self::PersistentClock => 1,
            Self::SystemFallback => 2,
        }
    }

    pub(crate) const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Network,
            1 => Self::PersistentClock,
            _ => Self::SystemFallback,
        }
    }
}

/// A UTC instant together with the source that produced it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TimeSample {
    pub unix_seconds: UnixSeconds,
    pub source: TimeSource,
}

impl TimeSample {
    #[must_use]
    pub const fn new(unix_seconds: UnixSeconds, source: TimeSource) -> Self {
        Self {
            unix_seconds,
            source,
        }
    }
}
