//! Network time synchronization with bounded retries.
//!
//! [`TimeSync::synchronize`] asks the network for UTC, applies the configured hour offset,
//! sets the [`LiveClock`] and writes the local time to the persistent clock. Failures are
//! retried a fixed number of times and then reported; they never abort the caller.
//!
//! ```text
//! Idle -> Requesting(n) -> success ----------------------------> Success(n)
//!                       \-> failure -> Retry(n) -> (n < max) -> Requesting(n + 1)
//!                                                \-> (n = max) -> Exhausted
//! ```
//!
//! `Success` and `Exhausted` are resting states; the next call starts over at
//! `Requesting(1)`.

#![allow(clippy::future_not_send, reason = "single-threaded")]

use core::fmt::Write as _;

use embassy_time::{Duration, Timer, with_timeout};
use heapless::String;
use time::{OffsetDateTime, UtcOffset};

use crate::clock::LiveClock;
use crate::ntp::NetworkTime;
use crate::rtc::{PersistentClock, RtcDateTime};
use crate::status::StatusSink;
use crate::unix_seconds::{TimeSample, TimeSource, UnixSeconds, utc_offset_from_hours};
use crate::{Error, Result};

// ============================================================================
// Configuration
// ============================================================================

/// NTP server used when none is configured at build time.
pub const DEFAULT_NTP_HOST: &str = "pool.ntp.org";

/// Knobs for [`TimeSync::synchronize`].
#[derive(Clone, Copy, Debug)]
pub struct SyncConfig {
    pub host: &'static str,
    pub max_attempts: u8,
    /// Sleep after every failed attempt, the last one included.
    pub retry_delay: Duration,
    /// Upper bound on one request, DNS lookup included.
    pub request_timeout: Duration,
    pub utc_offset_hours: i8,
}

impl SyncConfig {
    /// Five attempts, five seconds apart, one second per request.
    #[must_use]
    pub const fn new(host: &'static str, utc_offset_hours: i8) -> Self {
        Self {
            host,
            max_attempts: 5,
            retry_delay: Duration::from_secs(5),
            request_timeout: Duration::from_secs(1),
            utc_offset_hours,
        }
    }

    #[must_use]
    pub fn utc_offset(&self) -> UtcOffset {
        utc_offset_from_hours(self.utc_offset_hours)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new(DEFAULT_NTP_HOST, 0)
    }
}

// ============================================================================
// State machine
// ============================================================================

/// Where the synchronizer is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyncState {
    Idle,
    Requesting { attempt: u8 },
    Retry { attempt: u8 },
    Success { attempt: u8 },
    Exhausted { attempts: u8 },
}

/// How a call to [`TimeSync::synchronize`] ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    Synchronized { attempt: u8, sample: TimeSample },
    Exhausted { attempts: u8 },
}

/// Owns the network time client and the persistent clock; writes the shared live clock.
pub struct TimeSync<'a, N, P> {
    network: N,
    rtc: P,
    clock: &'a LiveClock,
    config: SyncConfig,
    state: SyncState,
}

impl<'a, N: NetworkTime, P: PersistentClock> TimeSync<'a, N, P> {
    #[must_use]
    pub const fn new(network: N, rtc: P, clock: &'a LiveClock, config: SyncConfig) -> Self {
        Self {
            network,
            rtc,
            clock,
            config,
            state: SyncState::Idle,
        }
    }

    #[must_use]
    pub const fn state(&self) -> SyncState {
        self.state
    }

    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The persistent clock, for snapshots and the startup read.
    pub const fn rtc(&mut self) -> &mut P {
        &mut self.rtc
    }

    pub const fn network(&mut self) -> &mut N {
        &mut self.network
    }

    /// Run one full synchronization, always starting again from attempt 1.
    ///
    /// Every failed attempt is reported to `status` and followed by the retry delay.
    /// Running out of attempts leaves the live clock on whatever source it had.
    pub async fn synchronize(&mut self, status: &mut impl StatusSink) -> SyncOutcome {
        let max_attempts = self.config.max_attempts;
        for attempt in 1..=max_attempts {
            self.transition(SyncState::Requesting { attempt });
            match self.request_sample().await {
                Ok((sample, local)) => {
                    self.accept(sample, &local, attempt, status).await;
                    self.transition(SyncState::Success { attempt });
                    return SyncOutcome::Synchronized { attempt, sample };
                }
                Err(err) => {
                    let mut message: String<96> = String::new();
                    let _ = write!(message, "Failed to get NTP time on attempt: {attempt} {err}");
                    status.log(&message).await;
                    self.transition(SyncState::Retry { attempt });
                    Timer::after(self.config.retry_delay).await;
                }
            }
        }

        self.transition(SyncState::Exhausted {
            attempts: max_attempts,
        });
        let mut message: String<64> = String::new();
        let _ = write!(message, "Failed to get NTP time after {max_attempts} attempts.");
        status.log(&message).await;
        SyncOutcome::Exhausted {
            attempts: max_attempts,
        }
    }

    async fn request_sample(&mut self) -> Result<(TimeSample, OffsetDateTime)> {
        let ntp_seconds = with_timeout(
            self.config.request_timeout,
            self.network.request_utc(self.config.host),
        )
        .await
        .map_err(|_| Error::NtpTimeout)??;
        let unix_seconds =
            UnixSeconds::from_ntp_seconds(ntp_seconds).ok_or(Error::InvalidTimestamp)?;
        let local = unix_seconds
            .to_offset_datetime(self.config.utc_offset())
            .ok_or(Error::InvalidTimestamp)?;
        Ok((TimeSample::new(unix_seconds, TimeSource::Network), local))
    }

    async fn accept(
        &mut self,
        sample: TimeSample,
        local: &OffsetDateTime,
        attempt: u8,
        status: &mut impl StatusSink,
    ) {
        self.clock.set(sample, self.config.utc_offset());

        let mut message: String<64> = String::new();
        let _ = write!(
            message,
            "NTP time set successfully at attempt: {attempt} at {:02}:{:02}:{:02}.",
            local.hour(),
            local.minute(),
            local.second()
        );
        status.log(&message).await;

        // The live clock is already right; a missing RTC only costs the next cold start.
        if let Err(err) = self.rtc.write(&RtcDateTime::from_offset_datetime(local)).await {
            let mut message: String<64> = String::new();
            let _ = write!(message, "Failed to update RTC: {err}");
            status.log(&message).await;
        }
    }

    fn transition(&mut self, next: SyncState) {
        debug!("time sync: {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}
