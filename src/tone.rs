//! Speaker tones.

#![allow(clippy::future_not_send, reason = "single-threaded")]

use embassy_time::{Duration, Instant, Timer};
use embedded_hal::digital::OutputPin;

use crate::status::StatusSink;

/// Something that can beep.
#[allow(async_fn_in_trait, reason = "single-threaded executor; futures need not be Send")]
pub trait Tone {
    /// Sound `frequency_hz` for `duration`, returning once it has finished.
    async fn play(&mut self, frequency_hz: u32, duration: Duration);
}

/// The two-note cue played while starting up.
pub const STARTUP_CUE: [(u32, Duration); 2] = [
    (523, Duration::from_secs(1)),
    (623, Duration::from_millis(200)),
];

pub async fn startup_cue(tone: &mut impl Tone, status: &mut impl StatusSink) {
    status.log("Speaker test").await;
    for (frequency_hz, duration) in STARTUP_CUE {
        tone.play(frequency_hz, duration).await;
    }
}

/// Square wave bit-banged on a GPIO driving a passive buzzer.
///
/// Timing comes from the embassy timer, so the pitch is approximate; fine for a beep.
pub struct SquareWaveTone<P> {
    pin: P,
}

impl<P: OutputPin> SquareWaveTone<P> {
    #[must_use]
    pub const fn new(pin: P) -> Self {
        Self { pin }
    }

    pub fn release(self) -> P {
        self.pin
    }
}

impl<P: OutputPin> Tone for SquareWaveTone<P> {
    async fn play(&mut self, frequency_hz: u32, duration: Duration) {
        if frequency_hz == 0 {
            Timer::after(duration).await;
            return;
        }
        let half_period = Duration::from_micros(500_000 / u64::from(frequency_hz));
        let deadline = Instant::now().checked_add(duration).unwrap_or(Instant::MAX);
        while Instant::now() < deadline {
            let _ = self.pin.set_high();
            Timer::after(half_period).await;
            let _ = self.pin.set_low();
            Timer::after(half_period).await;
        }
        let _ = self.pin.set_low();
    }
}
