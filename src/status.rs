//! Status log on the 128x64 panel: date and address banner, a rule, then the message.
//!
//! Every call redraws the whole panel. Messages are word-wrapped; text that runs past
//! the bottom scrolls the log area up instead of being cut off.

#![allow(clippy::future_not_send, reason = "single-threaded")]

use core::fmt::Write as _;
use core::str::SplitWhitespace;

use embedded_hal_async::i2c::I2c;
use heapless::String;
use time::OffsetDateTime;

use crate::clock::LiveClock;
use crate::mux::SharedBus;
use crate::network::AddressCell;
use crate::rtc::{PersistentClock, RtcDateTime};
use crate::surface::{CHAR_WIDTH, LINE_HEIGHT, Oled128x64, PixelSurface, SSD1306_ALT_ADDRESS};

/// Somewhere human-readable progress messages go.
#[allow(async_fn_in_trait, reason = "single-threaded executor; futures need not be Send")]
pub trait StatusSink {
    async fn log(&mut self, message: &str);
}

/// The status display as the control loop uses it: a log plus two snapshot screens.
#[allow(async_fn_in_trait, reason = "single-threaded executor; futures need not be Send")]
pub trait StatusPanel: StatusSink {
    /// Show the live clock time.
    async fn show_live_time(&mut self);

    /// Read `rtc` and show its time.
    async fn show_persistent_time(&mut self, rtc: &mut impl PersistentClock);
}

// ============================================================================
// Word wrap
// ============================================================================

/// Longest line [`wrap_text`] can hold. Wider panels than this do not exist here.
pub const WRAP_CAPACITY: usize = 32;

/// One wrapped line.
pub type WrappedLine = String<WRAP_CAPACITY>;

/// Break `text` into lines of at most `width` characters.
///
/// Words are never split: a word longer than `width` gets a line of its own. Runs of
/// whitespace collapse to one space and no empty lines are produced.
#[must_use]
pub fn wrap_text(text: &str, width: usize) -> WrapText<'_> {
    WrapText {
        words: text.split_whitespace(),
        pending: None,
        width,
    }
}

/// Iterator returned by [`wrap_text`].
pub struct WrapText<'a> {
    words: SplitWhitespace<'a>,
    pending: Option<&'a str>,
    width: usize,
}

impl Iterator for WrapText<'_> {
    type Item = WrappedLine;

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.pending.take().or_else(|| self.words.next())?;
        let mut line = WrappedLine::new();
        push_clipped(&mut line, first);
        let mut len = first.chars().count();

        for word in self.words.by_ref() {
            let candidate = len.saturating_add(1).saturating_add(word.chars().count());
            if candidate > self.width {
                self.pending = Some(word);
                break;
            }
            push_clipped(&mut line, " ");
            push_clipped(&mut line, word);
            len = candidate;
        }
        Some(line)
    }
}

// Characters past the capacity would be off the panel anyway.
fn push_clipped(line: &mut WrappedLine, text: &str) {
    for ch in text.chars() {
        if line.push(ch).is_err() {
            break;
        }
    }
}

// ============================================================================
// Status log
// ============================================================================

const DATE_Y: i32 = 0;
const ADDRESS_Y: i32 = 10;
const RULE_Y: usize = 21;
const LOG_TOP: usize = 24;
const LOG_BOTTOM: usize = 54;

/// Date/time as `YYYY-MM-DD HH:MM:SS`.
pub type Timestamp = String<20>;

#[must_use]
pub fn format_timestamp(value: &RtcDateTime) -> Timestamp {
    let mut text = Timestamp::new();
    let _ = write!(
        text,
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        value.year, value.month, value.day, value.hour, value.minute, value.second
    );
    text
}

/// Date as `DD/MM/YYYY`.
#[must_use]
pub fn format_date(value: &OffsetDateTime) -> String<10> {
    let mut text = String::new();
    let _ = write!(
        text,
        "{:02}/{:02}/{:04}",
        value.day(),
        u8::from(value.month()),
        value.year()
    );
    text
}

/// The status panel. It sits on the shared bus upstream of the multiplexer at its own
/// address, so presenting needs the bus lock but no channel select.
pub struct StatusLog<'a, I2C> {
    bus: &'a SharedBus<I2C>,
    clock: &'a LiveClock,
    address: &'a AddressCell,
    display: Oled128x64,
}

impl<'a, I2C: I2c> StatusLog<'a, I2C> {
    #[must_use]
    pub const fn new(bus: &'a SharedBus<I2C>, clock: &'a LiveClock, address: &'a AddressCell) -> Self {
        Self {
            bus,
            clock,
            address,
            display: Oled128x64::new(SSD1306_ALT_ADDRESS),
        }
    }

    /// Power up the panel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::I2c`](crate::Error::I2c) if the panel does not answer.
    pub async fn init(&mut self) -> crate::Result<()> {
        let mut mux = self.bus.lock().await;
        self.display.init(mux.i2c()).await
    }

    /// The frame buffer as last drawn.
    #[must_use]
    pub const fn display(&self) -> &Oled128x64 {
        &self.display
    }

    /// Characters per wrapped line.
    #[must_use]
    pub fn columns(&self) -> usize {
        self.display.width() / CHAR_WIDTH
    }

    fn draw_header(&mut self) {
        self.display.fill_rect(0, 0, self.display.width(), LOG_TOP, false);

        let date = format_date(&self.clock.now());
        let date_width = date.len().saturating_mul(CHAR_WIDTH);
        let date_x = self.display.width().saturating_sub(date_width) / 2;
        self.display
            .draw_text(&date, i32::try_from(date_x).unwrap_or(0), DATE_Y);

        if let Some(address) = self.address.get() {
            self.display.draw_text(&address, 0, ADDRESS_Y);
        }
        let width = self.display.width();
        self.display.hline(0, RULE_Y, width, true);
    }

    #[expect(clippy::cast_possible_wrap, reason = "panel coordinates are small")]
    fn draw_message(&mut self, message: &str) {
        let mut y = LOG_TOP;
        for line in wrap_text(message, self.columns()) {
            if y > LOG_BOTTOM {
                self.display.scroll(0, -(LINE_HEIGHT as i32));
                self.draw_header();
                y = LOG_BOTTOM;
            }
            self.display.draw_text(&line, 0, y as i32);
            y = y.saturating_add(LINE_HEIGHT);
        }
    }

    async fn present(&mut self) {
        let result = {
            let mut mux = self.bus.lock().await;
            self.display.present(mux.i2c()).await
        };
        if result.is_err() {
            warn!("status display present failed");
        }
    }
}

impl<I2C: I2c> StatusSink for StatusLog<'_, I2C> {
    async fn log(&mut self, message: &str) {
        self.display.fill(false);
        self.draw_header();
        self.draw_message(message);
        self.present().await;
        info!("Logged to big screen: {}", message);
    }
}

impl<I2C: I2c> StatusPanel for StatusLog<'_, I2C> {
    /// Show the live clock as `YYYY-MM-DD HH:MM:SS`.
    async fn show_live_time(&mut self) {
        let now = RtcDateTime::from_offset_datetime(&self.clock.now());
        let text = format_timestamp(&now);
        self.display.fill(false);
        self.display.draw_text(&text, 0, 0);
        self.present().await;
        info!("Displayed system time: {}", text.as_str());
    }

    /// Read the persistent clock and show it under a title line.
    async fn show_persistent_time(&mut self, rtc: &mut impl PersistentClock) {
        match rtc.read().await {
            Ok(value) => {
                let text = format_timestamp(&value);
                self.display.fill(false);
                self.display.draw_text("RTC Time:", 0, 0);
                self.display.draw_text(&text, 0, 10);
                self.present().await;
                info!("Displayed RTC time: {}", text.as_str());
            }
            Err(err) => {
                let mut message: String<64> = String::new();
                let _ = write!(message, "Failed to read RTC: {err}");
                self.log(&message).await;
            }
        }
    }
}

/// Sinks for host tests.
#[cfg(any(test, feature = "host"))]
pub mod testing {
    use heapless::{String, Vec};

    use super::StatusSink;

    /// Keeps every message, up to 64 of them.
    #[derive(Default, Debug)]
    pub struct RecordingStatus {
        pub lines: Vec<String<96>, 64>,
    }

    impl RecordingStatus {
        #[must_use]
        pub fn contains(&self, message: &str) -> bool {
            self.lines.iter().any(|line| line.as_str() == message)
        }
    }

    impl StatusSink for RecordingStatus {
        async fn log(&mut self, message: &str) {
            let mut line = String::new();
            for ch in message.chars() {
                if line.push(ch).is_err() {
                    break;
                }
            }
            let _ = self.lines.push(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mux::Tca9548a;
    use crate::unix_seconds::{TimeSample, TimeSource, UnixSeconds};
    use embassy_sync::mutex::Mutex;
    use embedded_hal_mock::eh1::i2c::Mock;
    use time::UtcOffset;

    #[test]
    fn wraps_at_sixteen_without_splitting_words() {
        let text = "Failed to get NTP time after 5 attempts.";
        let lines: Vec<_> = wrap_text(text, 16).collect();

        assert_eq!(lines, ["Failed to get", "NTP time after 5", "attempts."]);
        assert!(lines.iter().all(|line| line.len() <= 16));
        let rejoined: Vec<&str> = lines.iter().map(|line| line.as_str()).collect();
        assert_eq!(rejoined.join(" "), text);
    }

    #[test]
    fn long_word_gets_its_own_line_and_no_blank_lines() {
        let lines: Vec<_> = wrap_text("ok  supercalifragilistic  ok", 8).collect();
        assert_eq!(lines, ["ok", "supercalifragilistic", "ok"]);
        assert_eq!(wrap_text("   ", 8).count(), 0);
        assert_eq!(wrap_text("exactlysixteen!!", 16).collect::<Vec<_>>(), ["exactlysixteen!!"]);
    }

    #[test]
    fn timestamp_and_date_formats() {
        let value = RtcDateTime {
            year: 2024,
            month: 3,
            day: 9,
            weekday: 6,
            hour: 7,
            minute: 5,
            second: 0,
        };
        assert_eq!(format_timestamp(&value), "2024-03-09 07:05:00");

        let date = UnixSeconds(1_710_027_000)
            .to_offset_datetime(UtcOffset::UTC)
            .unwrap();
        assert_eq!(format_date(&date), "09/03/2024");
    }

    fn lit_rows(display: &Oled128x64, rows: core::ops::Range<usize>) -> usize {
        rows.filter(|&y| (0..128).any(|x| display.pixel(x, y))).count()
    }

    #[test]
    fn log_draws_banner_rule_and_scrolls_long_messages() {
        // Only the frame buffer is exercised; nothing is presented, so the bus mock
        // expects no traffic.
        let bus = Mutex::new(Tca9548a::new(Mock::new(&[])));
        let clock = LiveClock::new();
        clock.set(
            TimeSample::new(UnixSeconds(1_710_027_000), TimeSource::Network),
            UtcOffset::UTC,
        );
        let address = AddressCell::new();
        address.set("192.168.1.20");
        let mut status = StatusLog::new(&bus, &clock, &address);
        let message = "Connected to WiFi 192.168.100.123 and waiting for the NTP server to \
                       answer the first request";
        assert_eq!(wrap_text(message, status.columns()).count(), 5);

        status.display.fill(false);
        status.draw_header();
        status.draw_message(message);

        let display = status.display();
        assert!((0..128).all(|x| display.pixel(x, RULE_Y)));
        assert!(lit_rows(display, 0..10) > 0, "date row");
        assert!(lit_rows(display, 10..20) > 0, "address row");
        assert_eq!(lit_rows(display, 22..24), 0, "gap under the rule");
        // Four slots below the rule, all in use after the scroll.
        for top in [24, 34, 44, 54] {
            assert!(lit_rows(display, top..top + LINE_HEIGHT) > 0, "slot at {top}");
        }

        bus.into_inner().release().done();
    }
}
