//! Battery-backed persistent clock (DS3231) holding local time.

use embedded_hal_async::i2c::I2c;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::mux::SharedBus;
use crate::unix_seconds::UnixSeconds;
use crate::{Error, Result};

/// DS3231 I2C address.
pub const DS3231_ADDRESS: u8 = 0x68;
const REG_SECONDS: u8 = 0x00;
const CENTURY_BIT: u8 = 0x80;
const HOUR_12_BIT: u8 = 0x40;

/// The 7-tuple a persistent clock stores. `weekday` runs `1..=7` with Monday as 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RtcDateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub weekday: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl RtcDateTime {
    /// Capture the wall-clock fields of `local`.
    #[must_use]
    #[expect(clippy::cast_sign_loss, reason = "years handled here are positive")]
    pub fn from_offset_datetime(local: &OffsetDateTime) -> Self {
        Self {
            year: local.year().clamp(0, i32::from(u16::MAX)) as u16,
            month: u8::from(local.month()),
            day: local.day(),
            weekday: local.weekday().number_from_monday(),
            hour: local.hour(),
            minute: local.minute(),
            second: local.second(),
        }
    }

    /// # Errors
    ///
    /// Returns [`Error::RtcInvalid`] if the fields do not form a real date and time.
    pub fn to_primitive(&self) -> Result<PrimitiveDateTime> {
        let month = Month::try_from(self.month).map_err(|_| Error::RtcInvalid)?;
        let date = Date::from_calendar_date(i32::from(self.year), month, self.day)
            .map_err(|_| Error::RtcInvalid)?;
        let time =
            Time::from_hms(self.hour, self.minute, self.second).map_err(|_| Error::RtcInvalid)?;
        Ok(PrimitiveDateTime::new(date, time))
    }

    /// Interpret the stored local time at `offset` and return the UTC instant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RtcInvalid`] if the fields do not form a real date and time.
    pub fn to_unix_seconds(&self, offset: UtcOffset) -> Result<UnixSeconds> {
        Ok(UnixSeconds(
            self.to_primitive()?.assume_offset(offset).unix_timestamp(),
        ))
    }

    /// Encode as the DS3231 time registers `0x00..=0x06` (BCD, 24-hour).
    ///
    /// # Errors
    ///
    /// Returns [`Error::RtcInvalid`] for years outside `2000..=2199`.
    #[expect(clippy::cast_possible_truncation, reason = "range checked above")]
    pub fn to_registers(&self) -> Result<[u8; 7]> {
        if !(2000..=2199).contains(&self.year) {
            return Err(Error::RtcInvalid);
        }
        let century = self.year >= 2100;
        let year_in_century = (self.year % 100) as u8;
        Ok([
            to_bcd(self.second),
            to_bcd(self.minute),
            to_bcd(self.hour),
            self.weekday,
            to_bcd(self.day),
            to_bcd(self.month) | if century { CENTURY_BIT } else { 0 },
            to_bcd(year_in_century),
        ])
    }

    /// Decode the DS3231 time registers, accepting either 12- or 24-hour mode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RtcInvalid`] if the registers do not hold a real date and time.
    #[expect(clippy::arithmetic_side_effects, reason = "BCD fields are bounded")]
    pub fn from_registers(registers: [u8; 7]) -> Result<Self> {
        let [seconds, minutes, hours, weekday, day, month, year] = registers;
        let hour = if hours & HOUR_12_BIT != 0 {
            let pm = hours & 0x20 != 0;
            let hour12 = from_bcd(hours & 0x1F) % 12;
            if pm { hour12 + 12 } else { hour12 }
        } else {
            from_bcd(hours & 0x3F)
        };
        let century = if month & CENTURY_BIT != 0 { 2100 } else { 2000 };
        let decoded = Self {
            year: century + u16::from(from_bcd(year)),
            month: from_bcd(month & 0x1F),
            day: from_bcd(day & 0x3F),
            weekday: weekday & 0x07,
            hour,
            minute: from_bcd(minutes & 0x7F),
            second: from_bcd(seconds & 0x7F),
        };
        decoded.to_primitive()?;
        Ok(decoded)
    }
}

#[expect(clippy::arithmetic_side_effects, reason = "value < 100")]
const fn to_bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

#[expect(clippy::arithmetic_side_effects, reason = "nibbles are < 16")]
const fn from_bcd(bcd: u8) -> u8 {
    (bcd >> 4) * 10 + (bcd & 0x0F)
}

/// A clock that survives power loss.
#[allow(async_fn_in_trait, reason = "single-threaded executor; futures need not be Send")]
pub trait PersistentClock {
    /// # Errors
    ///
    /// Returns an error if the device cannot be reached or holds an invalid time.
    async fn read(&mut self) -> Result<RtcDateTime>;

    /// # Errors
    ///
    /// Returns an error if the device cannot be reached or `value` cannot be stored.
    async fn write(&mut self, value: &RtcDateTime) -> Result<()>;
}

/// DS3231 reached through the shared bus. It sits upstream of the multiplexer, so no
/// channel select is needed, but the bus lock still is.
pub struct Ds3231<'a, I2C> {
    bus: &'a SharedBus<I2C>,
}

impl<'a, I2C: I2c> Ds3231<'a, I2C> {
    #[must_use]
    pub const fn new(bus: &'a SharedBus<I2C>) -> Self {
        Self { bus }
    }
}

impl<I2C: I2c> PersistentClock for Ds3231<'_, I2C> {
    async fn read(&mut self) -> Result<RtcDateTime> {
        let mut registers = [0_u8; 7];
        {
            let mut mux = self.bus.lock().await;
            mux.i2c()
                .write_read(DS3231_ADDRESS, &[REG_SECONDS], &mut registers)
                .await
                .map_err(Error::i2c)?;
        }
        RtcDateTime::from_registers(registers)
    }

    async fn write(&mut self, value: &RtcDateTime) -> Result<()> {
        let [s, m, h, w, d, mo, y] = value.to_registers()?;
        let frame = [REG_SECONDS, s, m, h, w, d, mo, y];
        let mut mux = self.bus.lock().await;
        mux.i2c()
            .write(DS3231_ADDRESS, &frame)
            .await
            .map_err(Error::i2c)
    }
}
