//! TCA9548A 1-to-8 I2C multiplexer sitting in front of the clock-face displays.
//!
//! Every device behind the multiplexer answers on the same address, so a caller must
//! [`select`](Tca9548a::select) a channel and then talk to the device while holding the
//! [`SharedBus`] lock. Nothing is cached here: each batch starts with a fresh select.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embedded_hal_async::i2c::I2c;

use crate::{Error, Result};

/// Default TCA9548A address (A0..A2 tied low).
pub const ADDRESS: u8 = 0x70;
/// Number of downstream channels.
pub const MUX_CHANNELS: u8 = 8;

/// The one I2C bus, shared by the render and control contexts.
///
/// Holding the guard makes a select-then-operate sequence atomic with respect to the
/// other context.
pub type SharedBus<I2C> = Mutex<CriticalSectionRawMutex, Tca9548a<I2C>>;

/// Channel selector that owns the bus it switches.
pub struct Tca9548a<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Tca9548a<I2C> {
    #[must_use]
    pub const fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, ADDRESS)
    }

    #[must_use]
    pub const fn with_address(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Route subsequent traffic to `channel`.
    ///
    /// Channels above 7 are ignored: no bus write happens and whichever channel was
    /// selected before stays selected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::I2c`] if the multiplexer does not acknowledge the control byte.
    pub async fn select(&mut self, channel: u8) -> Result<()> {
        if channel >= MUX_CHANNELS {
            debug!("mux: ignoring select of channel {}", channel);
            return Ok(());
        }
        self.i2c
            .write(self.address, &[1_u8 << channel])
            .await
            .map_err(Error::i2c)
    }

    /// The raw bus, for devices downstream of (or beside) the multiplexer.
    pub const fn i2c(&mut self) -> &mut I2C {
        &mut self.i2c
    }

    /// Give the bus back.
    pub fn release(self) -> I2C {
        self.i2c
    }
}
