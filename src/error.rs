use embedded_hal::i2c::ErrorKind;

use derive_more::derive::{Display, Error};

/// A specialized `Result` where the error is this crate's `Error` type.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Everything that can go wrong in the clock, from bus NACKs to bad config lines.
///
/// Most of these are logged and survived; only asset loading and task spawning stop
/// the firmware.
#[derive(Debug, Display, Error, Clone, Copy)]
pub enum Error {
    #[display("I2C transfer failed: {_0:?}")]
    I2c(#[error(not(source))] ErrorKind),

    #[display("NTP request timed out")]
    NtpTimeout,

    #[display("NTP reply malformed")]
    NtpMalformed,

    #[display("{_0}")]
    Network(#[error(not(source))] &'static str),

    #[display("timestamp out of range")]
    InvalidTimestamp,

    #[display("RTC returned an invalid date")]
    RtcInvalid,

    #[display("bitmap asset {_0} not found")]
    AssetMissing(#[error(not(source))] &'static str),

    #[display("bitmap asset {_0} has the wrong size")]
    AssetSize(#[error(not(source))] &'static str),

    #[display("malformed config line {_0}")]
    ConfigMalformed(#[error(not(source))] usize),

    #[display("no SSID configured")]
    ConfigMissing,

    #[display("WiFi association timed out")]
    AssociationTimeout,

    #[cfg(feature = "pico1")]
    #[display("{_0:?}")]
    TaskSpawn(#[error(not(source))] embassy_executor::SpawnError),
}

impl Error {
    /// Reduce any `embedded-hal` I2C error to its portable [`ErrorKind`].
    pub fn i2c<E: embedded_hal::i2c::Error>(err: E) -> Self {
        Self::I2c(err.kind())
    }
}

#[cfg(feature = "pico1")]
impl From<embassy_executor::SpawnError> for Error {
    fn from(err: embassy_executor::SpawnError) -> Self {
        Self::TaskSpawn(err)
    }
}
