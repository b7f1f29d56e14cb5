//! Eight-panel OLED clock behind a TCA9548A multiplexer, with NTP time and a status log.
//!
//! See the [`scheduler`] module for how the render and control contexts fit together.
#![cfg_attr(not(test), no_std)]

// Must come first so the logging macros are visible to every module below.
#[macro_use]
mod fmt;

pub mod bitmap;
pub mod buttons;
pub mod clock;
pub mod clock_face;
pub mod config;
mod error;
pub mod mux;
pub mod network;
pub mod ntp;
pub mod renderer;
pub mod rtc;
pub mod scheduler;
pub mod status;
pub mod surface;
pub mod time_sync;
pub mod tone;
pub mod unix_seconds;

// Re-export commonly used items
pub use bitmap::{Bitmap, BitmapStore, EmbeddedAssets, Symbol};
pub use buttons::{Button, ButtonStates};
pub use clock::LiveClock;
pub use clock_face::ClockFace;
pub use error::{Error, Result};
pub use mux::{SharedBus, Tca9548a};
pub use scheduler::{AppContext, ControlAction, Controller, SchedulerConfig};
pub use status::{StatusLog, StatusPanel, StatusSink};
pub use time_sync::{SyncConfig, SyncOutcome, TimeSync};
