//! The eight-panel clock face: `H H : M M : S S`, one panel per multiplexer channel.

use core::fmt::Write as _;

use embedded_hal_async::i2c::I2c;
use heapless::String;
use time::OffsetDateTime;

use crate::bitmap::{BitmapStore, Symbol};
use crate::mux::{MUX_CHANNELS, SharedBus};
use crate::renderer::{Cell, DirtyChannels, PresentReport, present_dirty, render_cell};
use crate::status::StatusSink;
use crate::surface::PixelSurface;

/// Number of cells (and panels) on the face.
pub const FACE_CELLS: usize = MUX_CHANNELS as usize;
/// Cells that show the flashing separator.
pub const SEPARATOR_CELLS: [usize; 2] = [2, 5];

/// Map a wall-clock time to the eight cell symbols.
///
/// Both separators are visible on even seconds and blank on odd ones.
#[must_use]
#[expect(clippy::arithmetic_side_effects, reason = "h/m/s are below 60")]
pub fn face_symbols(time: &OffsetDateTime) -> [Symbol; FACE_CELLS] {
    let (hour, minute, second) = (time.hour(), time.minute(), time.second());
    let separator = Symbol::separator_for_second(second);
    [
        Symbol::Digit(hour / 10),
        Symbol::Digit(hour % 10),
        separator,
        Symbol::Digit(minute / 10),
        Symbol::Digit(minute % 10),
        separator,
        Symbol::Digit(second / 10),
        Symbol::Digit(second % 10),
    ]
}

/// What one [`ClockFace::tick`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Channels whose frame buffer was redrawn this tick.
    pub redrawn: DirtyChannels,
    /// Channels that were redrawn but could not be presented.
    pub failed: DirtyChannels,
}

/// Owns the panels that came up and the per-cell render state.
///
/// Only the render context touches a `ClockFace`; the control context asks for a full
/// redraw through [`AppContext`](crate::scheduler::AppContext) instead.
pub struct ClockFace<'a, S> {
    store: &'a BitmapStore,
    displays: [Option<S>; FACE_CELLS],
    cells: [Cell; FACE_CELLS],
}

impl<'a, S: PixelSurface> ClockFace<'a, S> {
    /// Build a face from already initialized panels. `None` marks a channel that is not
    /// part of the active set.
    #[must_use]
    #[expect(clippy::cast_possible_truncation, reason = "FACE_CELLS is 8")]
    pub fn new(store: &'a BitmapStore, displays: [Option<S>; FACE_CELLS]) -> Self {
        Self {
            store,
            displays,
            cells: core::array::from_fn(|index| Cell::new(index as u8)),
        }
    }

    /// Select and initialize every channel in turn, keeping the panels that answer.
    ///
    /// Each result is reported to `status`. A panel that fails is left out; the face runs
    /// with a gap rather than not at all.
    pub async fn bring_up<I: I2c>(
        store: &'a BitmapStore,
        bus: &SharedBus<I>,
        mut make_display: impl FnMut(u8) -> S,
        status: &mut impl StatusSink,
    ) -> Self {
        let mut displays: [Option<S>; FACE_CELLS] = core::array::from_fn(|_| None);
        for (channel, slot) in (0..MUX_CHANNELS).zip(displays.iter_mut()) {
            let mut display = make_display(channel);
            let result = {
                let mut mux = bus.lock().await;
                match mux.select(channel).await {
                    Ok(()) => display.init(mux.i2c()).await,
                    Err(err) => Err(err),
                }
            };

            let mut message: String<64> = String::new();
            match result {
                Ok(()) => {
                    let _ = write!(message, "Display {channel} initialized successfully.");
                    *slot = Some(display);
                }
                Err(err) => {
                    let _ = write!(message, "Failed to initialize display {channel}: {err}");
                }
            }
            status.log(&message).await;
        }
        Self::new(store, displays)
    }

    /// Channels that came up.
    #[must_use]
    pub fn active_channels(&self) -> DirtyChannels {
        let mut active = DirtyChannels::NONE;
        for cell in self.cells.iter().filter(|cell| self.is_active(cell.channel())) {
            active.mark(cell.channel());
        }
        active
    }

    fn is_active(&self, channel: u8) -> bool {
        self.displays
            .get(usize::from(channel))
            .is_some_and(Option::is_some)
    }

    /// Forget every cell's last symbol so the next tick redraws the whole face.
    pub fn invalidate(&mut self) {
        for cell in &mut self.cells {
            cell.invalidate();
        }
    }

    #[must_use]
    pub const fn cells(&self) -> &[Cell; FACE_CELLS] {
        &self.cells
    }

    /// Render `now` and present whichever panels changed.
    ///
    /// A panel that fails to present is invalidated so it is retried next tick.
    pub async fn tick<I: I2c>(&mut self, bus: &SharedBus<I>, now: &OffsetDateTime) -> TickReport {
        let symbols = face_symbols(now);
        let mut dirty = DirtyChannels::NONE;
        for ((cell, display), symbol) in self
            .cells
            .iter_mut()
            .zip(self.displays.iter_mut())
            .zip(symbols)
        {
            if let Some(display) = display {
                render_cell(cell, display, self.store, symbol, &mut dirty);
            }
        }

        if dirty.is_empty() {
            return TickReport::default();
        }
        let PresentReport { failed, .. } = present_dirty(bus, &mut self.displays, dirty).await;
        for cell in self.cells.iter_mut().filter(|cell| failed.contains(cell.channel())) {
            cell.invalidate();
        }
        TickReport {
            redrawn: dirty,
            failed,
        }
    }
}
