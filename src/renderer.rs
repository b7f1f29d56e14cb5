//! Differential rendering of clock-face cells.
//!
//! A cell is redrawn only when its [`Symbol`] changes. Redraws happen in RAM first; the
//! touched channels are collected in a [`DirtyChannels`] mask and pushed to the panels
//! afterwards by [`present_dirty`], one bus critical section per channel.

use embedded_hal_async::i2c::I2c;

use crate::bitmap::{Bitmap, BitmapStore, Symbol};
use crate::mux::{MUX_CHANNELS, SharedBus};
use crate::surface::PixelSurface;

/// One logical clock-face position, bound to a multiplexer channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
    channel: u8,
    last: Option<Symbol>,
}

impl Cell {
    #[must_use]
    pub const fn new(channel: u8) -> Self {
        Self {
            channel,
            last: None,
        }
    }

    #[must_use]
    pub const fn channel(&self) -> u8 {
        self.channel
    }

    /// The symbol currently in this cell's frame buffer, if any.
    #[must_use]
    pub const fn last_rendered(&self) -> Option<Symbol> {
        self.last
    }

    /// Forget what was drawn so the next render always redraws.
    pub const fn invalidate(&mut self) {
        self.last = None;
    }
}

/// Bit set of multiplexer channels, iterated in ascending order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DirtyChannels(u8);

impl DirtyChannels {
    pub const NONE: Self = Self(0);

    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Mark `channel`; channels outside `0..8` are ignored.
    pub const fn mark(&mut self, channel: u8) {
        if channel < MUX_CHANNELS {
            self.0 |= 1 << channel;
        }
    }

    #[must_use]
    pub const fn contains(self, channel: u8) -> bool {
        channel < MUX_CHANNELS && self.0 & (1 << channel) != 0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn len(self) -> u32 {
        self.0.count_ones()
    }

    pub fn iter(self) -> impl Iterator<Item = u8> {
        (0..MUX_CHANNELS).filter(move |channel| self.contains(*channel))
    }
}

/// Clear `surface` and set exactly the pixels that are set in `bitmap`.
///
/// `None` leaves the surface blank.
pub fn decode_into<S: PixelSurface>(surface: &mut S, bitmap: Option<&Bitmap>) {
    surface.fill(false);
    if let Some(bitmap) = bitmap {
        for (x, y) in bitmap.set_pixels() {
            surface.set_pixel(x, y, true);
        }
    }
}

/// Draw `symbol` into `surface` if it differs from what `cell` last showed.
///
/// Returns whether a redraw happened. A redraw marks the cell's channel in `dirty` and
/// records `symbol` as the cell's last rendered value.
pub fn render_cell<S: PixelSurface>(
    cell: &mut Cell,
    surface: &mut S,
    store: &BitmapStore,
    symbol: Symbol,
    dirty: &mut DirtyChannels,
) -> bool {
    if cell.last == Some(symbol) {
        return false;
    }
    decode_into(surface, store.glyph(symbol));
    dirty.mark(cell.channel);
    cell.last = Some(symbol);
    true
}

/// Result of pushing a batch of dirty channels to the panels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PresentReport {
    pub presented: DirtyChannels,
    pub failed: DirtyChannels,
}

/// Present every dirty channel in ascending order.
///
/// `surfaces` is indexed by channel; a `None` slot (a panel that never came up) is
/// skipped. Each select-then-present runs with the bus locked. A failing channel is
/// logged and reported; it does not stop the others.
pub async fn present_dirty<I: I2c, S: PixelSurface>(
    bus: &SharedBus<I>,
    surfaces: &mut [Option<S>],
    dirty: DirtyChannels,
) -> PresentReport {
    let mut report = PresentReport::default();
    for channel in dirty.iter() {
        let Some(Some(surface)) = surfaces.get_mut(usize::from(channel)) else {
            continue;
        };
        let result = {
            let mut mux = bus.lock().await;
            match mux.select(channel).await {
                Ok(()) => surface.present(mux.i2c()).await,
                Err(err) => Err(err),
            }
        };
        match result {
            Ok(()) => report.presented.mark(channel),
            Err(_err) => {
                warn!("present on channel {} failed", channel);
                report.failed.mark(channel);
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::{EmbeddedAssets, GLYPH_HEIGHT, GLYPH_WIDTH};
    use crate::status::testing::RecordingStatus;
    use crate::surface::{Oled128x32, SSD1306_ADDRESS};
    use embassy_futures::block_on;

    fn store() -> BitmapStore {
        block_on(BitmapStore::load(&EmbeddedAssets, &mut RecordingStatus::default())).unwrap()
    }

    #[test]
    fn same_symbol_twice_redraws_once() {
        let store = store();
        let mut cell = Cell::new(4);
        let mut oled = Oled128x32::new(SSD1306_ADDRESS);
        let mut dirty = DirtyChannels::NONE;

        assert!(render_cell(&mut cell, &mut oled, &store, Symbol::Digit(3), &mut dirty));
        assert_eq!(dirty, DirtyChannels::from_bits(0b0001_0000));

        let mut again = DirtyChannels::NONE;
        assert!(!render_cell(&mut cell, &mut oled, &store, Symbol::Digit(3), &mut again));
        assert!(again.is_empty());
        assert_eq!(cell.last_rendered(), Some(Symbol::Digit(3)));
    }

    #[test]
    fn decode_matches_bitmap_exactly() {
        let store = store();
        let glyph = store.glyph(Symbol::Digit(8)).unwrap();
        let mut oled = Oled128x32::new(SSD1306_ADDRESS);
        oled.fill(true);

        decode_into(&mut oled, Some(glyph));

        for y in 0..GLYPH_HEIGHT {
            for x in 0..GLYPH_WIDTH {
                assert_eq!(oled.pixel(x, y), glyph.pixel(x, y), "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn blank_separator_clears_the_panel() {
        let store = store();
        let mut cell = Cell::new(2);
        let mut oled = Oled128x32::new(SSD1306_ADDRESS);
        let mut dirty = DirtyChannels::NONE;

        render_cell(&mut cell, &mut oled, &store, Symbol::SeparatorOn, &mut dirty);
        assert!(oled.pages().iter().flatten().any(|column| *column != 0));

        render_cell(&mut cell, &mut oled, &store, Symbol::SeparatorOff, &mut dirty);
        assert!(oled.pages().iter().flatten().all(|column| *column == 0));
    }

    #[test]
    fn invalidated_cell_redraws() {
        let store = store();
        let mut cell = Cell::new(0);
        let mut oled = Oled128x32::new(SSD1306_ADDRESS);
        let mut dirty = DirtyChannels::NONE;

        render_cell(&mut cell, &mut oled, &store, Symbol::Digit(1), &mut dirty);
        cell.invalidate();
        assert!(render_cell(&mut cell, &mut oled, &store, Symbol::Digit(1), &mut dirty));
    }

    #[test]
    fn dirty_channels_iterate_ascending() {
        let mut dirty = DirtyChannels::NONE;
        dirty.mark(6);
        dirty.mark(1);
        dirty.mark(3);
        dirty.mark(12);

        assert_eq!(dirty.iter().collect::<Vec<_>>(), vec![1, 3, 6]);
        assert_eq!(dirty.len(), 3);
        assert!(!dirty.contains(12));
    }
}
