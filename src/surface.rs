//! RAM-backed monochrome pixel surfaces and the SSD1306 OLED controller behind them.
//!
//! Drawing only touches the frame buffer. Nothing reaches the glass until
//! [`PixelSurface::present`] is called with a bus that is already routed to the device.

use core::convert::Infallible;

use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::{DrawTarget, OriginDimensions, Pixel, Point, Size};
use embedded_graphics::text::{Baseline, Text};
use embedded_graphics::Drawable;
use embedded_hal_async::i2c::I2c;

use crate::{Error, Result};

/// Width in pixels of one character of the status font.
pub const CHAR_WIDTH: usize = 6;
/// Height in pixels of one line of the status font.
pub const LINE_HEIGHT: usize = 10;

/// A frame buffer that can be pushed to a display over I2C.
///
/// Geometry comes from the embedded-graphics [`DrawTarget`] supertrait, so anything that
/// implements this can also be drawn on with the embedded-graphics primitives.
#[allow(async_fn_in_trait, reason = "single-threaded executor; futures need not be Send")]
pub trait PixelSurface: DrawTarget<Color = BinaryColor, Error = Infallible> + Sized {
    /// Set every pixel to `on`.
    fn fill(&mut self, on: bool);

    /// Set one pixel. Out-of-range coordinates are ignored.
    fn set_pixel(&mut self, x: usize, y: usize, on: bool);

    /// Read one pixel back. Out-of-range coordinates read as off.
    fn pixel(&self, x: usize, y: usize) -> bool;

    /// Send the power-up command sequence and blank the panel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::I2c`] if the controller does not acknowledge.
    async fn init<I: I2c>(&mut self, i2c: &mut I) -> Result<()>;

    /// Copy the whole frame buffer to the panel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::I2c`] if any transfer fails.
    async fn present<I: I2c>(&mut self, i2c: &mut I) -> Result<()>;

    fn width(&self) -> usize {
        usize::try_from(self.bounding_box().size.width).unwrap_or(0)
    }

    fn height(&self) -> usize {
        usize::try_from(self.bounding_box().size.height).unwrap_or(0)
    }

    fn fill_rect(&mut self, x: usize, y: usize, width: usize, height: usize, on: bool) {
        let x_end = x.saturating_add(width).min(self.width());
        let y_end = y.saturating_add(height).min(self.height());
        for py in y..y_end {
            for px in x..x_end {
                self.set_pixel(px, py, on);
            }
        }
    }

    fn hline(&mut self, x: usize, y: usize, width: usize, on: bool) {
        self.fill_rect(x, y, width, 1, on);
    }

    /// Shift the contents by `(dx, dy)`; pixels shifted in from outside are cleared.
    #[expect(
        clippy::arithmetic_side_effects,
        clippy::cast_possible_wrap,
        clippy::cast_sign_loss,
        reason = "display sizes fit comfortably in i32"
    )]
    fn scroll(&mut self, dx: i32, dy: i32) {
        let (w, h) = (self.width() as i32, self.height() as i32);
        // Walk against the shift direction so every source pixel is read before it is
        // overwritten.
        for j in 0..h {
            let y = if dy > 0 { h - 1 - j } else { j };
            for i in 0..w {
                let x = if dx > 0 { w - 1 - i } else { i };
                let (src_x, src_y) = (x - dx, y - dy);
                let on = (0..w).contains(&src_x)
                    && (0..h).contains(&src_y)
                    && self.pixel(src_x as usize, src_y as usize);
                self.set_pixel(x as usize, y as usize, on);
            }
        }
    }

    /// Draw `text` in the 6x10 font with its top-left corner at `(x, y)`.
    fn draw_text(&mut self, text: &str, x: i32, y: i32) {
        let style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
        let Ok(_) = Text::with_baseline(text, Point::new(x, y), style, Baseline::Top).draw(self);
    }
}

// ============================================================================
// SSD1306
// ============================================================================

const CONTROL_CMD_STREAM: u8 = 0x00;
const CONTROL_DATA_STREAM: u8 = 0x40;

const CMD_SET_CONTRAST: u8 = 0x81;
const CMD_DISPLAY_ALL_ON_RESUME: u8 = 0xA4;
const CMD_NORMAL_DISPLAY: u8 = 0xA6;
const CMD_DISPLAY_OFF: u8 = 0xAE;
const CMD_DISPLAY_ON: u8 = 0xAF;
const CMD_SET_DISPLAY_OFFSET: u8 = 0xD3;
const CMD_SET_COM_PINS: u8 = 0xDA;
const CMD_SET_VCOM_DETECT: u8 = 0xDB;
const CMD_SET_DISPLAY_CLOCK_DIV: u8 = 0xD5;
const CMD_SET_PRECHARGE: u8 = 0xD9;
const CMD_SET_MULTIPLEX: u8 = 0xA8;
const CMD_SET_START_LINE: u8 = 0x40;
const CMD_MEMORY_MODE: u8 = 0x20;
const CMD_COLUMN_ADDR: u8 = 0x21;
const CMD_PAGE_ADDR: u8 = 0x22;
const CMD_COM_SCAN_DEC: u8 = 0xC8;
const CMD_SEG_REMAP: u8 = 0xA0;
const CMD_CHARGE_PUMP: u8 = 0x8D;
const CMD_DEACTIVATE_SCROLL: u8 = 0x2E;

/// Largest data payload sent in one I2C write.
const DATA_CHUNK: usize = 128;

/// Default address of an SSD1306 module (SA0 low).
pub const SSD1306_ADDRESS: u8 = 0x3C;
/// Alternate address (SA0 high), used for the status display so it can share the bus
/// with whichever clock-face panel the multiplexer has routed.
pub const SSD1306_ALT_ADDRESS: u8 = 0x3D;

/// SSD1306 frame buffer in the controller's native page layout: `PAGES` rows of 8-pixel
/// tall columns, least significant bit at the top.
pub struct Ssd1306<const W: usize, const PAGES: usize> {
    pages: [[u8; W]; PAGES],
    address: u8,
}

/// 128x32 panel used for each clock-face cell.
pub type Oled128x32 = Ssd1306<128, 4>;
/// 128x64 panel used for the status log.
pub type Oled128x64 = Ssd1306<128, 8>;

impl<const W: usize, const PAGES: usize> Ssd1306<W, PAGES> {
    #[must_use]
    pub const fn new(address: u8) -> Self {
        Self {
            pages: [[0; W]; PAGES],
            address,
        }
    }

    #[must_use]
    pub const fn address(&self) -> u8 {
        self.address
    }

    /// Raw page buffer, one `[u8; W]` per 8-pixel band.
    #[must_use]
    pub const fn pages(&self) -> &[[u8; W]; PAGES] {
        &self.pages
    }

    #[expect(clippy::arithmetic_side_effects, reason = "PAGES is a small const")]
    const fn height_px() -> usize {
        PAGES * 8
    }

    async fn commands<I: I2c>(&self, i2c: &mut I, commands: &[u8]) -> Result<()> {
        let mut buffer = [CONTROL_CMD_STREAM; 32];
        let len = commands.len().min(buffer.len().saturating_sub(1));
        let (Some(payload), Some(source)) = (buffer.get_mut(1..=len), commands.get(..len)) else {
            return Ok(());
        };
        payload.copy_from_slice(source);
        i2c.write(self.address, buffer.get(..=len).unwrap_or(&[]))
            .await
            .map_err(Error::i2c)
    }
}

impl<const W: usize, const PAGES: usize> OriginDimensions for Ssd1306<W, PAGES> {
    fn size(&self) -> Size {
        Size::new(
            u32::try_from(W).unwrap_or(u32::MAX),
            u32::try_from(Self::height_px()).unwrap_or(u32::MAX),
        )
    }
}

impl<const W: usize, const PAGES: usize> DrawTarget for Ssd1306<W, PAGES> {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<P>(&mut self, pixels: P) -> core::result::Result<(), Self::Error>
    where
        P: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if let (Ok(x), Ok(y)) = (usize::try_from(point.x), usize::try_from(point.y)) {
                self.set_pixel(x, y, color.is_on());
            }
        }
        Ok(())
    }
}

impl<const W: usize, const PAGES: usize> PixelSurface for Ssd1306<W, PAGES> {
    fn fill(&mut self, on: bool) {
        let byte = if on { 0xFF } else { 0x00 };
        for page in &mut self.pages {
            page.fill(byte);
        }
    }

    fn set_pixel(&mut self, x: usize, y: usize, on: bool) {
        let Some(column) = self.pages.get_mut(y / 8).and_then(|page| page.get_mut(x)) else {
            return;
        };
        let mask = 1_u8 << (y % 8);
        if on {
            *column |= mask;
        } else {
            *column &= !mask;
        }
    }

    fn pixel(&self, x: usize, y: usize) -> bool {
        self.pages
            .get(y / 8)
            .and_then(|page| page.get(x))
            .is_some_and(|column| column & (1_u8 << (y % 8)) != 0)
    }

    #[expect(clippy::cast_possible_truncation, reason = "panel geometry fits in a byte")]
    async fn init<I: I2c>(&mut self, i2c: &mut I) -> Result<()> {
        let rows = Self::height_px();
        let com_pins = if rows > 32 { 0x12 } else { 0x02 };
        self.commands(
            i2c,
            &[
                CMD_DISPLAY_OFF,
                CMD_SET_DISPLAY_CLOCK_DIV,
                0x80,
                CMD_SET_MULTIPLEX,
                rows.saturating_sub(1) as u8,
                CMD_SET_DISPLAY_OFFSET,
                0x00,
                CMD_SET_START_LINE,
                CMD_CHARGE_PUMP,
                0x14,
                CMD_MEMORY_MODE,
                0x00,
                CMD_SEG_REMAP | 0x01,
                CMD_COM_SCAN_DEC,
                CMD_SET_COM_PINS,
                com_pins,
                CMD_SET_CONTRAST,
                0x7F,
                CMD_SET_PRECHARGE,
                0xF1,
                CMD_SET_VCOM_DETECT,
                0x40,
                CMD_DISPLAY_ALL_ON_RESUME,
                CMD_NORMAL_DISPLAY,
                CMD_DEACTIVATE_SCROLL,
                CMD_DISPLAY_ON,
            ],
        )
        .await?;
        self.fill(false);
        self.present(i2c).await
    }

    #[expect(clippy::cast_possible_truncation, reason = "panel geometry fits in a byte")]
    async fn present<I: I2c>(&mut self, i2c: &mut I) -> Result<()> {
        self.commands(
            i2c,
            &[
                CMD_COLUMN_ADDR,
                0,
                W.saturating_sub(1) as u8,
                CMD_PAGE_ADDR,
                0,
                PAGES.saturating_sub(1) as u8,
            ],
        )
        .await?;

        let mut buffer = [CONTROL_DATA_STREAM; DATA_CHUNK + 1];
        for page in &self.pages {
            for chunk in page.chunks(DATA_CHUNK) {
                let len = chunk.len();
                if let Some(payload) = buffer.get_mut(1..=len) {
                    payload.copy_from_slice(chunk);
                }
                i2c.write(self.address, buffer.get(..=len).unwrap_or(&[]))
                    .await
                    .map_err(Error::i2c)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use embedded_hal_mock::eh1::i2c::{Mock, Transaction};

    #[test]
    fn pixels_map_to_page_bits() {
        let mut oled = Oled128x32::new(SSD1306_ADDRESS);
        oled.set_pixel(5, 0, true);
        oled.set_pixel(5, 9, true);
        oled.set_pixel(200, 0, true); // ignored

        assert_eq!(oled.pages()[0][5], 0b0000_0001);
        assert_eq!(oled.pages()[1][5], 0b0000_0010);
        assert!(oled.pixel(5, 9));
        assert!(!oled.pixel(6, 9));

        oled.set_pixel(5, 9, false);
        assert_eq!(oled.pages()[1][5], 0);
        assert_eq!((oled.width(), oled.height()), (128, 32));
    }

    #[test]
    fn scroll_up_moves_content_and_clears_the_bottom() {
        let mut oled = Oled128x64::new(SSD1306_ALT_ADDRESS);
        oled.set_pixel(3, 30, true);
        oled.fill_rect(0, 60, 128, 4, true);

        oled.scroll(0, -10);

        assert!(oled.pixel(3, 20));
        assert!(!oled.pixel(3, 30));
        assert!(oled.pixel(0, 50) && oled.pixel(127, 53));
        assert!((54..64).all(|y| (0..128).all(|x| !oled.pixel(x, y))));
    }

    #[test]
    fn scroll_right_and_down() {
        let mut oled = Oled128x32::new(SSD1306_ADDRESS);
        oled.set_pixel(0, 0, true);
        oled.set_pixel(127, 31, true);

        oled.scroll(2, 1);

        assert!(oled.pixel(2, 1));
        assert!(!oled.pixel(0, 0));
        let lit = (0..32)
            .flat_map(|y| (0..128).map(move |x| (x, y)))
            .filter(|&(x, y)| oled.pixel(x, y))
            .count();
        assert_eq!(lit, 1);
    }

    #[test]
    fn text_lands_inside_its_line() {
        let mut oled = Oled128x64::new(SSD1306_ALT_ADDRESS);
        oled.draw_text("Hi", 0, 24);

        let lit: Vec<_> = (0..64)
            .flat_map(|y| (0..128).map(move |x| (x, y)))
            .filter(|&(x, y)| oled.pixel(x, y))
            .collect();
        assert!(!lit.is_empty());
        assert!(
            lit.iter()
                .all(|&(x, y)| x < 2 * CHAR_WIDTH && (24..24 + LINE_HEIGHT).contains(&y))
        );
    }

    #[test]
    fn present_sets_the_window_then_streams_pages() {
        let mut tiny = Ssd1306::<4, 2>::new(SSD1306_ADDRESS);
        tiny.set_pixel(0, 0, true);
        tiny.set_pixel(3, 15, true);

        let expectations = [
            Transaction::write(SSD1306_ADDRESS, vec![0x00, 0x21, 0, 3, 0x22, 0, 1]),
            Transaction::write(SSD1306_ADDRESS, vec![0x40, 0x01, 0, 0, 0]),
            Transaction::write(SSD1306_ADDRESS, vec![0x40, 0, 0, 0, 0x80]),
        ];
        let mut i2c = Mock::new(&expectations);

        block_on(tiny.present(&mut i2c)).unwrap();
        i2c.done();
    }
}
