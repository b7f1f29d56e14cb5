//! Packed monochrome glyph bitmaps for the clock digits and the separator.
//!
//! Each asset is `128 * 32 / 8 = 512` bytes, row-major, MSB-first within each byte.
//! The store is loaded once at startup and only read afterwards.

use core::fmt::Write as _;

use heapless::String;

use crate::status::StatusSink;
use crate::{Error, Result};

/// Glyph width in pixels.
pub const GLYPH_WIDTH: usize = 128;
/// Glyph height in pixels.
pub const GLYPH_HEIGHT: usize = 32;
/// Size of one packed glyph asset in bytes.
pub const GLYPH_BYTES: usize = GLYPH_WIDTH * GLYPH_HEIGHT / 8;

/// Asset file names for digits `0..=9`.
pub const DIGIT_ASSETS: [&str; 10] = [
    "digit_0_128x32.bin",
    "digit_1_128x32.bin",
    "digit_2_128x32.bin",
    "digit_3_128x32.bin",
    "digit_4_128x32.bin",
    "digit_5_128x32.bin",
    "digit_6_128x32.bin",
    "digit_7_128x32.bin",
    "digit_8_128x32.bin",
    "digit_9_128x32.bin",
];
/// Asset file name for the separator (colon).
pub const SEPARATOR_ASSET: &str = "colon_128x32.bin";

/// One immutable 128x32 packed bitmap.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap([u8; GLYPH_BYTES]);

impl Bitmap {
    /// An all-clear bitmap.
    pub const BLANK: Self = Self([0; GLYPH_BYTES]);

    /// Copy a packed asset; `None` unless it is exactly [`GLYPH_BYTES`] long.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let packed: [u8; GLYPH_BYTES] = bytes.try_into().ok()?;
        Some(Self(packed))
    }

    /// Whether the pixel at `(x, y)` is set. Out-of-range coordinates read as clear.
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        if x >= GLYPH_WIDTH || y >= GLYPH_HEIGHT {
            return false;
        }
        #[expect(clippy::arithmetic_side_effects, reason = "bounded by the glyph size")]
        let (index, mask) = ((x + y * GLYPH_WIDTH) / 8, 0x80_u8 >> (x % 8));
        self.0.get(index).is_some_and(|byte| byte & mask != 0)
    }

    /// Iterate the coordinates of every set pixel in row-major order.
    pub fn set_pixels(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..GLYPH_HEIGHT)
            .flat_map(|y| (0..GLYPH_WIDTH).map(move |x| (x, y)))
            .filter(|&(x, y)| self.pixel(x, y))
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; GLYPH_BYTES] {
        &self.0
    }
}

impl core::fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let lit = self.0.iter().filter(|byte| **byte != 0).count();
        write!(f, "Bitmap({lit} non-empty bytes)")
    }
}

/// The logical value shown by one clock-face cell.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Symbol {
    /// A decimal digit; only `0..=9` has a glyph.
    Digit(u8),
    SeparatorOn,
    SeparatorOff,
}

impl Symbol {
    /// A digit symbol, or `None` when `value > 9`.
    #[must_use]
    pub const fn digit(value: u8) -> Option<Self> {
        if value <= 9 {
            Some(Self::Digit(value))
        } else {
            None
        }
    }

    /// The separator is visible on even seconds.
    #[must_use]
    pub const fn separator_for_second(second: u8) -> Self {
        if second % 2 == 0 {
            Self::SeparatorOn
        } else {
            Self::SeparatorOff
        }
    }
}

/// Somewhere packed glyph assets can be read from by name.
pub trait BitmapSource {
    fn bytes(&self, name: &'static str) -> Option<&[u8]>;
}

/// Glyph assets compiled into the firmware image.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedAssets;

impl BitmapSource for EmbeddedAssets {
    fn bytes(&self, name: &'static str) -> Option<&[u8]> {
        let bytes: &'static [u8] = match name {
            "digit_0_128x32.bin" => include_bytes!("../assets/digit_0_128x32.bin"),
            "digit_1_128x32.bin" => include_bytes!("../assets/digit_1_128x32.bin"),
            "digit_2_128x32.bin" => include_bytes!("../assets/digit_2_128x32.bin"),
            "digit_3_128x32.bin" => include_bytes!("../assets/digit_3_128x32.bin"),
            "digit_4_128x32.bin" => include_bytes!("../assets/digit_4_128x32.bin"),
            "digit_5_128x32.bin" => include_bytes!("../assets/digit_5_128x32.bin"),
            "digit_6_128x32.bin" => include_bytes!("../assets/digit_6_128x32.bin"),
            "digit_7_128x32.bin" => include_bytes!("../assets/digit_7_128x32.bin"),
            "digit_8_128x32.bin" => include_bytes!("../assets/digit_8_128x32.bin"),
            "digit_9_128x32.bin" => include_bytes!("../assets/digit_9_128x32.bin"),
            "colon_128x32.bin" => include_bytes!("../assets/colon_128x32.bin"),
            _ => return None,
        };
        Some(bytes)
    }
}

/// All glyphs the clock face needs, shared read-only by the renderer.
#[derive(Clone, Debug)]
pub struct BitmapStore {
    digits: [Bitmap; 10],
    separator: Bitmap,
}

impl BitmapStore {
    /// Load the separator and every digit, reporting each asset to `status`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AssetMissing`] or [`Error::AssetSize`] for the first asset that cannot
    /// be used; a clock face without all ten digits is not worth running.
    pub async fn load(source: &impl BitmapSource, status: &mut impl StatusSink) -> Result<Self> {
        let separator = read_asset(source, SEPARATOR_ASSET)?;
        status.log("Loaded Colon bitmap").await;

        let mut digits = [const { Bitmap::BLANK }; 10];
        for (value, (slot, name)) in digits.iter_mut().zip(DIGIT_ASSETS).enumerate() {
            *slot = read_asset(source, name)?;
            let mut message: String<32> = String::new();
            let _ = write!(message, "Loaded bitmap for digit {value}");
            status.log(&message).await;
        }

        Ok(Self { digits, separator })
    }

    /// The glyph for `symbol`; `None` means the cell is drawn blank.
    #[must_use]
    pub fn glyph(&self, symbol: Symbol) -> Option<&Bitmap> {
        match symbol {
            Symbol::Digit(value) => self.digits.get(usize::from(value)),
            Symbol::SeparatorOn => Some(&self.separator),
            Symbol::SeparatorOff => None,
        }
    }
}

fn read_asset(source: &impl BitmapSource, name: &'static str) -> Result<Bitmap> {
    let bytes = source.bytes(name).ok_or(Error::AssetMissing(name))?;
    let bitmap = Bitmap::from_bytes(bytes).ok_or(Error::AssetSize(name))?;
    info!("Loaded {} ({} bytes)", name, GLYPH_BYTES);
    Ok(bitmap)
}
