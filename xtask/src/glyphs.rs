//! Convert 128x32 PNG artwork into the packed glyph assets under `assets/`.
//!
//! Pixels are packed row-major, eight per byte, most significant bit first. A pixel is
//! lit when its luminance is at least half scale (transparent pixels are dark).

use std::fs::File;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

pub const WIDTH: u32 = 128;
pub const HEIGHT: u32 = 32;
pub const PACKED_LEN: usize = (WIDTH * HEIGHT / 8) as usize;

/// Asset stems in the order the firmware loads them.
pub const GLYPH_NAMES: [&str; 11] = [
    "colon", "digit_0", "digit_1", "digit_2", "digit_3", "digit_4", "digit_5", "digit_6",
    "digit_7", "digit_8", "digit_9",
];

/// Convert `<input_dir>/<name>.png` into `<output_dir>/<name>_128x32.bin` for every glyph.
pub fn convert_all(input_dir: &Path, output_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(output_dir)?;
    let results: Vec<(PathBuf, Result<(), String>)> = GLYPH_NAMES
        .par_iter()
        .map(|name| {
            let input = input_dir.join(format!("{name}.png"));
            let output = output_dir.join(format!("{name}_{WIDTH}x{HEIGHT}.bin"));
            let result = pack_png(&input)
                .and_then(|packed| std::fs::write(&output, packed).map_err(Into::into))
                .map_err(|err| format!("{}: {err}", input.display()));
            (output, result)
        })
        .collect();

    let mut failures = 0;
    for (output, result) in results {
        match result {
            Ok(()) => println!("  wrote {}", output.display()),
            Err(err) => {
                eprintln!("  {err}");
                failures += 1;
            }
        }
    }
    if failures > 0 {
        return Err(format!("{failures} glyph(s) failed to convert").into());
    }
    Ok(())
}

/// Read one PNG and pack it.
pub fn pack_png(path: &Path) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut decoder = png::Decoder::new(File::open(path)?);
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder.read_info()?;
    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf)?;

    if info.width != WIDTH || info.height != HEIGHT {
        return Err(format!(
            "wrong dimensions ({}x{}), expected {WIDTH}x{HEIGHT}",
            info.width, info.height
        )
        .into());
    }

    let channels = match info.color_type {
        png::ColorType::Grayscale => 1,
        png::ColorType::GrayscaleAlpha => 2,
        png::ColorType::Rgb => 3,
        png::ColorType::Rgba => 4,
        other => return Err(format!("unsupported color type {other:?}").into()),
    };
    let frame = buf.get(..info.buffer_size()).ok_or("short frame")?;
    Ok(pack_pixels(frame, channels))
}

/// Pack an 8-bit frame with `channels` samples per pixel.
pub fn pack_pixels(frame: &[u8], channels: usize) -> Vec<u8> {
    let mut packed = vec![0_u8; PACKED_LEN];
    for (index, pixel) in frame.chunks_exact(channels).enumerate().take(PACKED_LEN * 8) {
        if is_lit(pixel) {
            packed[index / 8] |= 0x80 >> (index % 8);
        }
    }
    packed
}

fn is_lit(pixel: &[u8]) -> bool {
    let (luma, alpha) = match *pixel {
        [gray] => (u32::from(gray), 255),
        [gray, alpha] => (u32::from(gray), alpha),
        [r, g, b] => (luma(r, g, b), 255),
        [r, g, b, alpha] => (luma(r, g, b), alpha),
        _ => (0, 0),
    };
    alpha >= 128 && luma >= 128
}

fn luma(r: u8, g: u8, b: u8) -> u32 {
    (299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b)) / 1000
}
