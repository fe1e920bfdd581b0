//! Burns a `Time: HH:MM:SS` label into frame pixels.

use image::{Rgb, RgbImage};

use crate::error::{Error, Result};
use crate::naming::timestamp_label;

const GLYPH_W: u32 = 5;
const GLYPH_H: u32 = 7;

const BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);
const FOREGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// 5x7 bitmaps, one byte per row, high bit on the left.
fn glyph(c: char) -> Option<[u8; 7]> {
    Some(match c {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'i' => [0x04, 0x00, 0x0C, 0x04, 0x04, 0x04, 0x0E],
        'm' => [0x00, 0x00, 0x1A, 0x15, 0x15, 0x11, 0x11],
        'e' => [0x00, 0x00, 0x0E, 0x11, 0x1F, 0x10, 0x0E],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        ' ' => [0x00; 7],
        _ => return None,
    })
}

pub fn burn_timestamp(image: &mut RgbImage, timestamp: u64) -> Result<()> {
    draw_label(image, &timestamp_label(timestamp))
}

/// Draws `text` white on a black box near the bottom-left corner. Glyphs
/// scale with the frame height.
pub fn draw_label(image: &mut RgbImage, text: &str) -> Result<()> {
    let glyphs = text
        .chars()
        .map(|c| glyph(c).ok_or_else(|| Error::Overlay(format!("no glyph for {c:?}"))))
        .collect::<Result<Vec<_>>>()?;

    let (width, height) = image.dimensions();
    let scale = (height / 180).max(1);
    let pad = 2 * scale;
    let margin = 4 * scale;
    let advance = (GLYPH_W + 1) * scale;

    let text_w = (glyphs.len() as u32 * advance).saturating_sub(scale);
    let box_w = text_w + 2 * pad;
    let box_h = GLYPH_H * scale + 2 * pad;
    if margin + box_w > width || margin + box_h > height {
        return Err(Error::Overlay(format!(
            "a {width}x{height} frame is too small for the label"
        )));
    }

    let box_x = margin;
    let box_y = height - margin - box_h;
    for y in box_y..box_y + box_h {
        for x in box_x..box_x + box_w {
            image.put_pixel(x, y, BACKGROUND);
        }
    }

    for (i, rows) in glyphs.iter().enumerate() {
        let gx = box_x + pad + i as u32 * advance;
        let gy = box_y + pad;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_W {
                if bits & (0x10 >> col) == 0 {
                    continue;
                }
                let px = gx + col * scale;
                let py = gy + row as u32 * scale;
                for dy in 0..scale {
                    for dx in 0..scale {
                        image.put_pixel(px + dx, py + dy, FOREGROUND);
                    }
                }
            }
        }
    }
    Ok(())
}
