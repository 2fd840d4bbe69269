//! Detection overlay - draw boxes onto a frame and re-encode as JPEG.

use super::BBox;
use crate::error::{Error, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};

/// Box outline thickness in pixels
const BOX_THICKNESS: u32 = 2;

/// Per-class palette; the label picks a stable color
const PALETTE: [[u8; 3]; 6] = [
    [46, 204, 113],
    [52, 152, 219],
    [231, 76, 60],
    [241, 196, 15],
    [155, 89, 182],
    [230, 126, 34],
];

/// Render detection boxes onto an encoded image, returning JPEG bytes.
///
/// With no boxes the input is passed through untouched (the common idle-scene
/// case skips a decode/encode round trip).
pub fn render(image_bytes: &[u8], boxes: &[BBox], jpeg_quality: u8) -> Result<Vec<u8>> {
    if boxes.is_empty() {
        return Ok(image_bytes.to_vec());
    }

    let mut img = image::load_from_memory(image_bytes)
        .map_err(|e| Error::Image(format!("frame decode failed: {e}")))?
        .to_rgb8();

    for bbox in boxes {
        draw_box(&mut img, bbox);
    }

    let mut out = Vec::with_capacity(image_bytes.len());
    JpegEncoder::new_with_quality(&mut out, jpeg_quality.clamp(1, 100))
        .encode_image(&img)
        .map_err(|e| Error::Image(format!("frame encode failed: {e}")))?;

    Ok(out)
}

/// Stable palette color for a class label
pub fn class_color(label: &str) -> [u8; 3] {
    let sum: usize = label.bytes().map(|b| b as usize).sum();
    PALETTE[sum % PALETTE.len()]
}

fn draw_box(img: &mut RgbImage, bbox: &BBox) {
    let (width, height) = (img.width(), img.height());
    if width == 0 || height == 0 {
        return;
    }

    let clamp_x = |v: f32| (v.max(0.0) as u32).min(width - 1);
    let clamp_y = |v: f32| (v.max(0.0) as u32).min(height - 1);

    let left = clamp_x(bbox.x1.min(bbox.x2));
    let right = clamp_x(bbox.x1.max(bbox.x2));
    let top = clamp_y(bbox.y1.min(bbox.y2));
    let bottom = clamp_y(bbox.y1.max(bbox.y2));

    let color = Rgb(class_color(&bbox.label));

    for t in 0..BOX_THICKNESS {
        let y_top = (top + t).min(height - 1);
        let y_bottom = bottom.saturating_sub(t);
        for x in left..=right {
            img.put_pixel(x, y_top, color);
            img.put_pixel(x, y_bottom, color);
        }

        let x_left = (left + t).min(width - 1);
        let x_right = right.saturating_sub(t);
        for y in top..=bottom {
            img.put_pixel(x_left, y, color);
            img.put_pixel(x_right, y, color);
        }
    }
}
