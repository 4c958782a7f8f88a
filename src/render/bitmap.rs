//! Grayscale → printable bitmap transform
//!
//! Trim blank rows, rescale to the printer's dot width, threshold to two
//! levels. All functions are pure.

use crate::errors::{DaemonError, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma};

/// Luma at or above this prints white
pub const BLACK_THRESHOLD: u8 = 128;

const WHITE: u8 = 255;

/// Monochrome bitmap ready for the printer: every pixel is 0 or 255 and the
/// width equals the printer's dot width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    image: GrayImage,
}

impl Bitmap {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Pack one row as 1-bit MSB-first bytes, 1 = black dot
    pub fn packed_row(&self, y: u32) -> Vec<u8> {
        let width = self.width() as usize;
        let start = y as usize * width;
        let row = &self.image.as_raw()[start..start + width];

        row.chunks(8)
            .map(|dots| {
                dots.iter()
                    .enumerate()
                    .filter(|(_, &luma)| luma == 0)
                    .fold(0u8, |byte, (bit, _)| byte | (0x80 >> bit))
            })
            .collect()
    }
}

/// Rows `[top, bottom)` that contain any pixel darker than pure white.
///
/// A blank image yields `(0, height)` so it passes through untrimmed.
pub fn content_rows(img: &GrayImage) -> (u32, u32) {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return (0, height);
    }

    let has_ink = |row: &[u8]| row.iter().any(|&luma| luma < WHITE);
    let mut rows = img.as_raw().chunks_exact(width as usize);

    match rows.position(has_ink) {
        Some(top) => {
            let last = img
                .as_raw()
                .chunks_exact(width as usize)
                .rposition(has_ink)
                .unwrap_or(top);
            (top as u32, last as u32 + 1)
        }
        None => (0, height),
    }
}

/// Keep rows `[top, bottom)` at full width
pub fn crop_rows(img: &GrayImage, top: u32, bottom: u32) -> GrayImage {
    let bottom = bottom.min(img.height());
    let top = top.min(bottom);
    imageops::crop_imm(img, 0, top, img.width(), bottom - top).to_image()
}

/// Resize to exactly `width`, height proportional (floored, at least 1 row)
pub fn scale_to_width(img: &GrayImage, width: u32) -> GrayImage {
    let (w, h) = img.dimensions();
    let height = ((h as u64 * width as u64) / w.max(1) as u64).max(1) as u32;
    imageops::resize(img, width, height, FilterType::Lanczos3)
}

/// Fixed-threshold two-level conversion, no dithering
pub fn binarize(img: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        if img.get_pixel(x, y)[0] < threshold {
            Luma([0])
        } else {
            Luma([WHITE])
        }
    })
}

/// Grayscale, trim, rescale and binarize a rasterized page
pub fn to_printable(page: &DynamicImage, width: u32) -> Result<Bitmap> {
    if page.width() == 0 || page.height() == 0 {
        return Err(DaemonError::Render("Rasterized page is empty".to_string()));
    }

    let gray = page.to_luma8();
    let (top, bottom) = content_rows(&gray);
    let cropped = crop_rows(&gray, top, bottom);
    let scaled = scale_to_width(&cropped, width);

    Ok(Bitmap {
        image: binarize(&scaled, BLACK_THRESHOLD),
    })
}
