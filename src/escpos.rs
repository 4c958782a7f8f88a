use crate::render::Bitmap;

/// ESC/POS Commands (byte sequences)
const ESC: u8 = 0x1b;
const GS: u8 = 0x1d;
const LF: u8 = 0x0a;

/// Rows per `GS v 0` block. Many printers drop larger raster blocks.
pub const MAX_BAND_ROWS: u32 = 960;

/// Lines fed before the cutter so the last row clears the blade
const FEED_BEFORE_CUT: u8 = 3;

/// ESC/POS Command Builder
#[derive(Debug, Default)]
pub struct ESCPOSBuilder {
    buffer: Vec<u8>,
}

impl ESCPOSBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the built command buffer
    pub fn build(self) -> Vec<u8> {
        self.buffer
    }

    /// Initialize printer
    pub fn initialize(&mut self) -> &mut Self {
        self.buffer.extend_from_slice(&[ESC, 0x40]);
        self
    }

    /// Add text
    pub fn text(&mut self, text: &str) -> &mut Self {
        self.buffer.extend_from_slice(text.as_bytes());
        self
    }

    /// Add line feed
    pub fn feed(&mut self, lines: u8) -> &mut Self {
        for _ in 0..lines {
            self.buffer.push(LF);
        }
        self
    }

    /// Cut paper
    pub fn cut(&mut self, partial: bool) -> &mut Self {
        self.feed(FEED_BEFORE_CUT);
        self.buffer.extend_from_slice(&[GS, 0x56, if partial { 1 } else { 0 }]);
        self
    }

    /// Print a binarized bitmap as raster bit image blocks (`GS v 0`)
    ///
    /// Tall images are split into bands of at most [`MAX_BAND_ROWS`] rows.
    pub fn raster_image(&mut self, bitmap: &Bitmap) -> &mut Self {
        let byte_width = bitmap.width().div_ceil(8) as u16;
        let height = bitmap.height();

        let mut top = 0;
        while top < height {
            let rows = (height - top).min(MAX_BAND_ROWS) as u16;

            // m=0 (normal size)
            self.buffer.extend_from_slice(&[GS, 0x76, 0x30, 0x00]);
            self.buffer.extend_from_slice(&byte_width.to_le_bytes()); // xL xH
            self.buffer.extend_from_slice(&rows.to_le_bytes()); // yL yH

            for y in top..top + rows as u32 {
                self.buffer.extend_from_slice(&bitmap.packed_row(y));
            }
            top += rows as u32;
        }

        self
    }
}

/// Full byte stream for one printed bitmap: reset, image, newline, cut
pub fn format_receipt(bitmap: &Bitmap) -> Vec<u8> {
    let mut builder = ESCPOSBuilder::new();

    builder
        .initialize()
        .raster_image(bitmap)
        .text("\n")
        .cut(false);

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::bitmap::to_printable;
    use image::{DynamicImage, GrayImage, Luma};

    fn solid(width: u32, height: u32) -> Bitmap {
        let img = GrayImage::from_pixel(width, height, Luma([0]));
        to_printable(&DynamicImage::ImageLuma8(img), width).unwrap()
    }

    #[test]
    fn test_initialize_and_cut() {
        let mut builder = ESCPOSBuilder::new();
        builder.initialize().cut(true);
        assert_eq!(builder.build(), vec![ESC, 0x40, LF, LF, LF, GS, 0x56, 1]);
    }

    #[test]
    fn test_raster_header() {
        let bitmap = solid(576, 10);
        let mut builder = ESCPOSBuilder::new();
        builder.raster_image(&bitmap);
        let bytes = builder.build();

        assert_eq!(&bytes[..8], &[GS, 0x76, 0x30, 0x00, 72, 0, 10, 0]);
        assert_eq!(bytes.len(), 8 + 72 * 10);
        assert!(bytes[8..].iter().all(|&b| b == 0xff));
    }

    #[test]
    fn test_tall_image_is_banded() {
        let bitmap = solid(8, 2000);
        let mut builder = ESCPOSBuilder::new();
        builder.raster_image(&bitmap);
        let bytes = builder.build();

        // 960 + 960 + 80 rows, one byte per row, 8-byte header per band
        assert_eq!(bytes.len(), 3 * 8 + 2000);
        assert_eq!(&bytes[..8], &[GS, 0x76, 0x30, 0x00, 1, 0, 0xc0, 0x03]);
        assert_eq!(&bytes[968..976], &[GS, 0x76, 0x30, 0x00, 1, 0, 0xc0, 0x03]);
        assert_eq!(&bytes[1936..1944], &[GS, 0x76, 0x30, 0x00, 1, 0, 80, 0]);
    }

    #[test]
    fn test_format_receipt_layout() {
        let bitmap = solid(16, 2);
        let bytes = format_receipt(&bitmap);

        assert_eq!(&bytes[..2], &[ESC, 0x40]);
        assert_eq!(&bytes[2..6], &[GS, 0x76, 0x30, 0x00]);
        assert_eq!(
            &bytes[bytes.len() - 7..],
            &[LF, LF, LF, LF, GS, 0x56, 0]
        );
    }
}
