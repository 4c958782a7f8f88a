// Integration tests for the rendered bitmap → ESC/POS byte stream

mod common;

use common::MockRasterizer;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use task_printer_daemon::escpos::{format_receipt, MAX_BAND_ROWS};
use task_printer_daemon::queue::PrintJob;
use task_printer_daemon::render::{Bitmap, RenderSource, Renderer};

const GS_V_0: [u8; 4] = [0x1d, 0x76, 0x30, 0x00];

/// Raster band headers as (byte_width, rows), walking the stream after `ESC @`
fn raster_bands(stream: &[u8]) -> (Vec<(usize, usize)>, &[u8]) {
    assert_eq!(&stream[..2], &[0x1b, 0x40]);
    let mut rest = &stream[2..];
    let mut bands = Vec::new();

    while rest.starts_with(&GS_V_0) {
        let byte_width = u16::from_le_bytes([rest[4], rest[5]]) as usize;
        let rows = u16::from_le_bytes([rest[6], rest[7]]) as usize;
        bands.push((byte_width, rows));
        rest = &rest[8 + byte_width * rows..];
    }
    (bands, rest)
}

async fn render(job: &PrintJob) -> Bitmap {
    let renderer = Renderer::new(Arc::new(MockRasterizer::new()), 576, 2000);
    renderer.render(RenderSource::Job(job)).await.unwrap()
}

#[tokio::test]
async fn test_receipt_stream_layout() {
    let job = PrintJob::new(
        Some("Water plants".into()),
        Some("front\nback".into()),
        Some("low".into()),
        Some("Friday".into()),
    );
    let bitmap = render(&job).await;
    let stream = format_receipt(&bitmap);

    let (bands, tail) = raster_bands(&stream);

    assert_eq!(bands, vec![(72, bitmap.height() as usize)]);
    // newline, feed before cut, full cut
    assert_eq!(tail, &[0x0a, 0x0a, 0x0a, 0x0a, 0x1d, 0x56, 0x00]);
}

#[tokio::test]
async fn test_long_receipt_is_split_into_bands() {
    let description = vec!["step"; 120].join("\n");
    let job = PrintJob::new(Some("Checklist".into()), Some(description), None, None);
    let bitmap = render(&job).await;
    // 10 + 10 * 119 rows of content
    assert_eq!(bitmap.height(), 1200);

    let (bands, _) = raster_bands(&format_receipt(&bitmap));

    assert_eq!(bands, vec![(72, MAX_BAND_ROWS as usize), (72, 240)]);
    assert!(bands.iter().all(|&(_, rows)| rows <= MAX_BAND_ROWS as usize));
}

#[tokio::test]
async fn test_bitmap_rows_are_packed_black_dots() {
    let job = PrintJob::new(Some("Solid".into()), None, None, None);
    let bitmap = render(&job).await;
    let stream = format_receipt(&bitmap);

    // The mock band is solid black across the full width
    let first_row = &stream[2 + 8..2 + 8 + 72];
    assert!(first_row.iter().all(|&b| b == 0xff));
}
