//! QR code encoding and decoding.
//!
//! Two halves with very different failure models:
//!
//! - **Encoding** turns a resource's code payload into a PNG raster. It is
//!   deterministic for identical `(payload, size)` pairs and fails loudly
//!   with `EncodeFailed`: callers must show a pending/error presentation
//!   instead of a stale image.
//! - **Decoding** consumes a continuous feed of camera frames. Individual
//!   frames that carry no readable code are simply skipped; a misread is
//!   never an error, because interrupting a live scan for per-frame noise
//!   would make the scanner unusable.

use image::{GrayImage, ImageBuffer, Luma};
use qrcode::QrCode;
use tokio::sync::mpsc;

use crate::error::AppError;

/// Side length of the quiet margin around the code, in modules.
const QUIET_MODULES: u32 = 1;

/// Render a code payload as a square PNG image.
///
/// # Arguments
///
/// * `payload` - The string to embed (a resource URL or id)
/// * `size_px` - Side length of the produced image in pixels
///
/// # Image Properties
///
/// - Square raster of exactly `size_px` per side
/// - Greyscale PNG, dark modules on white
/// - Quiet margin of one module on every side
///
/// # Determinism
///
/// Pure function of its arguments: repeated calls with the same payload and
/// size produce byte-identical PNGs.
///
/// # Errors
///
/// Returns `EncodeFailed` if the payload is empty, exceeds QR capacity, or
/// `size_px` is zero.
pub fn encode_png(payload: &str, size_px: u32) -> Result<Vec<u8>, AppError> {
    if payload.is_empty() {
        return Err(AppError::EncodeFailed("payload is empty".to_string()));
    }
    if size_px == 0 {
        return Err(AppError::EncodeFailed("size must be positive".to_string()));
    }

    let code = QrCode::new(payload.as_bytes())
        .map_err(|e| AppError::EncodeFailed(e.to_string()))?;

    // Scale whole modules up to the requested size, margin included
    let modules = code.width() as u32;
    let total_modules = modules + 2 * QUIET_MODULES;
    let scale = (size_px / total_modules).max(1);

    let rendered: GrayImage = code
        .render::<Luma<u8>>()
        .quiet_zone(false)
        .module_dimensions(scale, scale)
        .build();

    // Paint the rendered code onto a white canvas with the quiet margin
    let canvas_side = total_modules * scale;
    let mut canvas: GrayImage =
        ImageBuffer::from_pixel(canvas_side, canvas_side, Luma([255u8]));
    image::imageops::replace(
        &mut canvas,
        &rendered,
        (QUIET_MODULES * scale) as i64,
        (QUIET_MODULES * scale) as i64,
    );

    // Snap to the exact requested side length
    let finished = if canvas_side == size_px {
        canvas
    } else {
        image::imageops::resize(
            &canvas,
            size_px,
            size_px,
            image::imageops::FilterType::Nearest,
        )
    };

    let mut png = Vec::new();
    image::DynamicImage::ImageLuma8(finished)
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| AppError::EncodeFailed(e.to_string()))?;

    Ok(png)
}

/// Try to read a QR code out of one greyscale camera frame.
///
/// Returns the decoded text, or `None` when the frame holds no readable
/// code. Detection and decode errors are both treated as "no code in this
/// frame"; the caller just waits for the next one.
pub fn decode_frame(frame: &GrayImage) -> Option<String> {
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        frame.width() as usize,
        frame.height() as usize,
        |x, y| frame.get_pixel(x as u32, y as u32).0[0],
    );

    let grids = prepared.detect_grids();
    let grid = grids.first()?;

    match grid.decode() {
        Ok((_meta, content)) if !content.is_empty() => Some(content),
        Ok(_) => None,
        Err(err) => {
            // Transient misread; the feed keeps going
            tracing::trace!(error = %err, "frame did not decode");
            None
        }
    }
}

/// Turn a stream of camera frames into a stream of decoded-text events.
///
/// Each successfully read frame yields exactly one decoded string; frames
/// with no readable code yield nothing. The returned channel stays open for
/// as long as the frame feed does, so one call covers an entire scanning
/// session. Dropping the returned receiver stops the decode loop.
pub fn decoded_texts(mut frames: mpsc::Receiver<GrayImage>) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);

    tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            if let Some(text) = decode_frame(&frame) {
                if tx.send(text).await.is_err() {
                    // Consumer went away; no one is scanning anymore
                    break;
                }
            }
        }
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Decode PNG bytes back into a greyscale frame, as if a camera had a
    /// perfect view of the printed code.
    fn frame_from_png(png: &[u8]) -> GrayImage {
        image::load_from_memory(png).unwrap().to_luma8()
    }

    #[test]
    fn encode_is_deterministic() {
        let a = encode_png("https://forms.example/abc", 260).unwrap();
        let b = encode_png("https://forms.example/abc", 260).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn encode_produces_exact_square_side() {
        for size in [160, 200, 260] {
            let png = encode_png("550e8400-e29b-41d4-a716-446655440000", size).unwrap();
            let img = frame_from_png(&png);
            assert_eq!(img.width(), size);
            assert_eq!(img.height(), size);
        }
    }

    #[test]
    fn empty_payload_fails_to_encode() {
        assert!(matches!(
            encode_png("", 260),
            Err(AppError::EncodeFailed(_))
        ));
    }

    #[test]
    fn zero_size_fails_to_encode() {
        assert!(matches!(
            encode_png("abc", 0),
            Err(AppError::EncodeFailed(_))
        ));
    }

    #[test]
    fn oversized_payload_fails_to_encode() {
        let huge = "x".repeat(8000);
        assert!(matches!(
            encode_png(&huge, 260),
            Err(AppError::EncodeFailed(_))
        ));
    }

    #[test]
    fn encoded_code_decodes_back_to_payload() {
        for payload in [
            "550e8400-e29b-41d4-a716-446655440000",
            "https://forms.example/abc",
        ] {
            let png = encode_png(payload, 260).unwrap();
            let frame = frame_from_png(&png);
            assert_eq!(decode_frame(&frame).as_deref(), Some(payload));
        }
    }

    #[test]
    fn blank_frame_yields_no_event() {
        let blank = GrayImage::from_pixel(200, 200, Luma([128u8]));
        assert_eq!(decode_frame(&blank), None);
    }

    #[tokio::test]
    async fn decoded_texts_filters_unreadable_frames() {
        let (tx, rx) = mpsc::channel(8);
        let mut texts = decoded_texts(rx);

        // Noise first, then a readable code
        tx.send(GrayImage::from_pixel(200, 200, Luma([128u8])))
            .await
            .unwrap();
        let png = encode_png("https://forms.example/abc", 260).unwrap();
        tx.send(frame_from_png(&png)).await.unwrap();
        drop(tx);

        assert_eq!(texts.recv().await.as_deref(), Some("https://forms.example/abc"));
        // Feed closed, noise frame produced nothing
        assert_eq!(texts.recv().await, None);
    }
}
