//! Image composer: stack a batch's page rasters into one composite.
//!
//! The composite is as wide as the widest page and as tall as all pages put
//! together; each page is drawn at x = 0, at a cumulative vertical offset, in
//! batch order, so the first page of the batch sits at the top. Narrower
//! pages are left-aligned against a white canvas — no scaling, no centring.
//! That width mismatch is an accepted limitation of the composition contract,
//! not something this stage corrects.
//!
//! Composites exist for transmission only: they are JPEG-encoded at the
//! configured quality, handed to the upload/inference collaborators, and
//! dropped. Nothing here touches the network or the disk.

use image::{imageops, DynamicImage, Rgb, RgbImage};
use std::io::Cursor;
use thiserror::Error;
use tracing::debug;

/// A failed composition or encode. Fatal for the batch only — the caller
/// skips the batch and continues with its siblings.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("batch contains no page images")]
    EmptyBatch,

    #[error("zero-dimension page raster ({width}x{height})")]
    ZeroDimension { width: u32, height: u32 },

    #[error(transparent)]
    Encode(#[from] image::ImageError),
}

/// Stack `images` vertically into a single composite raster.
///
/// Output width is the maximum input width, output height the sum of input
/// heights. JPEG has no alpha channel, so pages are flattened to RGB here
/// rather than at encode time.
pub fn compose_batch(images: &[DynamicImage]) -> Result<RgbImage, ComposeError> {
    if images.is_empty() {
        return Err(ComposeError::EmptyBatch);
    }
    for img in images {
        if img.width() == 0 || img.height() == 0 {
            return Err(ComposeError::ZeroDimension {
                width: img.width(),
                height: img.height(),
            });
        }
    }

    let width = images.iter().map(|i| i.width()).max().unwrap_or(0);
    let height: u32 = images.iter().map(|i| i.height()).sum();

    let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    let mut offset_y: i64 = 0;
    for img in images {
        imageops::replace(&mut canvas, &img.to_rgb8(), 0, offset_y);
        offset_y += i64::from(img.height());
    }

    debug!("Composed {} pages → {}x{} px", images.len(), width, height);
    Ok(canvas)
}

/// Encode a composite for transmission.
///
/// Quality is configurable but defaults to 100 — the composite is lossy only
/// in format, not in practice, because compression artefacts on rendered text
/// cost extraction accuracy.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, ComposeError> {
    let mut buf = Vec::new();
    let encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(Cursor::new(&mut buf), quality);
    image.write_with_encoder(encoder)?;
    debug!("Encoded composite → {} bytes JPEG q{}", buf.len(), quality);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn page(width: u32, height: u32, shade: u8) -> DynamicImage {
        DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            width,
            height,
            Rgba([shade, shade, shade, 255]),
        ))
    }

    #[test]
    fn empty_batch_is_an_error() {
        assert!(matches!(compose_batch(&[]), Err(ComposeError::EmptyBatch)));
    }

    #[test]
    fn zero_dimension_page_is_an_error() {
        let imgs = vec![page(10, 10, 0), DynamicImage::new_rgba8(10, 0)];
        assert!(matches!(
            compose_batch(&imgs),
            Err(ComposeError::ZeroDimension { .. })
        ));
    }

    #[test]
    fn dimensions_are_max_width_by_summed_height() {
        let imgs = vec![page(30, 10, 0), page(50, 20, 80), page(40, 5, 160)];
        let composite = compose_batch(&imgs).unwrap();
        assert_eq!(composite.width(), 50);
        assert_eq!(composite.height(), 35);
    }

    #[test]
    fn pages_stack_top_to_bottom_left_aligned() {
        let imgs = vec![page(30, 10, 10), page(50, 20, 200)];
        let composite = compose_batch(&imgs).unwrap();

        // First page occupies the top rows.
        assert_eq!(composite.get_pixel(0, 0).0, [10, 10, 10]);
        assert_eq!(composite.get_pixel(29, 9).0, [10, 10, 10]);
        // Right of the narrow first page: untouched white canvas.
        assert_eq!(composite.get_pixel(40, 5).0, [255, 255, 255]);
        // Second page starts at y = 10.
        assert_eq!(composite.get_pixel(0, 10).0, [200, 200, 200]);
        assert_eq!(composite.get_pixel(49, 29).0, [200, 200, 200]);
    }

    #[test]
    fn single_page_batch_is_identity() {
        let img = page(17, 23, 120);
        let composite = compose_batch(std::slice::from_ref(&img)).unwrap();
        assert_eq!(composite, img.to_rgb8());
    }

    #[test]
    fn encode_produces_jpeg_bytes() {
        let composite = compose_batch(&[page(10, 10, 0)]).unwrap();
        let bytes = encode_jpeg(&composite, 100).unwrap();
        // JPEG SOI marker.
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }
}
