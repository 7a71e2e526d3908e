//! Screenshot normalisation before extraction.
//!
//! Screenshots arrive as anything from crisp PNGs to thrice-recompressed
//! JPEGs of a phone photo. A mild contrast boost and an unsharp mask make
//! small UI text (handles, timestamps, counters) noticeably more legible to
//! vision models without changing what the screenshot says.
//!
//! ## Why always re-encode as PNG?
//!
//! The output feeds a vision model, not a human. PNG is lossless, so with
//! no transform requested the output decodes to exactly the input pixels,
//! whatever the input encoding was. Re-encoding JPEG → JPEG would not.
//!
//! ## Why spawn_blocking?
//!
//! Decoding, per-pixel adjustment and Gaussian blur are CPU-bound and take
//! tens of milliseconds on a large screenshot; [`preprocess_image`] moves
//! them off the async worker threads.

use crate::config::PreprocessOptions;
use crate::error::PostcardError;
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;
use tracing::debug;

/// MIME type of every image produced here.
pub const OUTPUT_MIME: &str = "image/png";

/// Unsharp-mask radius. Light enough not to halo anti-aliased text.
const SHARPEN_SIGMA: f32 = 1.0;
/// Minimum local difference before the mask applies.
const SHARPEN_THRESHOLD: i32 = 1;

/// Normalise `bytes` according to `options`; returns PNG bytes.
///
/// Contrast, then brightness, then sharpening. Pure: the same input and
/// options always give the same output.
///
/// # Errors
/// [`PostcardError::ImageDecode`] when `bytes` is not a decodable image.
pub fn preprocess(bytes: &[u8], options: &PreprocessOptions) -> Result<Vec<u8>, PostcardError> {
    let img = image::load_from_memory(bytes).map_err(|e| PostcardError::ImageDecode {
        detail: e.to_string(),
    })?;
    debug!(
        "Decoded screenshot {}x{} ({:?})",
        img.width(),
        img.height(),
        img.color()
    );

    let out = if options.is_identity() {
        img
    } else {
        DynamicImage::ImageRgba8(adjust(img.to_rgba8(), options))
    };

    let mut buf = Vec::new();
    out.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| PostcardError::Internal(format!("PNG encoding failed: {e}")))?;
    debug!("Preprocessed screenshot → {} bytes PNG", buf.len());
    Ok(buf)
}

/// [`preprocess`] on the blocking thread pool.
pub async fn preprocess_image(
    bytes: Vec<u8>,
    options: PreprocessOptions,
) -> Result<Vec<u8>, PostcardError> {
    tokio::task::spawn_blocking(move || preprocess(&bytes, &options))
        .await
        .map_err(|e| PostcardError::Internal(format!("Preprocess task panicked: {}", e)))?
}

fn adjust(mut img: RgbaImage, options: &PreprocessOptions) -> RgbaImage {
    if let Some(contrast) = options.contrast {
        // v' = a·(v − 128) + 128 keeps mid-grey fixed.
        map_rgb(&mut img, |v| contrast * (v - 128.0) + 128.0);
    }
    if let Some(brightness) = options.brightness {
        map_rgb(&mut img, |v| v * brightness);
    }
    if options.sharpen {
        img = image::imageops::unsharpen(&img, SHARPEN_SIGMA, SHARPEN_THRESHOLD);
    }
    img
}

/// Apply `f` to the colour channels of every pixel, leaving alpha alone.
fn map_rgb(img: &mut RgbaImage, f: impl Fn(f32) -> f32) {
    for pixel in img.pixels_mut() {
        for channel in pixel.0.iter_mut().take(3) {
            *channel = f(f32::from(*channel)).round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Best-effort MIME type of an encoded image, from its magic bytes.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::Bmp => Some("image/bmp"),
        ImageFormat::Tiff => Some("image/tiff"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb, Rgba};

    fn png(img: &DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn gradient() -> DynamicImage {
        DynamicImage::ImageRgba8(ImageBuffer::from_fn(16, 8, |x, y| {
            Rgba([(x * 16) as u8, (y * 30) as u8, 200, 255 - x as u8])
        }))
    }

    #[test]
    fn no_options_preserves_pixels() {
        let src = gradient();
        let out = preprocess(&png(&src), &PreprocessOptions::default()).unwrap();
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.to_rgba8(), src.to_rgba8());
    }

    #[test]
    fn no_options_preserves_jpeg_pixels() {
        let rgb = DynamicImage::ImageRgb8(ImageBuffer::from_fn(8, 8, |x, y| {
            Rgb([(x * 30) as u8, (y * 30) as u8, 90])
        }));
        let mut jpeg = Vec::new();
        rgb.write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
            .unwrap();
        let original = image::load_from_memory(&jpeg).unwrap();

        let out = preprocess(&jpeg, &PreprocessOptions::default()).unwrap();
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.to_rgb8(), original.to_rgb8());
        assert_eq!(sniff_mime(&out), Some("image/png"));
    }

    #[test]
    fn contrast_stretches_around_midpoint() {
        let src = DynamicImage::ImageRgba8(ImageBuffer::from_fn(3, 1, |x, _| match x {
            0 => Rgba([100, 100, 100, 255]),
            1 => Rgba([128, 128, 128, 255]),
            _ => Rgba([200, 200, 200, 77]),
        }));
        let opts = PreprocessOptions {
            contrast: Some(2.0),
            brightness: None,
            sharpen: false,
        };
        let out = image::load_from_memory(&preprocess(&png(&src), &opts).unwrap())
            .unwrap()
            .to_rgba8();
        assert_eq!(out.get_pixel(0, 0).0, [72, 72, 72, 255]);
        assert_eq!(out.get_pixel(1, 0).0, [128, 128, 128, 255]);
        // 2·(200−128)+128 = 272 → clamped; alpha untouched
        assert_eq!(out.get_pixel(2, 0).0, [255, 255, 255, 77]);
    }

    #[test]
    fn brightness_applies_after_contrast() {
        let src = DynamicImage::ImageRgba8(ImageBuffer::from_pixel(1, 1, Rgba([100, 100, 100, 255])));
        let opts = PreprocessOptions {
            contrast: Some(2.0),
            brightness: Some(0.5),
            sharpen: false,
        };
        let out = image::load_from_memory(&preprocess(&png(&src), &opts).unwrap())
            .unwrap()
            .to_rgba8();
        // contrast: 72, then brightness: 36
        assert_eq!(out.get_pixel(0, 0).0, [36, 36, 36, 255]);
    }

    #[test]
    fn preprocessing_is_deterministic() {
        let bytes = png(&gradient());
        let opts = PreprocessOptions::screenshot_default();
        assert_eq!(
            preprocess(&bytes, &opts).unwrap(),
            preprocess(&bytes, &opts).unwrap()
        );
    }

    #[test]
    fn garbage_is_image_decode_error() {
        let err = preprocess(b"definitely not an image", &PreprocessOptions::default()).unwrap_err();
        assert!(matches!(err, PostcardError::ImageDecode { .. }), "got: {err:?}");
    }

    #[test]
    fn sniffs_common_formats() {
        assert_eq!(sniff_mime(&png(&gradient())), Some("image/png"));
        assert_eq!(sniff_mime(b"nope"), None);
    }

    #[tokio::test]
    async fn async_wrapper_matches_sync() {
        let bytes = png(&gradient());
        let opts = PreprocessOptions::screenshot_default();
        let sync = preprocess(&bytes, &opts).unwrap();
        let r#async = preprocess_image(bytes, opts).await.unwrap();
        assert_eq!(sync, r#async);
    }
}
