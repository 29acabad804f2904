//! Image validation and normalization for user uploads.
//!
//! Uploads are sniffed by magic bytes, decoded, downscaled and re-encoded,
//! which also drops any embedded metadata (EXIF, GPS, comments).

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageReader, Limits};

use crate::errors::AppError;

pub const MAX_DIMENSION: u32 = 1024;
/// Largest source image we agree to decode.
pub const MAX_SOURCE_DIMENSION: u32 = 8192;
const MAX_DECODE_ALLOC_BYTES: u64 = 256 * 1024 * 1024;
const JPEG_QUALITY: u8 = 85;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Webp,
    Gif,
}

impl ImageKind {
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(ImageKind::Jpeg),
            "image/png" => Some(ImageKind::Png),
            "image/webp" => Some(ImageKind::Webp),
            "image/gif" => Some(ImageKind::Gif),
            _ => None,
        }
    }

    /// Detects the format from the file signature.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageKind::Jpeg)
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(ImageKind::Png)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(ImageKind::Gif)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(ImageKind::Webp)
        } else {
            None
        }
    }
}

/// Re-encoded image ready for storage.
#[derive(Debug)]
pub struct ProcessedImage {
    pub bytes: Bytes,
    pub mime_type: &'static str,
    pub extension: &'static str,
    pub width: u32,
    pub height: u32,
}

/// Checks declared type, size and signature before any decoding.
pub fn validate_upload(
    declared_mime: Option<&str>,
    bytes: &[u8],
    max_bytes: usize,
) -> Result<ImageKind, AppError> {
    let declared = declared_mime
        .and_then(ImageKind::from_mime)
        .ok_or_else(|| {
            AppError::UnsupportedMediaType(
                "Only JPEG, PNG, WebP and GIF images are accepted".to_string(),
            )
        })?;

    if bytes.is_empty() {
        return Err(AppError::Validation("Uploaded file is empty".to_string()));
    }
    if bytes.len() > max_bytes {
        return Err(AppError::PayloadTooLarge(format!(
            "File exceeds the {} byte limit",
            max_bytes
        )));
    }

    match ImageKind::sniff(bytes) {
        Some(actual) if actual == declared => Ok(declared),
        _ => Err(AppError::UnsupportedMediaType(
            "File contents do not match the declared image type".to_string(),
        )),
    }
}

fn decode_limits() -> Limits {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_SOURCE_DIMENSION);
    limits.max_image_height = Some(MAX_SOURCE_DIMENSION);
    limits.max_alloc = Some(MAX_DECODE_ALLOC_BYTES);
    limits
}

/// Header dimensions are checked before pixel buffers are allocated.
fn decode_limited(bytes: &[u8]) -> Result<DynamicImage, AppError> {
    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| AppError::Validation(format!("Could not read image: {e}")))?;
    reader.limits(decode_limits());
    reader
        .decode()
        .map_err(|e| AppError::Validation(format!("Could not decode image: {e}")))
}

/// Decodes, fits within `MAX_DIMENSION` and re-encodes: PNG when the image
/// has an alpha channel, JPEG otherwise. CPU-bound; call from `spawn_blocking`.
pub fn process_image(bytes: &[u8]) -> Result<ProcessedImage, AppError> {
    let img = decode_limited(bytes)?;

    let (width, height) = img.dimensions();
    let img = if width > MAX_DIMENSION || height > MAX_DIMENSION {
        img.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Triangle)
    } else {
        img
    };
    let (width, height) = img.dimensions();

    let mut out = Cursor::new(Vec::new());
    let (mime_type, extension) = if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
            .write_with_encoder(PngEncoder::new(&mut out))
            .map_err(|e| AppError::Internal(e.into()))?;
        ("image/png", "png")
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
            .write_with_encoder(JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY))
            .map_err(|e| AppError::Internal(e.into()))?;
        ("image/jpeg", "jpg")
    };

    Ok(ProcessedImage {
        bytes: Bytes::from(out.into_inner()),
        mime_type,
        extension,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_sniff_signatures() {
        assert_eq!(ImageKind::sniff(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::sniff(b"GIF89a...."), Some(ImageKind::Gif));
        assert_eq!(ImageKind::sniff(b"RIFF\0\0\0\0WEBPVP8 "), Some(ImageKind::Webp));
        assert_eq!(ImageKind::sniff(b"%PDF-1.7"), None);
    }

    #[test]
    fn test_rejects_unlisted_mime() {
        let err = validate_upload(Some("application/pdf"), b"%PDF-1.7", 1024).unwrap_err();
        assert!(matches!(err, AppError::UnsupportedMediaType(_)));
        let err = validate_upload(None, b"GIF89a", 1024).unwrap_err();
        assert!(matches!(err, AppError::UnsupportedMediaType(_)));
    }

    #[test]
    fn test_rejects_signature_mismatch() {
        let png = encode(DynamicImage::ImageRgb8(RgbImage::new(2, 2)), ImageFormat::Png);
        let err = validate_upload(Some("image/jpeg"), &png, 1 << 20).unwrap_err();
        assert!(matches!(err, AppError::UnsupportedMediaType(_)));
        assert_eq!(
            validate_upload(Some("image/png"), &png, 1 << 20).unwrap(),
            ImageKind::Png
        );
    }

    #[test]
    fn test_rejects_oversize() {
        let png = encode(DynamicImage::ImageRgb8(RgbImage::new(2, 2)), ImageFormat::Png);
        let err = validate_upload(Some("image/png"), &png, 10).unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge(_)));
    }

    #[test]
    fn test_large_opaque_png_becomes_downscaled_jpeg() {
        let img = RgbImage::from_pixel(2048, 1024, Rgb([200, 30, 30]));
        let png = encode(DynamicImage::ImageRgb8(img), ImageFormat::Png);

        let processed = process_image(&png).unwrap();
        assert_eq!(processed.mime_type, "image/jpeg");
        assert_eq!(processed.extension, "jpg");
        assert_eq!((processed.width, processed.height), (1024, 512));
        assert_eq!(ImageKind::sniff(&processed.bytes), Some(ImageKind::Jpeg));
    }

    #[test]
    fn test_transparent_image_stays_png() {
        let img = RgbaImage::from_pixel(64, 32, Rgba([0, 0, 0, 0]));
        let png = encode(DynamicImage::ImageRgba8(img), ImageFormat::Png);

        let processed = process_image(&png).unwrap();
        assert_eq!(processed.mime_type, "image/png");
        assert_eq!((processed.width, processed.height), (64, 32));
    }

    #[test]
    fn test_oversized_source_rejected_before_decoding() {
        let img = RgbImage::new(MAX_SOURCE_DIMENSION + 1, 1);
        let png = encode(DynamicImage::ImageRgb8(img), ImageFormat::Png);

        let err = process_image(&png).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_garbage_fails_to_decode() {
        let err = process_image(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0]).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
