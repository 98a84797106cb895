//! Pure Rust image backend, plus libwebp for lossy WebP.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (PNG, JPEG, TIFF, WebP) | `image` crate decoders |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → WebP (lossy) | `webp::Encoder` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |
//!
//! The `image` crate's own WebP encoder is lossless-only, which would make the
//! "efficient" format larger than the JPEG fallback.

use super::backend::{BackendError, ImageBackend, SourceImage};
use super::params::{EncodeParams, Quality};
use crate::types::Format;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::path::Path;
use std::sync::LazyLock;

/// Extensions whose decoders are compiled in.
const SOURCE_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("png", ImageFormat::Png),
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("webp", ImageFormat::WebP),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    SOURCE_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of source file extensions that can be decoded.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Whether `path` has a decodable extension (case-insensitive).
pub fn is_supported_source(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            supported_input_extensions()
                .iter()
                .any(|s| s.eq_ignore_ascii_case(ext))
        })
}

/// Backend built on the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn encode(img: &DynamicImage, format: Format, quality: Quality) -> Result<Vec<u8>, BackendError> {
    match format {
        Format::Webp => encode_webp(img, quality),
        Format::Jpg => encode_jpeg(img, quality),
        Format::Png => encode_png(img, quality),
    }
}

/// Lossy WebP. libwebp only takes 8-bit RGB/RGBA, so other layouts are
/// converted first, keeping alpha when present.
fn encode_webp(img: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let converted;
    let img = match img {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => img,
        other if other.color().has_alpha() => {
            converted = DynamicImage::ImageRgba8(other.to_rgba8());
            &converted
        }
        other => {
            converted = DynamicImage::ImageRgb8(other.to_rgb8());
            &converted
        }
    };
    let encoder = webp::Encoder::from_image(img).map_err(|e| BackendError::Encode {
        format: Format::Webp,
        message: e.to_string(),
    })?;
    Ok(encoder.encode(quality.value() as f32).to_vec())
}

/// JPEG has no alpha channel; anything other than 8-bit RGB/luma is
/// flattened to RGB8.
fn encode_jpeg(img: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let converted;
    let img = match img {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageLuma8(_) => img,
        other => {
            converted = DynamicImage::ImageRgb8(other.to_rgb8());
            &converted
        }
    };
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality.value().clamp(1, 100) as u8);
    img.write_with_encoder(encoder)
        .map_err(|e| BackendError::Encode {
            format: Format::Jpg,
            message: e.to_string(),
        })?;
    Ok(buf)
}

/// PNG is lossless, so "quality" picks the compression effort.
fn encode_png(img: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let compression = match quality.value() {
        90.. => CompressionType::Best,
        50..=89 => CompressionType::Default,
        _ => CompressionType::Fast,
    };
    let mut buf = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut buf, compression, PngFilter::Adaptive);
    img.write_with_encoder(encoder)
        .map_err(|e| BackendError::Encode {
            format: Format::Png,
            message: e.to_string(),
        })?;
    Ok(buf)
}

impl ImageBackend for RustBackend {
    fn decode(&self, path: &Path) -> Result<DynamicImage, BackendError> {
        ImageReader::open(path)?
            .with_guessed_format()?
            .decode()
            .map_err(|e| BackendError::Decode {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }

    fn resize(&self, source: &SourceImage, params: &EncodeParams) -> Result<Vec<u8>, BackendError> {
        let resized = source
            .pixels()
            .resize_exact(params.width, params.height, FilterType::Lanczos3);
        encode(&resized, params.format, params.quality)
    }
}
