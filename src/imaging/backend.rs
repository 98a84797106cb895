//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations every backend must
//! support: decode a source file, and resize-then-encode a decoded image.
//! Backends return encoded bytes and never touch the output directory, so the
//! orchestrator owns every write and can tell encode failures from write
//! failures.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend).

use super::params::EncodeParams;
use crate::types::Format;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },
    #[error("{format} encode failed: {message}")]
    Encode { format: Format, message: String },
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// A decoded source raster tagged with its logical name.
///
/// Read-only once decoded. Every encode for the image borrows the same
/// buffer.
#[derive(Debug)]
pub struct SourceImage {
    logical_name: String,
    pixels: DynamicImage,
}

impl SourceImage {
    pub fn new(logical_name: impl Into<String>, pixels: DynamicImage) -> Self {
        Self {
            logical_name: logical_name.into(),
            pixels,
        }
    }

    pub fn logical_name(&self) -> &str {
        &self.logical_name
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.pixels.width(),
            height: self.pixels.height(),
        }
    }

    /// Number of channels in the decoded layout (1 = luma, 2 = luma+alpha,
    /// 3 = RGB, 4 = RGBA).
    pub fn channel_count(&self) -> u8 {
        self.pixels.color().channel_count()
    }

    pub fn pixels(&self) -> &DynamicImage {
        &self.pixels
    }
}

/// Trait for image processing backends.
pub trait ImageBackend: Sync {
    /// Decode a source file into pixels.
    fn decode(&self, path: &Path) -> Result<DynamicImage, BackendError>;

    /// Resize `source` to the exact dimensions in `params` and encode it.
    fn resize(&self, source: &SourceImage, params: &EncodeParams) -> Result<Vec<u8>, BackendError>;
}
