//! High-level image operations.
//!
//! These functions combine calculations with backend execution: decode a
//! source, decide its fallback format, plan every artifact it needs, and
//! encode one planned artifact. Writing to disk is left to the caller.

use super::backend::{BackendError, ImageBackend, SourceImage};
use super::calculations::{plan_target_sizes, scaled_height};
use super::params::{EncodeParams, EncodeQualities, UpscalePolicy};
use crate::naming;
use crate::types::{FormatCatalog, MODERN_FORMAT, SizeCatalog};
use std::path::Path;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Decode `path` and tag it with `logical_name`.
pub fn decode_source(
    backend: &impl ImageBackend,
    path: &Path,
    logical_name: &str,
) -> Result<SourceImage> {
    let pixels = backend.decode(path)?;
    Ok(SourceImage::new(logical_name, pixels))
}

/// Decide the format catalog for a decoded image.
///
/// Alpha is a property of the channel layout, not of the pixels: an RGBA
/// image whose every pixel is opaque still gets a PNG fallback. Luma+alpha
/// counts as alpha for the same reason: a two-channel source keeps its
/// transparency, where a test for exactly four channels would send it to JPEG.
pub fn decide_format(source: &SourceImage) -> FormatCatalog {
    FormatCatalog::for_alpha(source.pixels().color().has_alpha())
}

/// What a planned artifact is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// A catalog entry, named after the catalog width.
    Variant { target: u32 },
    Placeholder,
}

/// One artifact to encode and write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedArtifact {
    pub kind: ArtifactKind,
    /// Path relative to the artifact root, from [`naming`].
    pub path: String,
    pub params: EncodeParams,
}

impl PlannedArtifact {
    /// Short human label, e.g. `webp 300px` or `placeholder`.
    pub fn label(&self) -> String {
        match self.kind {
            ArtifactKind::Variant { target } => format!("{} {}px", self.params.format, target),
            ArtifactKind::Placeholder => "placeholder".to_string(),
        }
    }
}

/// Configuration for variant generation.
#[derive(Debug, Clone)]
pub struct VariantConfig {
    pub sizes: SizeCatalog,
    pub qualities: EncodeQualities,
    pub upscale: UpscalePolicy,
}

impl Default for VariantConfig {
    fn default() -> Self {
        Self {
            sizes: SizeCatalog::default(),
            qualities: EncodeQualities::default(),
            upscale: UpscalePolicy::default(),
        }
    }
}

/// Plan every (width, format) variant for one image.
///
/// Returns `|sizes| × 2` entries: all modern-format widths, then all
/// fallback-format widths, each ascending.
pub fn plan_variants(
    source: &SourceImage,
    catalog: FormatCatalog,
    config: &VariantConfig,
) -> Vec<PlannedArtifact> {
    let dims = source.dimensions();
    let sizes = plan_target_sizes(
        (dims.width, dims.height),
        config.sizes.widths(),
        config.upscale,
    );
    let sizes = sizes.as_slice();

    catalog
        .formats()
        .into_iter()
        .flat_map(|format| {
            sizes.iter().map(move |size| PlannedArtifact {
                kind: ArtifactKind::Variant {
                    target: size.target,
                },
                path: naming::variant_path(source.logical_name(), size.target, format),
                params: EncodeParams {
                    width: size.width,
                    height: size.height,
                    format,
                    quality: config.qualities.for_format(format),
                },
            })
        })
        .collect()
}

/// Plan the blur-up placeholder: `size` pixels wide, modern format.
///
/// The placeholder is always a downscale; a source narrower than `size`
/// keeps its own width.
pub fn plan_placeholder(
    source: &SourceImage,
    size: u32,
    qualities: &EncodeQualities,
) -> PlannedArtifact {
    let dims = source.dimensions();
    let width = size.min(dims.width).max(1);
    PlannedArtifact {
        kind: ArtifactKind::Placeholder,
        path: naming::placeholder_path(source.logical_name(), size),
        params: EncodeParams {
            width,
            height: scaled_height((dims.width, dims.height), width),
            format: MODERN_FORMAT,
            quality: qualities.modern,
        },
    }
}

/// Encode one planned artifact.
pub fn encode_artifact(
    backend: &impl ImageBackend,
    source: &SourceImage,
    artifact: &PlannedArtifact,
) -> Result<Vec<u8>> {
    backend.resize(source, &artifact.params)
}
