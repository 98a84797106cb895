//! Shared types for the artifact contract.
//!
//! Both sides of the system read these: the build pipeline uses them to decide
//! which files to write, and the runtime resolver uses them to rebuild the URLs
//! of those files. A width or format that one side knows about and the other
//! doesn't is a 404 waiting to happen, so there is exactly one definition of
//! each here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Webp,
    Png,
    Jpg,
}

impl Format {
    /// File extension, which is also the artifact subdirectory name.
    pub fn extension(self) -> &'static str {
        match self {
            Format::Webp => "webp",
            Format::Png => "png",
            Format::Jpg => "jpg",
        }
    }

    pub fn is_lossless(self) -> bool {
        matches!(self, Format::Png)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// The format every image gets, regardless of its channel layout.
pub const MODERN_FORMAT: Format = Format::Webp;

/// Fallback format for an image: PNG keeps transparency, JPEG otherwise.
pub fn fallback_format(has_alpha: bool) -> Format {
    if has_alpha { Format::Png } else { Format::Jpg }
}

/// The two formats produced for one image.
///
/// Built once per source image from the alpha decision and then passed around
/// by value. Nothing downstream re-derives the fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatCatalog {
    pub modern: Format,
    pub fallback: Format,
}

impl FormatCatalog {
    pub fn for_alpha(has_alpha: bool) -> Self {
        Self {
            modern: MODERN_FORMAT,
            fallback: fallback_format(has_alpha),
        }
    }

    pub fn has_alpha(&self) -> bool {
        self.fallback == Format::Png
    }

    /// Modern first, then fallback. Encoding and srcset order both follow this.
    pub fn formats(&self) -> [Format; 2] {
        [self.modern, self.fallback]
    }
}

/// Width used for the plain `src` attribute when the catalog contains it.
pub const DEFAULT_SRC_WIDTH: u32 = 600;

/// Ascending, de-duplicated list of target widths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeCatalog(Vec<u32>);

impl SizeCatalog {
    /// Normalizes the widths: sorted ascending, duplicates and zeros dropped.
    pub fn new(mut widths: Vec<u32>) -> Self {
        widths.retain(|&w| w > 0);
        widths.sort_unstable();
        widths.dedup();
        Self(widths)
    }

    pub fn widths(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Width referenced by the plain `src` fallback.
    ///
    /// 600 when the catalog has it, otherwise the catalog width closest to 600
    /// (the smaller one on a tie). Every returned width is a generated one.
    pub fn src_width(&self) -> Option<u32> {
        self.0
            .iter()
            .copied()
            .min_by_key(|&w| (w.abs_diff(DEFAULT_SRC_WIDTH), w))
    }
}

impl Default for SizeCatalog {
    fn default() -> Self {
        Self(vec![300, 600, 1200, 2000])
    }
}

impl From<&[u32]> for SizeCatalog {
    fn from(widths: &[u32]) -> Self {
        Self::new(widths.to_vec())
    }
}
