//! Parameter types for image operations.
//!
//! These structs describe *what* to produce, not *how*. The
//! [`operations`](super::operations) module plans them from configuration and
//! the [`backend`](super::backend) turns them into encoded bytes, which keeps
//! the planning logic testable against a mock backend.

use crate::types::Format;
use serde::{Deserialize, Serialize};

/// Encoding quality (0-100). Clamped on construction.
///
/// Lossy formats use it directly. For PNG it is nominal and only selects a
/// compression effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.min(100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

/// Per-format quality settings, fixed for a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeQualities {
    /// WebP, lossy.
    pub modern: Quality,
    /// JPEG, lossy.
    pub fallback_lossy: Quality,
    /// PNG, lossless.
    pub fallback_lossless: Quality,
}

impl EncodeQualities {
    pub fn for_format(&self, format: Format) -> Quality {
        match format {
            Format::Webp => self.modern,
            Format::Jpg => self.fallback_lossy,
            Format::Png => self.fallback_lossless,
        }
    }
}

impl Default for EncodeQualities {
    fn default() -> Self {
        Self {
            modern: Quality::new(80),
            fallback_lossy: Quality::new(85),
            fallback_lossless: Quality::new(100),
        }
    }
}

/// What to do when a target width exceeds the source width.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpscalePolicy {
    /// Enlarge to the target width.
    #[default]
    Allow,
    /// Keep the source width. The artifact is still named after the target
    /// width so the URL set stays complete.
    Never,
}

/// Everything one resize-and-encode needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeParams {
    pub width: u32,
    pub height: u32,
    pub format: Format,
    pub quality: Quality,
}
