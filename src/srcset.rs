//! Client-side srcset construction.
//!
//! Pure function of (base path, logical name, size catalog, `hasAlpha`). It
//! uses the same [`naming`] functions as the encoder, so every URL it emits
//! names an artifact the pipeline wrote.

use crate::naming;
use crate::types::{DEFAULT_SRC_WIDTH, Format, FormatCatalog, SizeCatalog};

/// Separator between srcset candidates.
pub const SRCSET_SEPARATOR: &str = ", ";

/// One srcset candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrcSetEntry {
    pub url: String,
    pub width: u32,
    pub format: Format,
}

impl SrcSetEntry {
    /// `<url> <width>w`
    pub fn candidate(&self) -> String {
        format!("{} {}w", self.url, self.width)
    }
}

/// The `src` + `srcset` pair for one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSrcSet {
    /// Fallback-format artifact for browsers that ignore `srcset`.
    pub src: String,
    /// Modern-format entries ascending, then fallback-format entries ascending.
    pub entries: Vec<SrcSetEntry>,
}

impl ResolvedSrcSet {
    /// The `srcset` attribute value.
    pub fn srcset(&self) -> String {
        self.entries
            .iter()
            .map(SrcSetEntry::candidate)
            .collect::<Vec<_>>()
            .join(SRCSET_SEPARATOR)
    }
}

/// Build the srcset for `logical_name` served under `base`.
pub fn build_srcset(
    base: &str,
    logical_name: &str,
    sizes: &SizeCatalog,
    has_alpha: bool,
) -> ResolvedSrcSet {
    let catalog = FormatCatalog::for_alpha(has_alpha);
    let url = |width, format| {
        naming::join_url(base, &naming::variant_path(logical_name, width, format))
    };

    let entries = catalog
        .formats()
        .into_iter()
        .flat_map(|format| {
            sizes.widths().iter().map(move |&width| SrcSetEntry {
                url: url(width, format),
                width,
                format,
            })
        })
        .collect();

    let src_width = sizes.src_width().unwrap_or(DEFAULT_SRC_WIDTH);
    ResolvedSrcSet {
        src: url(src_width, catalog.fallback),
        entries,
    }
}
