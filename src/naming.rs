//! Artifact naming, shared by the pipeline and the runtime resolver.
//!
//! Every path the build writes and every URL the client requests comes out of
//! this module. Paths are `/`-separated and relative to the artifact root
//! (`assets/images` by default):
//!
//! ```text
//! webp/<name>-<width>.webp        modern variant
//! <fallback>/<name>-<width>.<ext> png or jpg variant
//! placeholder/<name>-<size>.webp  blur-up preview
//! metadata/<name>.json            sidecar document
//! ```

use crate::types::{Format, MODERN_FORMAT};

/// Subdirectory holding metadata documents.
pub const METADATA_DIR: &str = "metadata";

/// Subdirectory holding placeholder previews.
pub const PLACEHOLDER_DIR: &str = "placeholder";

/// Derive the logical name from a file name by dropping its last extension.
///
/// - `"example.png"` → `"example"`
/// - `"hero.banner.jpg"` → `"hero.banner"`
/// - `"photo"` → `"photo"`
/// - `"photo."` → `"photo."` (an extension needs at least one character)
pub fn logical_name(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(dot) if dot + 1 < file_name.len() && !file_name[dot + 1..].contains('/') => {
            &file_name[..dot]
        }
        _ => file_name,
    }
}

/// Whether `name` can appear verbatim in a URL path segment and a srcset
/// candidate. Whitespace and commas split srcset candidates; the rest would
/// need percent-encoding or end a URL early.
pub fn is_url_safe(name: &str) -> bool {
    !name.is_empty()
        && !name.chars().any(|c| {
            c.is_whitespace()
                || c.is_control()
                || matches!(
                    c,
                    ',' | '%' | '?' | '#' | '\'' | '"' | '\\' | '/' | '<' | '>' | '(' | ')'
                )
        })
}

/// `<name>-<width>.<ext>`
pub fn variant_file_name(name: &str, width: u32, format: Format) -> String {
    format!("{}-{}.{}", name, width, format.extension())
}

/// `<ext>/<name>-<width>.<ext>`
pub fn variant_path(name: &str, width: u32, format: Format) -> String {
    format!(
        "{}/{}",
        format.extension(),
        variant_file_name(name, width, format)
    )
}

/// `metadata/<name>.json`
pub fn metadata_path(name: &str) -> String {
    format!("{}/{}.json", METADATA_DIR, name)
}

/// `placeholder/<name>-<size>.webp`
pub fn placeholder_path(name: &str, size: u32) -> String {
    format!(
        "{}/{}",
        PLACEHOLDER_DIR,
        variant_file_name(name, size, MODERN_FORMAT)
    )
}

/// Join a base URL or path with an artifact path, with exactly one `/` between.
pub fn join_url(base: &str, relative: &str) -> String {
    let base = base.trim_end_matches('/');
    let relative = relative.trim_start_matches('/');
    if base.is_empty() {
        format!("/{}", relative)
    } else {
        format!("{}/{}", base, relative)
    }
}
