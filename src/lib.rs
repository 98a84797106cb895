//! # respimg
//!
//! Build-time responsive image derivatives plus the runtime half that picks
//! between them.
//!
//! # Architecture: Two Halves, One Contract
//!
//! ```text
//! build    source/*.png|jpg  →  webp/ png/ jpg/ placeholder/ metadata/
//! runtime  GET metadata/<name>.json  →  srcset  →  <img>
//! ```
//!
//! The contract between the halves is a path convention and one bit of
//! metadata. Every derivative lives at `<format>/<name>-<width>.<format>`, and
//! `metadata/<name>.json` says `{"hasAlpha": bool}`. Images with an alpha
//! channel fall back to PNG, everything else to JPEG; WebP is always emitted.
//! Given the size catalog, the runtime can compute every URL from that single
//! bit.
//!
//! The metadata document doubles as the publication marker: it is written only
//! after every derivative it implies exists, so a client that can read it can
//! trust every URL it derives from it.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`process`] | Batch orchestrator: discover, decode, encode in parallel, publish metadata |
//! | [`imaging`] | Decode, alpha decision, resize, per-format encode |
//! | [`metadata`] | Sidecar document schema and atomic writes |
//! | [`cache`] | Content-addressed encode cache for incremental reruns |
//! | [`naming`] | The path convention shared by encoder and resolver |
//! | [`types`] | Formats, format catalog, size catalog |
//! | [`srcset`] | Pure srcset construction from (name, sizes, `hasAlpha`) |
//! | [`resolver`] | Async HTTP metadata fetch with optional retry |
//! | [`view`] | Loading / Ready / Error state machine and its HTML |
//! | [`config`] | `config.toml` loading, validation, and merging |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## One Naming Function
//!
//! The encoder and the resolver both call [`naming::variant_path`]. A change
//! to the convention cannot leave the two halves disagreeing.
//!
//! ## Structural Alpha
//!
//! `hasAlpha` is decided by the decoded channel layout, not by scanning
//! pixels. An RGBA PNG whose pixels are all opaque still gets a PNG fallback.
//! The decision is O(1) and matches what the source file declares.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding and resizing use the `image` crate (Lanczos3); lossy WebP uses
//! `webp`. No ImageMagick, no system libraries beyond what those crates
//! vendor.

pub mod cache;
pub mod config;
pub mod imaging;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod process;
pub mod resolver;
pub mod srcset;
pub mod types;
pub mod view;

#[cfg(test)]
pub(crate) mod test_helpers;
