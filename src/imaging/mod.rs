//! Image processing: decode, decide, resize, encode.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` |
//! | **Alpha decision** | channel layout of the decoded image |
//! | **Resize** | `resize_exact` + Lanczos3 |
//! | **Encode** | `webp` (lossy), `image` JPEG and PNG encoders |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing encode operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend, SourceImage};
pub use calculations::{TargetSize, plan_target_sizes, scaled_height};
pub use operations::{
    ArtifactKind, PlannedArtifact, VariantConfig, decide_format, decode_source, encode_artifact,
    plan_placeholder, plan_variants,
};
pub use params::{EncodeParams, EncodeQualities, Quality, UpscalePolicy};
pub use rust_backend::{RustBackend, is_supported_source, supported_input_extensions};
