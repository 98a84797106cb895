//! Pure calculation functions for output dimensions.
//!
//! No I/O, no images. Everything here is exercised by plain unit tests.

use super::params::UpscalePolicy;

/// Height that keeps the source aspect ratio at `width`. Never below 1.
///
/// ```
/// # use respimg::imaging::scaled_height;
/// assert_eq!(scaled_height((2000, 1500), 300), 225);
/// assert_eq!(scaled_height((4000, 10), 300), 1);
/// ```
pub fn scaled_height(source: (u32, u32), width: u32) -> u32 {
    let (src_w, src_h) = source;
    if src_w == 0 {
        return 1;
    }
    let h = (width as f64 * src_h as f64 / src_w as f64).round() as u32;
    h.max(1)
}

/// One output size, width-bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSize {
    /// Catalog width. Used for naming, never changes with the policy.
    pub target: u32,
    /// Actual pixel width of the encoded artifact.
    pub width: u32,
    pub height: u32,
}

/// Compute the pixel size of every catalog width for a source image.
///
/// Unlike a "skip what's bigger than the original" strategy, every catalog
/// width yields an entry: the client builds URLs for all of them without
/// knowing the source size. [`UpscalePolicy::Never`] caps the pixel width at
/// the source width instead of dropping the entry.
pub fn plan_target_sizes(
    original: (u32, u32),
    widths: &[u32],
    policy: UpscalePolicy,
) -> Vec<TargetSize> {
    widths
        .iter()
        .map(|&target| {
            let width = match policy {
                UpscalePolicy::Allow => target,
                UpscalePolicy::Never => target.min(original.0).max(1),
            };
            TargetSize {
                target,
                width,
                height: scaled_height(original, width),
            }
        })
        .collect()
}
