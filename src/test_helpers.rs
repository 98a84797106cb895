//! Shared test utilities: synthetic source images and output inspection.
//!
//! Sources are generated on the fly instead of checked in as fixtures, so
//! each test states the exact layout (RGB vs RGBA) it depends on.

use image::{ImageEncoder, RgbImage, RgbaImage};
use std::path::{Path, PathBuf};

// =========================================================================
// Synthetic sources
// =========================================================================

/// Write a 3-channel PNG with a gradient.
pub fn write_rgb_png(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    ensure_parent(path);
    img.save_with_format(path, image::ImageFormat::Png).unwrap();
}

/// Write a 4-channel PNG. Every pixel is fully opaque: alpha detection is
/// structural, so an opaque RGBA image still counts as having alpha.
pub fn write_rgba_png(path: &Path, width: u32, height: u32) {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, (y % 256) as u8, 64, 255])
    });
    ensure_parent(path);
    img.save_with_format(path, image::ImageFormat::Png).unwrap();
}

/// Write a baseline JPEG.
pub fn write_rgb_jpeg(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 200])
    });
    ensure_parent(path);
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// Write bytes that no decoder accepts, under an image extension.
pub fn write_corrupt(path: &Path) {
    ensure_parent(path);
    std::fs::write(path, b"definitely not an image").unwrap();
}

fn ensure_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
}

// =========================================================================
// Output inspection
// =========================================================================

/// All files under `root`, as sorted `/`-separated relative paths.
pub fn list_files(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            e.path()
                .strip_prefix(root)
                .ok()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
        })
        .collect();
    files.sort();
    files
}

/// Files under `root` for one logical name, excluding the cache manifest.
pub fn files_for(root: &Path, logical_name: &str) -> Vec<String> {
    list_files(root)
        .into_iter()
        .filter(|f| {
            Path::new(f)
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| {
                    n == format!("{logical_name}.json")
                        || n.starts_with(&format!("{logical_name}-"))
                })
        })
        .collect()
}

/// Path of the metadata document for `logical_name` under `root`.
pub fn metadata_file(root: &Path, logical_name: &str) -> PathBuf {
    root.join(crate::naming::metadata_path(logical_name))
}
