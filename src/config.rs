//! Pipeline configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! overridden by a sparse user file placed in the source directory.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [images]
//! sizes = [300, 600, 1200, 2000]    # Target widths, shared with the runtime resolver
//! formats = ["webp", "png", "jpg"]  # Formats the pipeline may emit
//! modern_quality = 80               # WebP quality (0-100)
//! fallback_lossy_quality = 85       # JPEG quality (0-100)
//! fallback_lossless_quality = 100   # PNG effort (nominal, 0-100)
//! upscale = "allow"                 # "allow" or "never"
//!
//! [placeholder]
//! enabled = true
//! size = 20                         # Placeholder width in pixels
//!
//! [processing]
//! max_processes = 4                 # Max parallel workers (omit for auto = CPU cores)
//!
//! [runtime]
//! base_path = "/assets/images"      # URL prefix the browser requests artifacts under
//! sizes_hint = "(max-width: 600px) 300px, (max-width: 1200px) 600px, 1200px"
//! timeout_secs = 30                 # Metadata fetch timeout
//! max_attempts = 1                  # Metadata fetch attempts (1 = no retry)
//! retry_backoff_ms = 200
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{EncodeQualities, Quality, UpscalePolicy, VariantConfig};
use crate::types::{Format, SizeCatalog};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Name of the config file looked up in the source directory.
pub const CONFIG_FILENAME: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `config.toml`.
///
/// All fields have defaults. User files only need the values they override.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetConfig {
    /// Variant generation (widths, formats, qualities).
    pub images: ImagesConfig,
    /// Blur-up placeholder generation.
    pub placeholder: PlaceholderConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
    /// Runtime resolution settings (URL prefix, fetch policy).
    pub runtime: RuntimeConfig,
}

impl AssetConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let images = &self.images;
        if images.sizes.is_empty() {
            return Err(ConfigError::Validation(
                "images.sizes must not be empty".into(),
            ));
        }
        if images.sizes.contains(&0) {
            return Err(ConfigError::Validation(
                "images.sizes values must be non-zero".into(),
            ));
        }
        for (key, value) in [
            ("images.modern_quality", images.modern_quality),
            ("images.fallback_lossy_quality", images.fallback_lossy_quality),
            ("images.fallback_lossless_quality", images.fallback_lossless_quality),
        ] {
            if value > 100 {
                return Err(ConfigError::Validation(format!("{key} must be 0-100")));
            }
        }
        // The fallback is picked per image, so both fallbacks must be on.
        for required in [Format::Webp, Format::Png, Format::Jpg] {
            if !images.formats.contains(&required) {
                return Err(ConfigError::Validation(format!(
                    "images.formats must include \"{required}\""
                )));
            }
        }
        if self.placeholder.enabled && self.placeholder.size == 0 {
            return Err(ConfigError::Validation(
                "placeholder.size must be non-zero".into(),
            ));
        }
        if self.runtime.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "runtime.max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn size_catalog(&self) -> SizeCatalog {
        SizeCatalog::new(self.images.sizes.clone())
    }

    pub fn variant_config(&self) -> VariantConfig {
        VariantConfig {
            sizes: self.size_catalog(),
            qualities: EncodeQualities {
                modern: Quality::new(self.images.modern_quality),
                fallback_lossy: Quality::new(self.images.fallback_lossy_quality),
                fallback_lossless: Quality::new(self.images.fallback_lossless_quality),
            },
            upscale: self.images.upscale,
        }
    }
}

/// Variant generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Target pixel widths. Must match what the runtime resolver assumes.
    pub sizes: Vec<u32>,
    /// Formats the pipeline may emit.
    pub formats: Vec<Format>,
    /// WebP quality.
    pub modern_quality: u32,
    /// JPEG quality.
    pub fallback_lossy_quality: u32,
    /// PNG compression effort, nominal.
    pub fallback_lossless_quality: u32,
    /// Behavior when a target width exceeds the source width.
    pub upscale: UpscalePolicy,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            sizes: SizeCatalog::default().widths().to_vec(),
            formats: vec![Format::Webp, Format::Png, Format::Jpg],
            modern_quality: 80,
            fallback_lossy_quality: 85,
            fallback_lossless_quality: 100,
            upscale: UpscalePolicy::Allow,
        }
    }
}

/// Blur-up placeholder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaceholderConfig {
    pub enabled: bool,
    /// Placeholder width in pixels.
    pub size: u32,
}

impl Default for PlaceholderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            size: 20,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel encode workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective worker count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)`, at least 1
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Runtime resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// URL prefix under which the artifact root is served.
    pub base_path: String,
    /// Default `sizes` attribute for rendered images.
    pub sizes_hint: String,
    /// Timeout for a single metadata request.
    pub timeout_secs: u64,
    /// Total metadata fetch attempts. 1 means no retry.
    pub max_attempts: u32,
    /// Delay between attempts.
    pub retry_backoff_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            base_path: "/assets/images".to_string(),
            sizes_hint: "(max-width: 600px) 300px, (max-width: 1200px) 600px, 1200px".to_string(),
            timeout_secs: 30,
            max_attempts: 1,
            retry_backoff_ms: 200,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(AssetConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config does not serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the directory has no config file.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<AssetConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AssetConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
pub fn load_config(dir: &Path) -> Result<AssetConfig, ConfigError> {
    resolve_config(load_raw_config(dir)?)
}

/// Returns a fully-commented stock `config.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# respimg configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# ---------------------------------------------------------------------------
# Variant generation
# ---------------------------------------------------------------------------
[images]
# Target widths. The runtime resolver builds URLs for exactly these widths,
# so change them on both sides together.
sizes = [300, 600, 1200, 2000]

# Formats the pipeline may emit. WebP is always produced; PNG is the fallback
# for images with an alpha channel, JPEG for the rest. All three are required.
formats = ["webp", "png", "jpg"]

# WebP encoding quality (0 = worst, 100 = best).
modern_quality = 80

# JPEG encoding quality.
fallback_lossy_quality = 85

# PNG is lossless; this only selects compression effort.
fallback_lossless_quality = 100

# Targets wider than the source: "allow" enlarges, "never" keeps the source
# width (files are still named after the target width).
upscale = "allow"

# ---------------------------------------------------------------------------
# Blur-up placeholder
# ---------------------------------------------------------------------------
[placeholder]
enabled = true
# Width in pixels.
size = 20

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel encode workers. Each in-flight image holds its full
# decoded raster, so lower this on memory-constrained machines.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# ---------------------------------------------------------------------------
# Runtime resolution
# ---------------------------------------------------------------------------
[runtime]
# URL prefix the artifact root is served under.
base_path = "/assets/images"
# Default sizes attribute for rendered <img> elements.
sizes_hint = "(max-width: 600px) 300px, (max-width: 1200px) 600px, 1200px"
# Metadata request timeout, in seconds.
timeout_secs = 30
# Total metadata fetch attempts (1 = no retry).
max_attempts = 1
retry_backoff_ms = 200
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_matches_catalogs() {
        let config = AssetConfig::default();
        assert_eq!(config.images.sizes, vec![300, 600, 1200, 2000]);
        assert_eq!(config.images.modern_quality, 80);
        assert_eq!(config.images.fallback_lossy_quality, 85);
        assert_eq!(config.images.fallback_lossless_quality, 100);
        assert_eq!(config.placeholder.size, 20);
        assert_eq!(config.runtime.base_path, "/assets/images");
        assert_eq!(config.runtime.max_attempts, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[images]
modern_quality = 70
"#;
        let config: AssetConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.images.modern_quality, 70);
        assert_eq!(config.images.sizes, vec![300, 600, 1200, 2000]);
        assert!(config.placeholder.enabled);
    }

    #[test]
    fn parse_upscale_policy() {
        let config: AssetConfig = toml::from_str("[images]\nupscale = \"never\"\n").unwrap();
        assert_eq!(config.images.upscale, UpscalePolicy::Never);
    }

    #[test]
    fn unknown_keys_rejected() {
        let result: Result<AssetConfig, _> = toml::from_str("[images]\nqualty = 3\n");
        assert!(result.is_err());
    }

    #[test]
    fn variant_config_carries_qualities_and_sorted_sizes() {
        let mut config = AssetConfig::default();
        config.images.sizes = vec![1200, 300];
        config.images.fallback_lossy_quality = 70;

        let variant = config.variant_config();
        assert_eq!(variant.sizes.widths(), &[300, 1200]);
        assert_eq!(variant.qualities.fallback_lossy, Quality::new(70));
        assert_eq!(variant.qualities.modern, Quality::new(80));
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn validate_rejects_empty_sizes() {
        let mut config = AssetConfig::default();
        config.images.sizes.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_zero_width() {
        let mut config = AssetConfig::default();
        config.images.sizes = vec![0, 300];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_quality_over_100() {
        let mut config = AssetConfig::default();
        config.images.fallback_lossy_quality = 101;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("images.fallback_lossy_quality"));
    }

    #[test]
    fn validate_requires_both_fallbacks() {
        let mut config = AssetConfig::default();
        config.images.formats = vec![Format::Webp, Format::Jpg];
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("png"));
    }

    #[test]
    fn validate_rejects_zero_attempts() {
        let mut config = AssetConfig::default();
        config.runtime.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn disabled_placeholder_ignores_size() {
        let mut config = AssetConfig::default();
        config.placeholder.enabled = false;
        config.placeholder.size = 0;
        assert!(config.validate().is_ok());
    }

    // =========================================================================
    // Loading and merging
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.images.sizes, vec![300, 600, 1200, 2000]);
    }

    #[test]
    fn load_config_merges_sparse_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "[placeholder]\nsize = 32\n\n[processing]\nmax_processes = 2\n",
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.placeholder.size, 32);
        assert!(config.placeholder.enabled);
        assert_eq!(config.processing.max_processes, Some(2));
        assert_eq!(config.images.modern_quality, 80);
    }

    #[test]
    fn load_config_invalid_toml_errors() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "[images\nsizes = ").unwrap();
        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_validates_merged_result() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "[images]\nsizes = []\n").unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn merge_replaces_arrays_wholesale() {
        let base = stock_defaults_value().unwrap();
        let overlay: toml::Value = toml::from_str("[images]\nsizes = [100]\n").unwrap();
        let merged: AssetConfig = merge_toml(base, overlay).try_into().unwrap();
        assert_eq!(merged.images.sizes, vec![100]);
    }

    #[test]
    fn stock_config_parses_to_defaults() {
        let config: AssetConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = AssetConfig::default();
        assert_eq!(config.images.sizes, defaults.images.sizes);
        assert_eq!(config.images.formats, defaults.images.formats);
        assert_eq!(config.runtime.sizes_hint, defaults.runtime.sizes_hint);
        assert_eq!(config.processing.max_processes, None);
    }

    #[test]
    fn effective_threads_clamps() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
        assert_eq!(
            effective_threads(&ProcessingConfig {
                max_processes: Some(10_000)
            }),
            cores
        );
        assert_eq!(
            effective_threads(&ProcessingConfig {
                max_processes: Some(0)
            }),
            1
        );
    }
}
