//! Batch derivative generation.
//!
//! Walks the source directory, and for every raster it finds produces the
//! full artifact set the runtime resolver relies on.
//!
//! ## Per-image sequence
//!
//! ```text
//! decode → decide fallback → { variants ∥ placeholder } → metadata
//! ```
//!
//! Variants and the placeholder are independent and encode concurrently. The
//! metadata document is the publication step: it is written only once every
//! other artifact for the image is on disk. If any of them fails the image is
//! skipped, its metadata is withheld, and a document left by an earlier run is
//! withdrawn. Nothing is retried.
//!
//! ## Output Structure
//!
//! ```text
//! dist/assets/images/
//! ├── .cache-manifest.json
//! ├── webp/
//! │   ├── logo-300.webp
//! │   └── ...
//! ├── png/logo-300.png ...        # hasAlpha = true
//! ├── jpg/photo-300.jpg ...       # hasAlpha = false
//! ├── placeholder/logo-20.webp
//! └── metadata/logo.json
//! ```
//!
//! ## Parallel Processing
//!
//! Images run in parallel on a [rayon](https://docs.rs/rayon) pool sized by
//! `processing.max_processes`; each image's encodes run as nested parallel
//! jobs on the same pool, so the worker limit bounds the whole batch. Output
//! paths of different images are disjoint: duplicate logical names, and names
//! that can't appear verbatim in a srcset URL, are rejected before any encode.

use crate::cache::{self, CacheManifest, CacheStats};
use crate::config::{self, AssetConfig};
use crate::imaging::{
    BackendError, ImageBackend, PlannedArtifact, RustBackend, SourceImage, VariantConfig,
    decide_format, decode_source, encode_artifact, is_supported_source, plan_placeholder,
    plan_variants,
};
use crate::metadata::{self, MetadataDocument};
use crate::naming;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Errors that abort the whole run.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to walk source directory: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Source directory not found: {0}")]
    SourceNotFound(PathBuf),
}

/// Why a single image was skipped. Never aborts the batch.
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("failed to read source: {0}")]
    Read(#[source] std::io::Error),
    #[error("{0}")]
    Decode(#[from] BackendError),
    #[error("{} of its artifacts failed: {}", .0.len(), join_errors(.0))]
    Artifacts(Vec<ArtifactError>),
    #[error("failed to write metadata: {0}")]
    Metadata(#[source] std::io::Error),
    #[error("logical name '{0}' is shared by several sources")]
    DuplicateName(String),
    #[error("logical name '{0}' contains characters that break srcset URLs")]
    UnsafeName(String),
}

/// Failure of one artifact of an image.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("{path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: BackendError,
    },
    #[error("{path}: write failed: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn join_errors(errors: &[ArtifactError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Settings for one run, resolved from [`AssetConfig`].
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub variants: VariantConfig,
    /// Placeholder width, or `None` when placeholders are disabled.
    pub placeholder_size: Option<u32>,
    pub threads: usize,
}

impl ProcessConfig {
    pub fn from_asset_config(config: &AssetConfig) -> Self {
        Self {
            variants: config.variant_config(),
            placeholder_size: config
                .placeholder
                .enabled
                .then_some(config.placeholder.size),
            threads: config::effective_threads(&config.processing),
        }
    }
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self::from_asset_config(&AssetConfig::default())
    }
}

/// A discovered source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Path relative to the source directory, for display.
    pub relative: String,
    pub logical_name: String,
}

/// How an artifact ended up on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantStatus {
    /// Existing file with matching hashes, skipped.
    Cached,
    /// Content found under a different path (renamed source), copied.
    Copied,
    /// Freshly encoded.
    Encoded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantInfo {
    /// Display label, e.g. `webp 300px`.
    pub label: String,
    pub path: String,
    pub status: VariantStatus,
}

/// Progress events emitted while images are processed.
///
/// Sent through an optional channel so the caller can display progress as it
/// happens. Events arrive in completion order, not discovery order.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    BatchStarted {
        image_count: usize,
    },
    ImageProcessed {
        /// 1-based position in discovery order.
        index: usize,
        logical_name: String,
        source_path: String,
        has_alpha: bool,
        variants: Vec<VariantInfo>,
    },
    ImageSkipped {
        index: usize,
        logical_name: String,
        source_path: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub logical_name: String,
    pub source_path: String,
    pub has_alpha: bool,
    pub variants: Vec<VariantInfo>,
}

#[derive(Debug, Clone)]
pub struct SkippedImage {
    pub logical_name: String,
    pub source_path: String,
    pub reason: String,
}

/// Outcome of a run, in discovery order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub processed: Vec<ProcessedImage>,
    pub skipped: Vec<SkippedImage>,
    pub cache_stats: CacheStats,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} processed, {} skipped",
            self.processed.len(),
            self.skipped.len()
        )
    }
}

/// Find every supported raster under `source_dir`, sorted by path.
pub fn discover_sources(source_dir: &Path) -> Result<Vec<SourceFile>, ProcessError> {
    if !source_dir.is_dir() {
        return Err(ProcessError::SourceNotFound(source_dir.to_path_buf()));
    }
    let mut sources = Vec::new();
    for entry in walkdir::WalkDir::new(source_dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() || !is_supported_source(entry.path()) {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        let relative = entry
            .path()
            .strip_prefix(source_dir)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        sources.push(SourceFile {
            path: entry.path().to_path_buf(),
            relative,
            logical_name: naming::logical_name(&file_name).to_string(),
        });
    }
    Ok(sources)
}

/// Process every source under `source_dir` with the default backend.
pub fn process(
    source_dir: &Path,
    output_dir: &Path,
    config: &ProcessConfig,
    use_cache: bool,
    progress: Option<Sender<ProcessEvent>>,
) -> Result<BatchReport, ProcessError> {
    let backend = RustBackend::new();
    process_with_backend(&backend, source_dir, output_dir, config, use_cache, progress)
}

/// Process images using a specific backend (allows testing with mock).
pub fn process_with_backend(
    backend: &impl ImageBackend,
    source_dir: &Path,
    output_dir: &Path,
    config: &ProcessConfig,
    use_cache: bool,
    progress: Option<Sender<ProcessEvent>>,
) -> Result<BatchReport, ProcessError> {
    let sources = discover_sources(source_dir)?;
    std::fs::create_dir_all(output_dir)?;

    let manifest = if use_cache {
        CacheManifest::load(output_dir)
    } else {
        CacheManifest::empty()
    };
    let run = Run {
        backend,
        output_dir,
        config,
        cache: Mutex::new(manifest),
        progress: progress.as_ref(),
    };

    tracing::info!(
        count = sources.len(),
        source = %source_dir.display(),
        "processing images"
    );
    run.emit(ProcessEvent::BatchStarted {
        image_count: sources.len(),
    });

    let mut name_counts: HashMap<&str, usize> = HashMap::new();
    for source in &sources {
        *name_counts.entry(source.logical_name.as_str()).or_default() += 1;
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads.max(1))
        .build()?;

    let outcomes: Vec<Result<ProcessedImage, ImageError>> = pool.install(|| {
        sources
            .par_iter()
            .enumerate()
            .map(|(i, source)| {
                let shared_name = name_counts[source.logical_name.as_str()] > 1;
                let outcome = run.process_image(source, shared_name);
                run.report(i + 1, source, &outcome);
                outcome
            })
            .collect()
    });

    let mut report = BatchReport::default();
    for (source, outcome) in sources.iter().zip(outcomes) {
        match outcome {
            Ok(image) => {
                for variant in &image.variants {
                    match variant.status {
                        VariantStatus::Cached => report.cache_stats.hits += 1,
                        VariantStatus::Copied => report.cache_stats.copies += 1,
                        VariantStatus::Encoded => report.cache_stats.misses += 1,
                    }
                }
                report.processed.push(image);
            }
            Err(e) => report.skipped.push(SkippedImage {
                logical_name: source.logical_name.clone(),
                source_path: source.relative.clone(),
                reason: e.to_string(),
            }),
        }
    }

    run.cache
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner)
        .save(output_dir)?;

    tracing::info!(
        processed = report.processed.len(),
        skipped = report.skipped.len(),
        "batch finished"
    );
    Ok(report)
}

/// How [`Run::produce`] gets an artifact onto disk.
enum Reuse {
    Cached,
    Copy(Vec<u8>),
    Encode,
}

/// Shared state of one run.
struct Run<'a, B: ImageBackend> {
    backend: &'a B,
    output_dir: &'a Path,
    config: &'a ProcessConfig,
    cache: Mutex<CacheManifest>,
    progress: Option<&'a Sender<ProcessEvent>>,
}

impl<B: ImageBackend> Run<'_, B> {
    fn emit(&self, event: ProcessEvent) {
        if let Some(tx) = self.progress {
            tx.send(event).ok();
        }
    }

    fn report(&self, index: usize, source: &SourceFile, outcome: &Result<ProcessedImage, ImageError>) {
        let event = match outcome {
            Ok(image) => ProcessEvent::ImageProcessed {
                index,
                logical_name: image.logical_name.clone(),
                source_path: image.source_path.clone(),
                has_alpha: image.has_alpha,
                variants: image.variants.clone(),
            },
            Err(e) => {
                tracing::warn!(source = %source.relative, error = %e, "skipping image");
                ProcessEvent::ImageSkipped {
                    index,
                    logical_name: source.logical_name.clone(),
                    source_path: source.relative.clone(),
                    reason: e.to_string(),
                }
            }
        };
        self.emit(event);
    }

    /// Build one image, withdrawing any earlier metadata if it fails.
    fn process_image(
        &self,
        source: &SourceFile,
        shared_name: bool,
    ) -> Result<ProcessedImage, ImageError> {
        let result = if shared_name {
            Err(ImageError::DuplicateName(source.logical_name.clone()))
        } else if !naming::is_url_safe(&source.logical_name) {
            Err(ImageError::UnsafeName(source.logical_name.clone()))
        } else {
            self.build_artifacts(source)
        };
        if result.is_err() {
            match metadata::withdraw_metadata(self.output_dir, &source.logical_name) {
                Ok(true) => tracing::info!(name = %source.logical_name, "withdrew stale metadata"),
                Ok(false) => {}
                Err(e) => tracing::warn!(
                    name = %source.logical_name,
                    error = %e,
                    "failed to withdraw stale metadata"
                ),
            }
        }
        result
    }

    fn build_artifacts(&self, source: &SourceFile) -> Result<ProcessedImage, ImageError> {
        let source_hash = cache::hash_file(&source.path).map_err(ImageError::Read)?;
        let image = decode_source(self.backend, &source.path, &source.logical_name)?;
        let catalog = decide_format(&image);

        let mut planned = plan_variants(&image, catalog, &self.config.variants);
        if let Some(size) = self.config.placeholder_size {
            planned.push(plan_placeholder(&image, size, &self.config.variants.qualities));
        }
        let placeholder = self
            .config
            .placeholder_size
            .map(|size| naming::placeholder_path(&source.logical_name, size));

        let results: Vec<Result<VariantInfo, ArtifactError>> = planned
            .par_iter()
            .map(|artifact| self.produce(&image, &source_hash, artifact))
            .collect();

        let mut variants = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(info) => variants.push(info),
                Err(e) => failures.push(e),
            }
        }
        if !failures.is_empty() {
            return Err(ImageError::Artifacts(failures));
        }

        let mut doc = MetadataDocument::new(catalog.has_alpha());
        if let Some(path) = placeholder {
            doc = doc.with_placeholder(path);
        }
        metadata::write_metadata(self.output_dir, &source.logical_name, &doc)
            .map_err(ImageError::Metadata)?;

        Ok(ProcessedImage {
            logical_name: source.logical_name.clone(),
            source_path: source.relative.clone(),
            has_alpha: catalog.has_alpha(),
            variants,
        })
    }

    /// Put one artifact on disk: reuse a cached file if possible, else encode.
    fn produce(
        &self,
        image: &SourceImage,
        source_hash: &str,
        artifact: &PlannedArtifact,
    ) -> Result<VariantInfo, ArtifactError> {
        let params_hash = cache::hash_encode_params(&artifact.params);
        let dest = self.output_dir.join(&artifact.path);
        let write_err = |source| ArtifactError::Write {
            path: artifact.path.clone(),
            source,
        };

        // The lookup, the read of a copy source and the invalidation of the
        // destination share one lock: once a path is invalidated nobody can
        // resolve to it, so a copy never reads a file being overwritten.
        let reuse = {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            match cache.find_cached(source_hash, &params_hash, self.output_dir) {
                Some(stored) if stored == artifact.path => Reuse::Cached,
                Some(stored) => {
                    let bytes =
                        std::fs::read(self.output_dir.join(&stored)).map_err(write_err)?;
                    cache.invalidate(&artifact.path);
                    Reuse::Copy(bytes)
                }
                None => {
                    cache.invalidate(&artifact.path);
                    Reuse::Encode
                }
            }
        };

        let status = match reuse {
            Reuse::Cached => VariantStatus::Cached,
            Reuse::Copy(bytes) => {
                metadata::write_atomic(&dest, &bytes).map_err(write_err)?;
                VariantStatus::Copied
            }
            Reuse::Encode => {
                tracing::debug!(path = %artifact.path, "encoding");
                let bytes = encode_artifact(self.backend, image, artifact).map_err(|source| {
                    ArtifactError::Encode {
                        path: artifact.path.clone(),
                        source,
                    }
                })?;
                metadata::write_atomic(&dest, &bytes).map_err(write_err)?;
                VariantStatus::Encoded
            }
        };

        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(artifact.path.clone(), source_hash.to_string(), params_hash);

        Ok(VariantInfo {
            label: artifact.label(),
            path: artifact.path.clone(),
            status,
        })
    }
}
