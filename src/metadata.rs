//! Metadata sidecar documents.
//!
//! One JSON document per logical name at `metadata/<name>.json`:
//!
//! ```json
//! {"hasAlpha":true,"placeholder":"placeholder/logo-20.webp"}
//! ```
//!
//! `hasAlpha` is the only authority on which fallback format exists for an
//! image. `placeholder` is optional and absent when placeholders are off.
//!
//! # Write discipline
//!
//! All artifacts, metadata included, go through [`write_atomic`]: bytes land in
//! a temp file next to the destination and are renamed into place, so a reader
//! sees either the old file or the complete new one. The orchestrator calls
//! [`write_metadata`] only after every artifact the document implies is on
//! disk, and [`withdraw_metadata`] when an image fails, so a published
//! document never points at a missing file.

use crate::naming;
use crate::types::{Format, fallback_format};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// The sidecar document for one image.
///
/// Serialization is deterministic (fixed field order, compact), so rerunning
/// the pipeline on an unchanged image rewrites identical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataDocument {
    pub has_alpha: bool,
    /// Placeholder path relative to the artifact root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

impl MetadataDocument {
    pub fn new(has_alpha: bool) -> Self {
        Self {
            has_alpha,
            placeholder: None,
        }
    }

    pub fn with_placeholder(mut self, path: impl Into<String>) -> Self {
        self.placeholder = Some(path.into());
        self
    }

    pub fn fallback_format(&self) -> Format {
        fallback_format(self.has_alpha)
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Parse a document body. Missing `hasAlpha` or a wrong type is an error;
/// unknown keys are ignored so the schema can grow.
pub fn parse_metadata(bytes: &[u8]) -> serde_json::Result<MetadataDocument> {
    serde_json::from_slice(bytes)
}

/// Write `bytes` to `path` via a sibling temp file and a rename.
///
/// Creates parent directories as needed.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Publish the document for `logical_name` under `output_dir`.
pub fn write_metadata(
    output_dir: &Path,
    logical_name: &str,
    doc: &MetadataDocument,
) -> io::Result<PathBuf> {
    let path = output_dir.join(naming::metadata_path(logical_name));
    write_atomic(&path, &doc.to_bytes()?)?;
    Ok(path)
}

/// Read the published document for `logical_name`, if any.
pub fn read_metadata(output_dir: &Path, logical_name: &str) -> io::Result<MetadataDocument> {
    let bytes = std::fs::read(output_dir.join(naming::metadata_path(logical_name)))?;
    Ok(parse_metadata(&bytes)?)
}

/// Remove a previously published document. Returns whether one existed.
pub fn withdraw_metadata(output_dir: &Path, logical_name: &str) -> io::Result<bool> {
    match std::fs::remove_file(output_dir.join(naming::metadata_path(logical_name))) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
