//! Encode cache for incremental runs.
//!
//! Encoding is the slow part of a run: a single source at four widths and two
//! formats is eight Lanczos resizes and eight encodes. The cache lets a rerun
//! skip an artifact when neither the source bytes nor its encode parameters
//! changed since the last run.
//!
//! # Keys
//!
//! Lookups are content-addressed on `source_hash` + `params_hash`, not on the
//! artifact path:
//!
//! - **`source_hash`**: SHA-256 of the source file bytes. Survives `git
//!   checkout` resetting mtimes.
//! - **`params_hash`**: SHA-256 of (format, pixel width, pixel height,
//!   quality). Changing any config value that affects an artifact changes it.
//!
//! A hit needs a matching entry **and** the recorded file still on disk. A hit
//! under a different path (the source was renamed, so its logical name
//! changed) is copied to the new path instead of re-encoded.
//!
//! Metadata documents are never cached; they are cheap and rewritten on every
//! run with identical bytes.
//!
//! # Storage
//!
//! `<output_dir>/.cache-manifest.json`. A missing, corrupt, or
//! version-mismatched manifest loads as empty. `--no-cache` starts from an
//! empty manifest too, and overwrites it at the end of the run.

use crate::imaging::EncodeParams;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

const MANIFEST_FILENAME: &str = ".cache-manifest.json";

/// Bump to invalidate every existing cache when key computation changes.
const MANIFEST_VERSION: u32 = 1;

/// Hashes an artifact was produced from.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub source_hash: String,
    pub params_hash: String,
}

/// On-disk map from artifact path to the hashes it was produced from.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CacheManifest {
    pub version: u32,
    pub entries: HashMap<String, CacheEntry>,
    /// `"{source_hash}:{params_hash}"` → artifact path. Rebuilt on load.
    #[serde(skip)]
    by_content: HashMap<String, String>,
}

fn content_key(source_hash: &str, params_hash: &str) -> String {
    format!("{source_hash}:{params_hash}")
}

impl CacheManifest {
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: HashMap::new(),
            by_content: HashMap::new(),
        }
    }

    /// Load from the output directory, falling back to empty.
    pub fn load(output_dir: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(manifest_path(output_dir)) else {
            return Self::empty();
        };
        let Ok(mut manifest) = serde_json::from_str::<Self>(&content) else {
            return Self::empty();
        };
        if manifest.version != MANIFEST_VERSION {
            return Self::empty();
        }
        manifest.by_content = manifest
            .entries
            .iter()
            .map(|(path, e)| (content_key(&e.source_hash, &e.params_hash), path.clone()))
            .collect();
        manifest
    }

    pub fn save(&self, output_dir: &Path) -> io::Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        crate::metadata::write_atomic(&manifest_path(output_dir), &json)
    }

    /// Artifact path previously produced from these hashes, if its file still
    /// exists under `output_dir`. May differ from the path the caller wants.
    ///
    /// The entry recorded for the stored path must still carry these hashes;
    /// a path since overwritten with other content is never a hit.
    pub fn find_cached(
        &self,
        source_hash: &str,
        params_hash: &str,
        output_dir: &Path,
    ) -> Option<String> {
        let stored = self.by_content.get(&content_key(source_hash, params_hash))?;
        let entry = self.entries.get(stored)?;
        if entry.source_hash != source_hash || entry.params_hash != params_hash {
            return None;
        }
        output_dir.join(stored).is_file().then(|| stored.clone())
    }

    /// Forget whatever `artifact_path` was produced from. Call before
    /// overwriting the file so no lookup can resolve to it mid-write.
    pub fn invalidate(&mut self, artifact_path: &str) {
        let Some(old) = self.entries.remove(artifact_path) else {
            return;
        };
        let key = content_key(&old.source_hash, &old.params_hash);
        if self.by_content.get(&key).map(String::as_str) == Some(artifact_path) {
            self.by_content.remove(&key);
        }
    }

    /// Record that `artifact_path` was produced from these hashes.
    ///
    /// Drops the entry of an older path holding the same content, so the
    /// manifest doesn't accumulate entries for renamed sources, and the
    /// content key the path was previously recorded under.
    pub fn insert(&mut self, artifact_path: String, source_hash: String, params_hash: String) {
        self.invalidate(&artifact_path);
        let key = content_key(&source_hash, &params_hash);
        if let Some(old) = self.by_content.get(&key) {
            if *old != artifact_path {
                self.entries.remove(old.as_str());
            }
        }
        self.by_content.insert(key, artifact_path.clone());
        self.entries.insert(
            artifact_path,
            CacheEntry {
                source_hash,
                params_hash,
            },
        );
    }
}

pub fn manifest_path(output_dir: &Path) -> PathBuf {
    output_dir.join(MANIFEST_FILENAME)
}

/// SHA-256 of a file's contents, as hex.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

/// SHA-256 of everything that determines an artifact's bytes besides the
/// source.
pub fn hash_encode_params(params: &EncodeParams) -> String {
    let mut hasher = Sha256::new();
    hasher.update(params.format.extension().as_bytes());
    hasher.update(b"\0");
    hasher.update(params.width.to_le_bytes());
    hasher.update(params.height.to_le_bytes());
    hasher.update(params.quality.value().to_le_bytes());
    format!("{:x}", hasher.finalize())
}

/// Per-run cache counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub copies: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn total(&self) -> u32 {
        self.hits + self.copies + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.hits, self.copies) {
            (0, 0) => write!(f, "{} encoded", self.misses),
            (_, 0) => write!(
                f,
                "{} cached, {} encoded ({} total)",
                self.hits,
                self.misses,
                self.total()
            ),
            _ => write!(
                f,
                "{} cached, {} copied, {} encoded ({} total)",
                self.hits,
                self.copies,
                self.misses,
                self.total()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::Quality;
    use crate::types::Format;
    use std::fs;
    use tempfile::TempDir;

    fn params(width: u32, format: Format, quality: u32) -> EncodeParams {
        EncodeParams {
            width,
            height: width / 2,
            format,
            quality: Quality::new(quality),
        }
    }

    #[test]
    fn hit_requires_file_on_disk() {
        let tmp = TempDir::new().unwrap();
        let mut m = CacheManifest::empty();
        m.insert("webp/a-300.webp".into(), "src".into(), "prm".into());

        assert_eq!(m.find_cached("src", "prm", tmp.path()), None);

        fs::create_dir_all(tmp.path().join("webp")).unwrap();
        fs::write(tmp.path().join("webp/a-300.webp"), "data").unwrap();
        assert_eq!(
            m.find_cached("src", "prm", tmp.path()),
            Some("webp/a-300.webp".to_string())
        );
    }

    #[test]
    fn miss_on_either_hash() {
        let tmp = TempDir::new().unwrap();
        let mut m = CacheManifest::empty();
        m.insert("out.jpg".into(), "s".into(), "p".into());
        fs::write(tmp.path().join("out.jpg"), "data").unwrap();

        assert_eq!(m.find_cached("other", "p", tmp.path()), None);
        assert_eq!(m.find_cached("s", "other", tmp.path()), None);
    }

    #[test]
    fn insert_drops_entry_of_renamed_source() {
        let mut m = CacheManifest::empty();
        m.insert("jpg/old-300.jpg".into(), "s".into(), "p".into());
        m.insert("jpg/new-300.jpg".into(), "s".into(), "p".into());

        assert!(!m.entries.contains_key("jpg/old-300.jpg"));
        assert!(m.entries.contains_key("jpg/new-300.jpg"));
    }

    #[test]
    fn overwritten_path_is_no_longer_a_hit_for_old_content() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("jpg")).unwrap();
        fs::write(tmp.path().join("jpg/photo-16.jpg"), "blue").unwrap();
        let mut m = CacheManifest::empty();
        m.insert("jpg/photo-16.jpg".into(), "red".into(), "p".into());
        m.insert("jpg/photo-16.jpg".into(), "blue".into(), "p".into());

        assert_eq!(m.find_cached("red", "p", tmp.path()), None);
        assert_eq!(
            m.find_cached("blue", "p", tmp.path()),
            Some("jpg/photo-16.jpg".to_string())
        );
        assert!(!m.by_content.contains_key("red:p"));
    }

    #[test]
    fn stale_content_index_is_not_trusted() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.jpg"), "data").unwrap();
        let mut m = CacheManifest::empty();
        m.insert("a.jpg".into(), "s1".into(), "p".into());
        m.by_content.insert("s0:p".into(), "a.jpg".into());

        assert_eq!(m.find_cached("s0", "p", tmp.path()), None);
    }

    #[test]
    fn invalidate_forgets_path_and_content() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.jpg"), "data").unwrap();
        let mut m = CacheManifest::empty();
        m.insert("a.jpg".into(), "s".into(), "p".into());

        m.invalidate("a.jpg");
        m.invalidate("never-recorded.jpg");

        assert!(m.entries.is_empty());
        assert_eq!(m.find_cached("s", "p", tmp.path()), None);
    }

    #[test]
    fn save_and_load_rebuild_content_index() {
        let tmp = TempDir::new().unwrap();
        let mut m = CacheManifest::empty();
        m.insert("webp/x-300.webp".into(), "s1".into(), "p1".into());
        m.save(tmp.path()).unwrap();

        let loaded = CacheManifest::load(tmp.path());
        assert_eq!(loaded.entries.len(), 1);
        assert_eq!(
            loaded.by_content.get("s1:p1"),
            Some(&"webp/x-300.webp".to_string())
        );
    }

    #[test]
    fn load_falls_back_to_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(CacheManifest::load(tmp.path()).entries.is_empty());

        fs::write(manifest_path(tmp.path()), "not json").unwrap();
        assert!(CacheManifest::load(tmp.path()).entries.is_empty());

        let wrong_version = format!(
            r#"{{"version": {}, "entries": {{"a": {{"source_hash":"h","params_hash":"p"}}}}}}"#,
            MANIFEST_VERSION + 1
        );
        fs::write(manifest_path(tmp.path()), wrong_version).unwrap();
        assert!(CacheManifest::load(tmp.path()).entries.is_empty());
    }

    #[test]
    fn hash_file_tracks_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("src.png");
        fs::write(&path, b"v1").unwrap();
        let h1 = hash_file(&path).unwrap();
        assert_eq!(h1, hash_file(&path).unwrap());
        assert_eq!(h1.len(), 64);

        fs::write(&path, b"v2").unwrap();
        assert_ne!(h1, hash_file(&path).unwrap());
    }

    #[test]
    fn params_hash_varies_with_every_input() {
        let base = hash_encode_params(&params(300, Format::Webp, 80));
        assert_eq!(base, hash_encode_params(&params(300, Format::Webp, 80)));
        assert_ne!(base, hash_encode_params(&params(600, Format::Webp, 80)));
        assert_ne!(base, hash_encode_params(&params(300, Format::Jpg, 80)));
        assert_ne!(base, hash_encode_params(&params(300, Format::Webp, 81)));
    }

    #[test]
    fn stats_display() {
        let s = CacheStats {
            hits: 0,
            copies: 0,
            misses: 3,
        };
        assert_eq!(s.to_string(), "3 encoded");

        let s = CacheStats {
            hits: 5,
            copies: 0,
            misses: 2,
        };
        assert_eq!(s.to_string(), "5 cached, 2 encoded (7 total)");

        let s = CacheStats {
            hits: 3,
            copies: 2,
            misses: 1,
        };
        assert_eq!(s.to_string(), "3 cached, 2 copied, 1 encoded (6 total)");
    }
}
