//! Asset metadata for transform hooks.
//!
//! Hooks that fingerprint URLs need to know what a URL points at on disk.
//! [`FsStats`] answers that by hashing the file with blake3, caching the
//! result until the file's size or mtime changes.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use dashmap::DashMap;
use percent_encoding::percent_decode_str;

use crate::debug;

/// Source of asset metadata.
pub trait StatsProvider: Send + Sync {
    /// Metadata for the asset a root-relative `clean` URL points at.
    fn stats(&self, clean: &str, root: &Path) -> Option<AssetStats>;
}

/// Metadata of one referenced asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetStats {
    /// File on disk
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<SystemTime>,
    /// Hex-encoded blake3 digest of the contents
    pub hash: String,
}

impl AssetStats {
    /// Short content fingerprint (first 8 hex chars).
    #[inline]
    pub fn fingerprint(&self) -> &str {
        &self.hash[..self.hash.len().min(8)]
    }
}

/// Filesystem-backed provider with a content hash cache.
#[derive(Debug, Default)]
pub struct FsStats {
    cache: DashMap<PathBuf, AssetStats>,
}

impl FsStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    fn lookup(&self, path: &Path) -> Option<AssetStats> {
        let meta = fs::metadata(path).ok().filter(|meta| meta.is_file())?;
        let size = meta.len();
        let modified = meta.modified().ok();

        if let Some(cached) = self.cache.get(path)
            && cached.size == size
            && cached.modified == modified
        {
            return Some(cached.clone());
        }

        let hash = match hash_file(path) {
            Ok(hash) => hash,
            Err(err) => {
                debug!("stats"; "{}: {}", path.display(), err);
                return None;
            }
        };
        let stats = AssetStats {
            path: path.to_path_buf(),
            size,
            modified,
            hash,
        };
        self.cache.insert(path.to_path_buf(), stats.clone());
        Some(stats)
    }
}

impl StatsProvider for FsStats {
    fn stats(&self, clean: &str, root: &Path) -> Option<AssetStats> {
        let path = asset_path(clean, root)?;
        self.lookup(&path)
    }
}

/// Map a root-relative URL to a file below `root`.
///
/// Query and fragment are dropped and `%XX` escapes decoded.
pub fn asset_path(clean: &str, root: &Path) -> Option<PathBuf> {
    let end = clean.find(['?', '#']).unwrap_or(clean.len());
    let decoded = percent_decode_str(&clean[..end]).decode_utf8().ok()?;
    let relative = decoded.trim_start_matches('/');
    if relative.is_empty() {
        return None;
    }
    Some(root.join(relative))
}

fn hash_file(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::with_capacity(64 * 1024, File::open(path)?);
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                hasher.update(&buffer[..n]);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(hex::encode(hasher.finalize().as_bytes()))
}
