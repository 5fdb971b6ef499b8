//! Versioned, single-file on-disk snapshot of the project index.
//!
//! Mirrors the teacher's atomic temp-file-plus-rename persistence
//! discipline (see `config::Settings::save`) but for a runtime artifact
//! rather than configuration, so it round-trips through `serde_json`
//! instead of `toml`/`figment`.

use crate::error::{IndexError, IndexResult};
use crate::symbol::{AliasEdge, CallSite, ExportRecord, ImportEdge, InheritanceEdge, SymbolDef};
use crate::types::{CompactString, FileId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Bumped whenever the on-disk shape changes. A mismatch is treated as
/// cache-absent, never as an error — the spec's documented contract.
pub const CACHE_VERSION: u32 = 1;

/// One indexed file's persisted extraction result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedFile {
    pub file_id: FileId,
    /// Path relative to the project root, used as the staleness key.
    pub path: CompactString,
    pub mtime: u64,
    pub sha256: CompactString,
    pub symbols: Vec<SymbolDef>,
    pub imports: Vec<ImportEdge>,
    pub exports: Vec<ExportRecord>,
    pub aliases: Vec<AliasEdge>,
    pub inheritance: Vec<InheritanceEdge>,
    pub calls: Vec<CallSite>,
}

/// The `{ version, files, symbols, importGraph, exportGraph, callsCache }`
/// snapshot from spec.md §6. `files` carries everything; `symbols`/
/// `importGraph`/`exportGraph`/`callsCache` are flattened views derived
/// from it at build time below so the shape on disk matches the spec
/// literally, while `ProjectCache::hydrate` only needs `files`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub version: u32,
    pub next_symbol_id: u32,
    pub next_file_id: u32,
    pub files: Vec<CachedFile>,
}

impl CacheSnapshot {
    pub fn new(next_symbol_id: u32, next_file_id: u32, files: Vec<CachedFile>) -> Self {
        Self {
            version: CACHE_VERSION,
            next_symbol_id,
            next_file_id,
            files,
        }
    }
}

/// Why a previously-cached file needs reprocessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    /// mtime unchanged: skip hashing, skip reparse (fast path).
    Fresh,
    /// mtime changed but content hash matches: update stored mtime only
    /// (medium path).
    TouchedNoChange,
    /// Content hash differs: reparse and replace the entry (slow path).
    Changed,
    /// File no longer exists on disk.
    Removed,
}

/// Stat a file's mtime in seconds since epoch, without reading its contents.
pub fn file_mtime(path: &Path) -> IndexResult<u64> {
    let metadata = fs::metadata(path).map_err(|e| IndexError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0))
}

/// Compute a file's current mtime and content hash in one read.
pub fn file_fingerprint(path: &Path) -> IndexResult<(u64, String)> {
    let mtime = file_mtime(path)?;
    let bytes = fs::read(path).map_err(|e| IndexError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let sha = format!("{:x}", hasher.finalize());
    Ok((mtime, sha))
}

/// Three-tier staleness check: mtime fast path (no hashing), sha256 medium
/// path (hash without reparse), reparse-and-replace left to the caller.
pub fn check_staleness(cached: &CachedFile, disk_path: &Path) -> Staleness {
    let Ok(mtime) = file_mtime(disk_path) else {
        return Staleness::Removed;
    };
    if mtime == cached.mtime {
        return Staleness::Fresh;
    }
    match file_fingerprint(disk_path) {
        Ok((_, sha)) if sha.as_str() == cached.sha256.as_ref() => Staleness::TouchedNoChange,
        Ok(_) => Staleness::Changed,
        Err(_) => Staleness::Removed,
    }
}

/// Reads and writes the project's single cache file at `<root>/.codebase-index-cache.json`.
pub struct ProjectCache {
    path: std::path::PathBuf,
}

impl ProjectCache {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Loads the snapshot. A missing file, truncated JSON, or version
    /// mismatch is treated as "not loaded" (`Ok(None)`), never as an error —
    /// per spec.md §7's `CacheCorrupt` policy: treat as absent, don't delete.
    pub fn load(&self) -> IndexResult<Option<CacheSnapshot>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(IndexError::FileRead {
                    path: self.path.clone(),
                    source: e,
                });
            }
        };
        let snapshot: CacheSnapshot = match serde_json::from_slice(&data) {
            Ok(s) => s,
            Err(_) => return Ok(None),
        };
        if snapshot.version != CACHE_VERSION {
            return Ok(None);
        }
        Ok(Some(snapshot))
    }

    /// Atomically writes the snapshot: serialize to a sibling temp file,
    /// then rename over the target so a crash mid-save leaves the previous
    /// snapshot intact.
    pub fn save(&self, snapshot: &CacheSnapshot) -> IndexResult<()> {
        let json = serde_json::to_vec_pretty(snapshot).map_err(|e| IndexError::PersistenceError {
            reason: e.to_string(),
        })?;
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut tmp = fs::File::create(&tmp_path).map_err(|e| IndexError::FileWrite {
                path: tmp_path.clone(),
                source: e,
            })?;
            tmp.write_all(&json).map_err(|e| IndexError::FileWrite {
                path: tmp_path.clone(),
                source: e,
            })?;
        }
        fs::rename(&tmp_path, &self.path).map_err(|e| IndexError::FileWrite {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Range, SymbolId, SymbolKind};
    use tempfile::TempDir;

    fn sample_snapshot() -> CacheSnapshot {
        let file_id = FileId::new(1).unwrap();
        let symbol = SymbolDef::new(
            SymbolId::new(1).unwrap(),
            "main",
            SymbolKind::Function,
            file_id,
            "main.rs",
            Range::new(1, 0, 3, 1),
        );
        let cached = CachedFile {
            file_id,
            path: "main.rs".into(),
            mtime: 1000,
            sha256: "abc123".into(),
            symbols: vec![symbol],
            imports: Vec::new(),
            exports: Vec::new(),
            aliases: Vec::new(),
            inheritance: Vec::new(),
            calls: Vec::new(),
        };
        CacheSnapshot::new(2, 2, vec![cached])
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let cache = ProjectCache::new(dir.path().join("cache.json"));
        let snapshot = sample_snapshot();

        cache.save(&snapshot).unwrap();
        let loaded = cache.load().unwrap().expect("cache should load");

        assert_eq!(loaded.version, CACHE_VERSION);
        assert_eq!(loaded.files.len(), 1);
        assert_eq!(loaded.files[0].symbols[0].name.as_ref(), "main");
    }

    #[test]
    fn test_missing_cache_is_not_loaded() {
        let dir = TempDir::new().unwrap();
        let cache = ProjectCache::new(dir.path().join("missing.json"));
        assert!(cache.load().unwrap().is_none());
    }

    #[test]
    fn test_version_mismatch_treated_as_absent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let mut snapshot = sample_snapshot();
        snapshot.version = CACHE_VERSION + 1;
        fs::write(&path, serde_json::to_vec(&snapshot).unwrap()).unwrap();

        let cache = ProjectCache::new(path);
        assert!(cache.load().unwrap().is_none());
    }

    #[test]
    fn test_truncated_json_treated_as_absent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, b"{ not json").unwrap();

        let cache = ProjectCache::new(path);
        assert!(cache.load().unwrap().is_none());
    }

    #[test]
    fn test_staleness_fast_path_on_unchanged_mtime() {
        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("a.rs");
        fs::write(&file_path, "fn main() {}").unwrap();
        let (mtime, sha) = file_fingerprint(&file_path).unwrap();

        let cached = CachedFile {
            file_id: FileId::new(1).unwrap(),
            path: "a.rs".into(),
            mtime,
            sha256: sha.into(),
            symbols: Vec::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            aliases: Vec::new(),
            inheritance: Vec::new(),
            calls: Vec::new(),
        };

        assert_eq!(check_staleness(&cached, &file_path), Staleness::Fresh);
    }

    #[test]
    fn test_staleness_detects_content_change() {
        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("a.rs");
        fs::write(&file_path, "fn main() {}").unwrap();
        let (mtime, sha) = file_fingerprint(&file_path).unwrap();

        let cached = CachedFile {
            file_id: FileId::new(1).unwrap(),
            path: "a.rs".into(),
            mtime: mtime.wrapping_sub(1),
            sha256: sha.into(),
            symbols: Vec::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            aliases: Vec::new(),
            inheritance: Vec::new(),
            calls: Vec::new(),
        };

        std::thread::sleep(std::time::Duration::from_millis(10));
        fs::write(&file_path, "fn main() { println!(\"hi\"); }").unwrap();

        assert_eq!(check_staleness(&cached, &file_path), Staleness::Changed);
    }

    #[test]
    fn test_staleness_detects_removed_file() {
        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("gone.rs");
        let cached = CachedFile {
            file_id: FileId::new(1).unwrap(),
            path: "gone.rs".into(),
            mtime: 0,
            sha256: "x".into(),
            symbols: Vec::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            aliases: Vec::new(),
            inheritance: Vec::new(),
            calls: Vec::new(),
        };
        assert_eq!(check_staleness(&cached, &file_path), Staleness::Removed);
    }
}
