//! The project index (spec.md §4.B): walks discovered files, invokes the
//! matching language adapter, and populates the symbol/usage/import/
//! export/inheritance/alias tables that the resolution engine queries.
//!
//! Grounded on the teacher's `indexing::simple_old::SimpleIndexer` shape —
//! plain `HashMap`s are the source of truth, not a mirror of some other
//! index — generalized from a single-language store to the seven-language,
//! multi-table model spec.md §3 describes.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;

use crate::config::Settings;
use crate::error::IndexResult;
use crate::indexing::walker::FileWalker;
use crate::parsing::{Language, ParserFactory};
use crate::storage::cache::{check_staleness, file_fingerprint, file_mtime, CacheSnapshot, CachedFile, ProjectCache, Staleness};
use crate::symbol::{AliasEdge, CallSite, ExportRecord, ImportEdge, InheritanceEdge, SymbolDef};
use crate::types::{CompactString, FileCounter, FileId, SymbolCounter, SymbolId};

/// One discovered and indexed source file.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub id: FileId,
    pub path: PathBuf,
    pub relative_path: CompactString,
    pub language: Language,
}

/// Summary of one `build()` call, surfaced by the CLI's `index` command.
#[derive(Debug, Default, Clone, Copy, serde::Serialize)]
pub struct BuildStats {
    pub files_scanned: usize,
    pub files_reparsed: usize,
    pub files_skipped_fast: usize,
    pub files_skipped_hash: usize,
    pub files_removed: usize,
    pub parse_errors: usize,
}

/// Everything extracted from one file, whether freshly parsed or
/// rehydrated from the cache unchanged.
struct FileExtraction {
    file_id: FileId,
    relative_path: String,
    language: Language,
    symbols: Vec<SymbolDef>,
    calls: Vec<CallSite>,
    imports: Vec<ImportEdge>,
    exports: Vec<ExportRecord>,
    aliases: Vec<AliasEdge>,
    inheritance: Vec<(String, String, u16)>,
    mtime: u64,
    sha256: String,
}

/// The in-memory project index. Bound to a root path; `build()` populates
/// it; after `build()` returns, every query is a pure read — no adapter
/// invocation happens unless a query explicitly re-reads a file (the
/// classifier's job, not this struct's).
pub struct SimpleIndexer {
    root: PathBuf,
    settings: Arc<Settings>,
    cache: ProjectCache,

    symbol_counter: SymbolCounter,
    file_counter: FileCounter,

    files: HashMap<FileId, FileRecord>,
    file_by_relpath: HashMap<String, FileId>,

    symbol_defs: HashMap<SymbolId, SymbolDef>,
    symbols_by_name: HashMap<CompactString, Vec<SymbolId>>,

    calls_by_file: HashMap<FileId, Vec<CallSite>>,
    imports: Vec<ImportEdge>,
    exports: Vec<ExportRecord>,
    aliases_by_file: HashMap<FileId, Vec<AliasEdge>>,
    inheritance: Vec<InheritanceEdge>,

    /// Per-file, per-name occurrence lines — spec.md §4.B's "lightweight
    /// identifier-occurrence list", built from call-site names since that
    /// is every name this engine can observe being used.
    usage_index: HashMap<FileId, HashMap<CompactString, Vec<u32>>>,
}

impl SimpleIndexer {
    pub fn new(root: impl Into<PathBuf>, settings: Arc<Settings>) -> Self {
        let root = root.into();
        let cache_path = root.join(&settings.cache_path);
        Self {
            root,
            settings,
            cache: ProjectCache::new(cache_path),
            symbol_counter: SymbolCounter::new(),
            file_counter: FileCounter::new(),
            files: HashMap::new(),
            file_by_relpath: HashMap::new(),
            symbol_defs: HashMap::new(),
            symbols_by_name: HashMap::new(),
            calls_by_file: HashMap::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            aliases_by_file: HashMap::new(),
            inheritance: Vec::new(),
            usage_index: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn clear_tables(&mut self) {
        self.files.clear();
        self.file_by_relpath.clear();
        self.symbol_defs.clear();
        self.symbols_by_name.clear();
        self.calls_by_file.clear();
        self.imports.clear();
        self.exports.clear();
        self.aliases_by_file.clear();
        self.inheritance.clear();
        self.usage_index.clear();
        self.symbol_counter = SymbolCounter::new();
        self.file_counter = FileCounter::new();
    }

    fn relative_path_of(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    /// True if any tracked file changed mtime/content, any new file
    /// appeared, or any tracked file vanished, *or* there is no cache yet.
    pub fn is_cache_stale(&self) -> IndexResult<bool> {
        let Some(snapshot) = self.cache.load()? else {
            return Ok(true);
        };
        let walker = FileWalker::new(self.settings.clone());
        let on_disk: std::collections::HashSet<String> = walker
            .walk(&self.root)
            .iter()
            .map(|p| self.relative_path_of(p))
            .collect();
        let cached: std::collections::HashSet<String> =
            snapshot.files.iter().map(|f| f.path.to_string()).collect();
        if on_disk != cached {
            return Ok(true);
        }
        for cached_file in &snapshot.files {
            let path = self.root.join(cached_file.path.as_ref());
            if check_staleness(cached_file, &path) != Staleness::Fresh {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Walks the project, runs adapters on changed files, rehydrates
    /// unchanged ones from the cache, and persists the new snapshot.
    /// `force_rebuild` clears every table first — the documented contract
    /// that must accompany stale-detection to avoid duplicate symbols.
    pub fn build(&mut self, force_rebuild: bool) -> IndexResult<BuildStats> {
        let mut stats = BuildStats::default();
        let previous = if force_rebuild { None } else { self.cache.load()? };

        let mut cached_by_relpath: HashMap<String, CachedFile> = HashMap::new();
        let (mut symbol_counter, mut file_counter) = (SymbolCounter::new(), FileCounter::new());
        if let Some(snapshot) = &previous {
            symbol_counter = SymbolCounter::starting_at(snapshot.next_symbol_id);
            file_counter = FileCounter::starting_at(snapshot.next_file_id);
            for cf in &snapshot.files {
                cached_by_relpath.insert(cf.path.to_string(), cf.clone());
            }
        }

        self.clear_tables();
        self.symbol_counter = symbol_counter;
        self.file_counter = file_counter;

        let walker = FileWalker::new(self.settings.clone());
        let discovered = walker.walk(&self.root);
        stats.files_scanned = discovered.len();

        // Partition into "reuse from cache" (fast/medium path, sequential,
        // cheap) and "must reparse" (slow path, parallelizable per file).
        let mut reused: Vec<(PathBuf, CachedFile, bool)> = Vec::new();
        let mut to_parse: Vec<PathBuf> = Vec::new();

        for path in &discovered {
            if Language::from_path(path).is_none() {
                continue;
            }
            let rel = self.relative_path_of(path);
            match cached_by_relpath.remove(&rel) {
                Some(cached) => match check_staleness(&cached, path) {
                    Staleness::Fresh => reused.push((path.clone(), cached, false)),
                    Staleness::TouchedNoChange => reused.push((path.clone(), cached, true)),
                    Staleness::Changed => to_parse.push(path.clone()),
                    Staleness::Removed => stats.files_removed += 1,
                },
                None => to_parse.push(path.clone()),
            }
        }
        stats.files_skipped_fast = reused.iter().filter(|(_, _, touched)| !touched).count();
        stats.files_skipped_hash = reused.iter().filter(|(_, _, touched)| *touched).count();

        let settings = self.settings.clone();
        let parsed: Vec<Option<FileExtraction>> = to_parse
            .par_iter()
            .map(|path| Self::parse_one(path, &self.root, &settings))
            .collect();

        // File ids must be assigned in a deterministic order even though
        // parsing ran unordered; sequential assignment here keeps the
        // symbol table order-independent while ids stay stable per build.
        let mut extractions: Vec<FileExtraction> = Vec::new();
        for (path, cached, touched) in reused {
            let language = Language::from_path(&path).expect("filtered above");
            let file_id = self.file_counter.next();
            extractions.push(FileExtraction {
                file_id,
                relative_path: cached.path.to_string(),
                language,
                symbols: renumber_symbols(cached.symbols.clone(), file_id),
                calls: retarget_calls(cached.calls.clone(), file_id),
                imports: retarget_imports(cached.imports.clone(), file_id),
                exports: cached.exports.clone(),
                aliases: retarget_aliases(cached.aliases.clone(), file_id),
                inheritance: cached
                    .inheritance
                    .iter()
                    .map(|e| (e.child.to_string(), e.parent.to_string(), e.order))
                    .collect(),
                mtime: if touched {
                    file_mtime(&path).unwrap_or(cached.mtime)
                } else {
                    cached.mtime
                },
                sha256: cached.sha256.to_string(),
            });
        }
        for extraction in parsed.into_iter().flatten() {
            let file_id = self.file_counter.next();
            stats.files_reparsed += 1;
            extractions.push(FileExtraction {
                file_id,
                symbols: renumber_symbols(extraction.symbols, file_id),
                calls: retarget_calls(extraction.calls, file_id),
                imports: retarget_imports(extraction.imports, file_id),
                aliases: retarget_aliases(extraction.aliases, file_id),
                ..extraction
            });
        }
        stats.parse_errors = to_parse.len().saturating_sub(stats.files_reparsed);

        let mut cached_files = Vec::with_capacity(extractions.len());
        for ext in extractions {
            // Symbol ids were assigned against the *previous* counter when
            // this came straight from cache; reassign against the
            // in-build counter so a forced rebuild never collides.
            let mut symbols = ext.symbols;
            for def in &mut symbols {
                def.id = self.symbol_counter.next();
            }

            let path = self.root.join(&ext.relative_path);
            self.files.insert(
                ext.file_id,
                FileRecord {
                    id: ext.file_id,
                    path,
                    relative_path: ext.relative_path.clone().into(),
                    language: ext.language,
                },
            );
            self.file_by_relpath.insert(ext.relative_path.clone(), ext.file_id);

            for def in &symbols {
                self.symbols_by_name.entry(def.name.clone()).or_default().push(def.id);
                self.symbol_defs.insert(def.id, def.clone());
            }

            let mut usage: HashMap<CompactString, Vec<u32>> = HashMap::new();
            for call in &ext.calls {
                usage.entry(call.name.clone()).or_default().push(call.line);
            }
            self.usage_index.insert(ext.file_id, usage);

            self.calls_by_file.insert(ext.file_id, ext.calls.clone());
            self.imports.extend(ext.imports.clone());
            self.exports.extend(ext.exports.clone());
            self.aliases_by_file.insert(ext.file_id, ext.aliases.clone());
            for (child, parent, order) in &ext.inheritance {
                self.inheritance.push(InheritanceEdge {
                    child: child.as_str().into(),
                    child_file: ext.file_id,
                    parent: parent.as_str().into(),
                    order: *order,
                });
            }

            cached_files.push(CachedFile {
                file_id: ext.file_id,
                path: ext.relative_path.into(),
                mtime: ext.mtime,
                sha256: ext.sha256.into(),
                symbols,
                imports: ext.imports,
                exports: ext.exports,
                aliases: ext.aliases,
                inheritance: ext
                    .inheritance
                    .into_iter()
                    .map(|(child, parent, order)| InheritanceEdge {
                        child: child.into(),
                        child_file: ext.file_id,
                        parent: parent.into(),
                        order,
                    })
                    .collect(),
                calls: ext.calls,
            });
        }

        self.link_containing_defs();

        let snapshot = CacheSnapshot::new(
            self.symbol_counter.peek_next(),
            self.file_counter.peek_next(),
            cached_files,
        );
        self.cache.save(&snapshot)?;

        Ok(stats)
    }

    /// Loads the persisted snapshot into memory without touching disk
    /// files or re-running adapters — the round-trip law from spec.md §8.
    pub fn load_cache(&mut self) -> IndexResult<bool> {
        let Some(snapshot) = self.cache.load()? else {
            return Ok(false);
        };
        self.clear_tables();
        self.symbol_counter = SymbolCounter::starting_at(snapshot.next_symbol_id);
        self.file_counter = FileCounter::starting_at(snapshot.next_file_id);

        for cf in snapshot.files {
            let language = Language::from_path(Path::new(cf.path.as_ref())).unwrap_or(Language::Rust);
            let path = self.root.join(cf.path.as_ref());
            self.files.insert(
                cf.file_id,
                FileRecord {
                    id: cf.file_id,
                    path,
                    relative_path: cf.path.clone(),
                    language,
                },
            );
            self.file_by_relpath.insert(cf.path.to_string(), cf.file_id);

            for def in &cf.symbols {
                self.symbols_by_name.entry(def.name.clone()).or_default().push(def.id);
                self.symbol_defs.insert(def.id, def.clone());
            }
            let mut usage: HashMap<CompactString, Vec<u32>> = HashMap::new();
            for call in &cf.calls {
                usage.entry(call.name.clone()).or_default().push(call.line);
            }
            self.usage_index.insert(cf.file_id, usage);
            self.calls_by_file.insert(cf.file_id, cf.calls);
            self.imports.extend(cf.imports);
            self.exports.extend(cf.exports);
            self.aliases_by_file.insert(cf.file_id, cf.aliases);
            self.inheritance.extend(cf.inheritance);
        }
        self.link_containing_defs();
        Ok(true)
    }

    pub fn save_cache(&self) -> IndexResult<()> {
        let files: Vec<CachedFile> = self
            .files
            .values()
            .map(|f| {
                let symbols: Vec<SymbolDef> = self
                    .symbol_defs
                    .values()
                    .filter(|d| d.file == f.id)
                    .cloned()
                    .collect();
                let (mtime, sha256) = file_fingerprint(&f.path)
                    .map(|(m, s)| (m, s))
                    .unwrap_or((0, String::new()));
                CachedFile {
                    file_id: f.id,
                    path: f.relative_path.clone(),
                    mtime,
                    sha256: sha256.into(),
                    symbols,
                    imports: self.imports.iter().filter(|i| i.importing_file == f.id).cloned().collect(),
                    exports: self.exports.iter().filter(|e| e.file == f.id).cloned().collect(),
                    aliases: self.aliases_by_file.get(&f.id).cloned().unwrap_or_default(),
                    inheritance: self.inheritance.iter().filter(|e| e.child_file == f.id).cloned().collect(),
                    calls: self.calls_by_file.get(&f.id).cloned().unwrap_or_default(),
                }
            })
            .collect();
        let snapshot = CacheSnapshot::new(self.symbol_counter.peek_next(), self.file_counter.peek_next(), files);
        self.cache.save(&snapshot)
    }

    fn parse_one(path: &Path, root: &Path, settings: &Arc<Settings>) -> Option<FileExtraction> {
        let language = Language::from_path(path)?;
        let relative_path = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        let code = fs::read_to_string(path).ok()?;
        let factory = ParserFactory::new(settings.clone());
        let mut parser = factory.create_parser(language).ok()?;

        // A placeholder FileId; real ids are assigned once sequentially by
        // the caller after parallel parsing completes, so that `build()`'s
        // file-processing order (spec.md §5: "unobservable") never leaks
        // into assigned ids. Calls/imports/aliases are retargeted to the
        // real id via `retarget_*` right after.
        let placeholder = FileId::new(1).unwrap();
        let mut counter = SymbolCounter::new();
        let symbols = parser.parse(&code, placeholder, &relative_path, &mut counter);
        let calls = parser.find_calls(&code, placeholder);
        let imports = parser.find_imports(&code, placeholder);
        let exports = parser.find_exports(&code, placeholder);
        let aliases = parser.find_aliases(&code, placeholder);
        let inheritance = parser.find_extends(&code);
        let (mtime, sha256) = file_fingerprint(path).ok()?;

        Some(FileExtraction {
            file_id: placeholder,
            relative_path,
            language,
            symbols,
            calls,
            imports,
            exports,
            aliases,
            inheritance,
            mtime,
            sha256,
        })
    }

    /// Resolves each call site's `containing_def`: the def whose range
    /// contains the call line, preferring the innermost (smallest) range
    /// when several nest (shadowed inner function case, spec.md §4.C rule 1).
    fn link_containing_defs(&mut self) {
        let mut defs_by_file: HashMap<FileId, Vec<SymbolId>> = HashMap::new();
        for def in self.symbol_defs.values() {
            defs_by_file.entry(def.file).or_default().push(def.id);
        }
        for (file_id, calls) in self.calls_by_file.iter_mut() {
            let Some(candidate_ids) = defs_by_file.get(file_id) else { continue };
            for call in calls.iter_mut() {
                let mut best: Option<(SymbolId, u32)> = None;
                for &id in candidate_ids {
                    let def = &self.symbol_defs[&id];
                    if def.range.contains_line(call.line) {
                        let span = def.range.end_line.saturating_sub(def.range.start_line);
                        if best.map(|(_, b)| span < b).unwrap_or(true) {
                            best = Some((id, span));
                        }
                    }
                }
                call.containing_def = best.map(|(id, _)| id);
            }
        }
    }

    // --- accessors used by the resolution engine ---

    pub fn symbol(&self, id: SymbolId) -> Option<&SymbolDef> {
        self.symbol_defs.get(&id)
    }

    pub fn defs_by_name(&self, name: &str) -> Vec<&SymbolDef> {
        self.symbols_by_name
            .get(name)
            .map(|ids| ids.iter().filter_map(|id| self.symbol_defs.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn all_defs(&self) -> impl Iterator<Item = &SymbolDef> {
        self.symbol_defs.values()
    }

    pub fn all_names(&self) -> impl Iterator<Item = &str> {
        self.symbols_by_name.keys().map(|k| k.as_ref())
    }

    pub fn calls_in_file(&self, file: FileId) -> &[CallSite] {
        self.calls_by_file.get(&file).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn all_calls(&self) -> impl Iterator<Item = &CallSite> {
        self.calls_by_file.values().flatten()
    }

    pub fn aliases_in_file(&self, file: FileId) -> &[AliasEdge] {
        self.aliases_by_file.get(&file).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn inheritance_edges(&self) -> &[InheritanceEdge] {
        &self.inheritance
    }

    pub fn imports(&self) -> &[ImportEdge] {
        &self.imports
    }

    pub fn exports(&self) -> &[ExportRecord] {
        &self.exports
    }

    pub fn file(&self, id: FileId) -> Option<&FileRecord> {
        self.files.get(&id)
    }

    pub fn file_by_relative_path(&self, relative_path: &str) -> Option<&FileRecord> {
        self.file_by_relpath.get(relative_path).and_then(|id| self.files.get(id))
    }

    pub fn files(&self) -> impl Iterator<Item = &FileRecord> {
        self.files.values()
    }

    /// Whether `name` is mentioned in any usage-index entry anywhere in
    /// the project (used by `deadcode`).
    pub fn is_mentioned_anywhere(&self, name: &str) -> bool {
        self.usage_index.values().any(|per_name| per_name.contains_key(name))
    }

    pub fn usage_lines(&self, file: FileId, name: &str) -> &[u32] {
        self.usage_index
            .get(&file)
            .and_then(|m| m.get(name))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

fn renumber_symbols(symbols: Vec<SymbolDef>, file_id: FileId) -> Vec<SymbolDef> {
    symbols.into_iter().map(|mut s| { s.file = file_id; s }).collect()
}

fn retarget_calls(calls: Vec<CallSite>, file_id: FileId) -> Vec<CallSite> {
    calls.into_iter().map(|mut c| { c.file = file_id; c.containing_def = None; c }).collect()
}

fn retarget_imports(imports: Vec<ImportEdge>, file_id: FileId) -> Vec<ImportEdge> {
    imports.into_iter().map(|mut i| { i.importing_file = file_id; i }).collect()
}

fn retarget_aliases(aliases: Vec<AliasEdge>, file_id: FileId) -> Vec<AliasEdge> {
    aliases.into_iter().map(|mut a| { a.file = file_id; a }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn indexer(dir: &TempDir) -> SimpleIndexer {
        SimpleIndexer::new(dir.path(), Arc::new(Settings::default()))
    }

    #[test]
    fn test_build_extracts_symbols_and_calls() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("lib.rs"),
            "fn helper() {}\nfn caller() { helper(); }\n",
        )
        .unwrap();
        let mut idx = indexer(&dir);
        let stats = idx.build(false).unwrap();
        assert_eq!(stats.files_reparsed, 1);
        assert_eq!(idx.defs_by_name("helper").len(), 1);
        assert!(idx.all_calls().any(|c| c.name.as_ref() == "helper"));
    }

    #[test]
    fn test_rebuild_no_duplicates() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("lib.rs"), "fn one() {}\n").unwrap();
        let mut idx = indexer(&dir);
        idx.build(false).unwrap();
        assert_eq!(idx.defs_by_name("one").len(), 1);

        let mut idx2 = SimpleIndexer::new(dir.path(), Arc::new(Settings::default()));
        idx2.build(true).unwrap();
        assert_eq!(idx2.defs_by_name("one").len(), 1);
    }

    #[test]
    fn test_fast_path_skips_reparse_on_unchanged_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("lib.rs"), "fn one() {}\n").unwrap();
        let mut idx = indexer(&dir);
        idx.build(false).unwrap();

        let mut idx2 = SimpleIndexer::new(dir.path(), Arc::new(Settings::default()));
        let stats = idx2.build(false).unwrap();
        assert_eq!(stats.files_reparsed, 0);
        assert_eq!(stats.files_skipped_fast, 1);
        assert_eq!(idx2.defs_by_name("one").len(), 1);
    }

    #[test]
    fn test_stale_cache_detected_after_rewrite() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("lib.rs");
        fs::write(&file, "fn one() {}\n").unwrap();
        let mut idx = indexer(&dir);
        idx.build(false).unwrap();
        assert!(!idx.is_cache_stale().unwrap());

        std::thread::sleep(std::time::Duration::from_millis(10));
        fs::write(&file, "fn one() {}\nfn two() {}\n").unwrap();
        assert!(idx.is_cache_stale().unwrap());

        let mut rebuilt = SimpleIndexer::new(dir.path(), Arc::new(Settings::default()));
        rebuilt.build(true).unwrap();
        assert_eq!(rebuilt.defs_by_name("one").len(), 1);
        assert_eq!(rebuilt.defs_by_name("two").len(), 1);
    }

    #[test]
    fn test_containing_def_links_call_to_enclosing_function() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("lib.rs"),
            "fn helper() {}\nfn caller() { helper(); }\n",
        )
        .unwrap();
        let mut idx = indexer(&dir);
        idx.build(false).unwrap();

        let caller_def = idx.defs_by_name("caller")[0];
        let call = idx.all_calls().find(|c| c.name.as_ref() == "helper").unwrap();
        assert_eq!(call.containing_def, Some(caller_def.id));
    }
}
