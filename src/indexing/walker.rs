//! File system walker for discovering source files to index.
//!
//! Grounded on the teacher's `indexing::walker::FileWalker` (`.gitignore`
//! handling, custom ignore patterns, language filtering), extended to all
//! seven languages and to the conditional `vendor/`/`Pods/` override rules
//! from spec.md §6.

use crate::indexing::project_detect::{detect_markers, should_ignore_pods, should_ignore_vendor};
use crate::parsing::Language;
use crate::Settings;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Directories that are always ignored, regardless of project markers.
const ALWAYS_IGNORED: &[&str] = &["node_modules", ".git", "target", "__pycache__"];

/// Walks a project root to find source files to index.
pub struct FileWalker {
    settings: Arc<Settings>,
}

impl FileWalker {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    /// Walk `root` and return every file whose extension maps to an
    /// enabled language, honoring `.gitignore` and the conditional
    /// `vendor/`/`Pods/` rules.
    pub fn walk(&self, root: &Path) -> Vec<PathBuf> {
        let markers = detect_markers(root);
        let mut builder = WalkBuilder::new(root);
        builder
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .follow_links(false)
            .max_depth(None)
            .require_git(false);

        let mut overrides = ignore::overrides::OverrideBuilder::new(root);
        for dir in ALWAYS_IGNORED {
            let _ = overrides.add(&format!("!{dir}"));
        }
        if should_ignore_vendor(&markers) {
            let _ = overrides.add("!vendor");
        }
        if should_ignore_pods(&markers) {
            let _ = overrides.add("!Pods");
        }
        for pattern in &self.settings.indexing.ignore_patterns {
            if let Err(e) = overrides.add(&format!("!{pattern}")) {
                tracing::warn!("invalid ignore pattern '{pattern}': {e}");
            }
        }
        if let Ok(built) = overrides.build() {
            builder.overrides(built);
        }

        let enabled = self.enabled_languages();
        builder
            .build()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .filter_map(|entry| {
                let path = entry.path();
                let language = Language::from_path(path)?;
                enabled.contains(&language).then(|| path.to_path_buf())
            })
            .collect()
    }

    fn enabled_languages(&self) -> Vec<Language> {
        Language::all()
            .iter()
            .copied()
            .filter(|lang| {
                self.settings
                    .languages
                    .get(lang.config_key())
                    .map(|c| c.enabled)
                    .unwrap_or(false)
            })
            .collect()
    }

    pub fn count_files(&self, root: &Path) -> usize {
        self.walk(root).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_walk_finds_every_enabled_language() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();
        fs::write(dir.path().join("app.py"), "def f(): pass").unwrap();
        fs::write(dir.path().join("index.ts"), "export const x = 1;").unwrap();
        fs::write(dir.path().join("README.md"), "# hi").unwrap();

        let walker = FileWalker::new(Arc::new(Settings::default()));
        let files = walker.walk(dir.path());
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn test_vendor_ignored_only_with_go_mod() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("go.mod"), "module x\n").unwrap();
        fs::create_dir_all(dir.path().join("vendor")).unwrap();
        fs::write(dir.path().join("vendor/dep.go"), "package dep").unwrap();
        fs::write(dir.path().join("main.go"), "package main").unwrap();

        let walker = FileWalker::new(Arc::new(Settings::default()));
        let files = walker.walk(dir.path());
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("main.go"));
    }

    #[test]
    fn test_vendor_kept_without_go_or_php_marker() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("vendor")).unwrap();
        fs::write(dir.path().join("vendor/helper.js"), "module.exports = {};").unwrap();

        let walker = FileWalker::new(Arc::new(Settings::default()));
        let files = walker.walk(dir.path());
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_node_modules_always_ignored() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        fs::write(dir.path().join("node_modules/pkg/index.js"), "module.exports = {};").unwrap();
        fs::write(dir.path().join("app.js"), "console.log(1);").unwrap();

        let walker = FileWalker::new(Arc::new(Settings::default()));
        let files = walker.walk(dir.path());
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("app.js"));
    }

    #[test]
    fn test_disabled_language_excluded() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.go"), "package main").unwrap();
        fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();

        let mut settings = Settings::default();
        settings.languages.get_mut("go").unwrap().enabled = false;
        let walker = FileWalker::new(Arc::new(settings));
        let files = walker.walk(dir.path());
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("main.rs"));
    }
}
