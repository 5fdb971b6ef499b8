//! Marker-file based project pattern detection (spec.md §6).
//!
//! Trimmed from the teacher's `project_resolver::providers::*` machinery:
//! those providers parse each marker file to build an import-path
//! resolution cache (go.mod module paths, package.json `baseUrl`, …). This
//! crate's resolution engine never resolves an import to a path expression,
//! only to a `FileId` found by other means, so only the marker-presence
//! check is carried over — see DESIGN.md for the drop.

use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectMarker {
    Rust,
    Python,
    Go,
    Java,
    JavaScriptOrTypeScript,
    Php,
    Cocoapods,
}

impl ProjectMarker {
    fn filenames(self) -> &'static [&'static str] {
        match self {
            ProjectMarker::Rust => &["Cargo.toml"],
            ProjectMarker::Python => &["pyproject.toml", "setup.py"],
            ProjectMarker::Go => &["go.mod"],
            ProjectMarker::Java => &["pom.xml", "build.gradle", "build.gradle.kts"],
            ProjectMarker::JavaScriptOrTypeScript => &["package.json"],
            ProjectMarker::Php => &["composer.json"],
            ProjectMarker::Cocoapods => &["Podfile"],
        }
    }

    fn all() -> &'static [ProjectMarker] {
        &[
            ProjectMarker::Rust,
            ProjectMarker::Python,
            ProjectMarker::Go,
            ProjectMarker::Java,
            ProjectMarker::JavaScriptOrTypeScript,
            ProjectMarker::Php,
            ProjectMarker::Cocoapods,
        ]
    }
}

/// Every marker present at `root`. Combinations are expected — a polyglot
/// monorepo may carry `Cargo.toml` and `package.json` side by side.
pub fn detect_markers(root: &Path) -> Vec<ProjectMarker> {
    ProjectMarker::all()
        .iter()
        .copied()
        .filter(|marker| marker.filenames().iter().any(|f| root.join(f).is_file()))
        .collect()
}

/// `vendor/` is a Go or PHP dependency cache, ignored only when one of
/// those ecosystems is present; otherwise it's a user directory.
pub fn should_ignore_vendor(markers: &[ProjectMarker]) -> bool {
    markers.contains(&ProjectMarker::Go) || markers.contains(&ProjectMarker::Php)
}

/// `Pods/` holds CocoaPods-installed dependencies.
pub fn should_ignore_pods(markers: &[ProjectMarker]) -> bool {
    markers.contains(&ProjectMarker::Cocoapods)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_detects_go_module() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("go.mod"), "module example.com/x\n").unwrap();
        let markers = detect_markers(dir.path());
        assert!(markers.contains(&ProjectMarker::Go));
        assert!(should_ignore_vendor(&markers));
        assert!(!should_ignore_pods(&markers));
    }

    #[test]
    fn test_polyglot_root_detects_both_markers() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Cargo.toml"), "[package]\n").unwrap();
        fs::write(dir.path().join("package.json"), "{}").unwrap();
        let markers = detect_markers(dir.path());
        assert!(markers.contains(&ProjectMarker::Rust));
        assert!(markers.contains(&ProjectMarker::JavaScriptOrTypeScript));
        assert!(!should_ignore_vendor(&markers));
    }

    #[test]
    fn test_no_markers_on_empty_root() {
        let dir = TempDir::new().unwrap();
        assert!(detect_markers(dir.path()).is_empty());
    }
}
