//! Layered configuration: defaults, then `.codebase-index/settings.toml`,
//! then environment variables, via `figment`.
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `CI_` and use double
//! underscores to separate nested levels:
//! - `CI_INDEXING__PARALLEL_THREADS=8` sets `indexing.parallel_threads`
//! - `CI_RESOLUTION__TRACE_MAX_DEPTH=10` sets `resolution.trace_max_depth`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Directory name for the project-local config and cache, mirroring the
/// teacher's `.code-intelligence/` convention.
pub fn local_dir_name() -> &'static str {
    ".codebase-index"
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Path to the cache snapshot file, relative to the project root.
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,

    #[serde(default)]
    pub indexing: IndexingConfig,

    #[serde(default)]
    pub resolution: ResolutionConfig,

    #[serde(default)]
    pub languages: HashMap<String, LanguageConfig>,

    #[serde(default)]
    pub mcp: McpConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexingConfig {
    #[serde(default = "default_parallel_threads")]
    pub parallel_threads: usize,

    /// Extra user ignore patterns, layered on top of the always-ignored
    /// and conditionally-ignored (`vendor/`, `Pods/`) directories.
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    #[serde(default = "default_true")]
    pub include_tests: bool,

    #[serde(default = "default_false")]
    pub include_docs: bool,

    /// Root the index is bound to; set by the CLI at startup, not read
    /// from a config file.
    #[serde(skip)]
    pub project_root: Option<PathBuf>,
}

/// Bounds used by the resolution engine's derived queries (spec.md §4.C).
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ResolutionConfig {
    #[serde(default = "default_trace_max_depth")]
    pub trace_max_depth: usize,

    #[serde(default = "default_impact_max_depth")]
    pub impact_max_depth: usize,

    #[serde(default = "default_true")]
    pub include_methods_in_callers: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LanguageConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub extensions: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct McpConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_max_context_size")]
    pub max_context_size: usize,
}

/// Logging configuration consumed by [`crate::logging::init_with_config`].
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub default: String,

    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_version() -> u32 {
    1
}
fn default_cache_path() -> PathBuf {
    PathBuf::from(".codebase-index/cache.json")
}
fn default_parallel_threads() -> usize {
    num_cpus::get()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_max_context_size() -> usize {
    100_000
}
fn default_trace_max_depth() -> usize {
    10
}
fn default_impact_max_depth() -> usize {
    5
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            cache_path: default_cache_path(),
            indexing: IndexingConfig::default(),
            resolution: ResolutionConfig::default(),
            languages: default_languages(),
            mcp: McpConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            parallel_threads: default_parallel_threads(),
            ignore_patterns: Vec::new(),
            include_tests: true,
            include_docs: false,
            project_root: None,
        }
    }
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            trace_max_depth: default_trace_max_depth(),
            impact_max_depth: default_impact_max_depth(),
            include_methods_in_callers: true,
        }
    }
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_context_size: default_max_context_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

/// The seven supported languages, all enabled by default — disabling one
/// is an opt-out, not an opt-in, matching the teacher's "Rust enabled,
/// others opt-in" stance inverted because this crate is polyglot-first.
fn default_languages() -> HashMap<String, LanguageConfig> {
    let mut langs = HashMap::new();
    let table: &[(&str, &[&str])] = &[
        ("rust", &["rs"]),
        ("python", &["py", "pyi"]),
        ("javascript", &["js", "jsx", "mjs", "cjs"]),
        ("typescript", &["ts", "tsx", "mts", "cts"]),
        ("go", &["go"]),
        ("java", &["java"]),
        ("csharp", &["cs"]),
    ];
    for (name, exts) in table {
        langs.insert(
            name.to_string(),
            LanguageConfig {
                enabled: true,
                extensions: exts.iter().map(|s| s.to_string()).collect(),
            },
        );
    }
    langs
}

impl Settings {
    /// Load configuration from all sources, searching upward from the
    /// current directory for a `.codebase-index/settings.toml`.
    pub fn load() -> Result<Self, figment::Error> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(".codebase-index/settings.toml"));
        Self::build_figment(config_path).extract()
    }

    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, figment::Error> {
        Self::build_figment(path.as_ref().to_path_buf()).extract()
    }

    fn build_figment(config_path: PathBuf) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("CI_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
    }

    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(local_dir_name());
            if config_dir.is_dir() {
                return Some(config_dir.join("settings.toml"));
            }
        }
        None
    }

    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        for ancestor in current.ancestors() {
            if ancestor.join(local_dir_name()).is_dir() {
                return Some(ancestor.to_path_buf());
            }
        }
        None
    }

    /// Atomically write this configuration to `path` (temp file + rename).
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<(), Box<dyn std::error::Error>> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_string = toml::to_string_pretty(self)?;
        let tmp_path = path.with_extension("toml.tmp");
        std::fs::write(&tmp_path, toml_string)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = PathBuf::from(local_dir_name()).join("settings.toml");
        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }
        Settings::default().save(&config_path)?;
        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings_enables_all_seven_languages() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        for lang in ["rust", "python", "javascript", "typescript", "go", "java", "csharp"] {
            assert!(settings.languages.contains_key(lang), "missing {lang}");
            assert!(settings.languages[lang].enabled);
        }
    }

    #[test]
    fn test_load_from_toml_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");
        let toml_content = r#"
version = 2

[indexing]
parallel_threads = 4
include_tests = false

[resolution]
trace_max_depth = 3

[languages.go]
enabled = false
"#;
        fs::write(&config_path, toml_content).unwrap();
        let settings = Settings::load_from(&config_path).unwrap();

        assert_eq!(settings.version, 2);
        assert_eq!(settings.indexing.parallel_threads, 4);
        assert!(!settings.indexing.include_tests);
        assert_eq!(settings.resolution.trace_max_depth, 3);
        assert!(!settings.languages["go"].enabled);
        // untouched defaults survive layering
        assert_eq!(settings.resolution.impact_max_depth, 5);
    }

    #[test]
    fn test_save_and_reload_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let mut settings = Settings::default();
        settings.indexing.parallel_threads = 2;
        settings.mcp.max_context_size = 42;
        settings.save(&config_path).unwrap();

        let loaded = Settings::load_from(&config_path).unwrap();
        assert_eq!(loaded.indexing.parallel_threads, 2);
        assert_eq!(loaded.mcp.max_context_size, 42);
    }

    #[test]
    fn test_env_var_overrides_file() {
        let temp_dir = TempDir::new().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let config_dir = temp_dir.path().join(".codebase-index");
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(
            config_dir.join("settings.toml"),
            "[resolution]\ntrace_max_depth = 7\n",
        )
        .unwrap();

        unsafe {
            std::env::set_var("CI_RESOLUTION__TRACE_MAX_DEPTH", "20");
        }

        let settings = Settings::load().unwrap();
        assert_eq!(settings.resolution.trace_max_depth, 20);

        unsafe {
            std::env::remove_var("CI_RESOLUTION__TRACE_MAX_DEPTH");
        }
        std::env::set_current_dir(original_dir).unwrap();
    }
}
