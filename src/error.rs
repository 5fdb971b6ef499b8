//! The index's error taxonomy (spec.md §7), trimmed from the teacher's
//! Tantivy/bincode-coupled `IndexError` down to the variants this crate's
//! storage and resolution layers actually produce.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {file}: {reason}")]
    ParseError { file: PathBuf, reason: String },

    #[error("Unsupported file type: {extension}")]
    UnsupportedFileType { extension: String },

    #[error("Failed to persist index: {reason}")]
    PersistenceError { reason: String },

    #[error("Failed to load index: {reason}")]
    LoadError { reason: String },

    #[error("Symbol not found: {name}")]
    SymbolNotFound { name: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Configuration error: {reason}")]
    ConfigError { reason: String },

    #[error("Index corrupted: {reason}")]
    IndexCorrupted { reason: String },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("{0}")]
    General(String),
}

impl IndexError {
    /// Recovery hints surfaced by the CLI/MCP error envelope. Matches the
    /// teacher's `recovery_suggestions` convention of returning terse,
    /// actionable advice rather than re-stating the error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::IndexCorrupted { .. } => vec![
                "Run with --force to rebuild the index from scratch",
                "Check for disk errors or filesystem corruption",
            ],
            Self::LoadError { .. } | Self::PersistenceError { .. } => vec![
                "The index will be rebuilt on next run",
                "Run with --force if the problem persists",
            ],
            Self::FileRead { .. } => vec![
                "Check that the file exists and you have read permissions",
            ],
            Self::UnsupportedFileType { .. } => vec![
                "Check that the file's language is enabled in settings.toml",
            ],
            Self::InvalidInput { .. } => vec!["Check the command's argument types and ranges"],
            _ => vec![],
        }
    }
}

pub type IndexResult<T> = Result<T, IndexError>;

/// Adds context to a foreign error on its way into `IndexError`.
pub trait ErrorContext<T> {
    fn context(self, msg: &str) -> Result<T, IndexError>;
    fn with_path(self, path: &std::path::Path) -> Result<T, IndexError>;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, msg: &str) -> Result<T, IndexError> {
        self.map_err(|e| IndexError::General(format!("{msg}: {e}")))
    }

    fn with_path(self, path: &std::path::Path) -> Result<T, IndexError> {
        self.map_err(|e| IndexError::General(format!("Error processing '{}': {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_corrupted_has_rebuild_suggestion() {
        let err = IndexError::IndexCorrupted {
            reason: "bad header".into(),
        };
        assert!(err.recovery_suggestions().iter().any(|s| s.contains("--force")));
    }

    #[test]
    fn test_symbol_not_found_has_no_suggestions() {
        let err = IndexError::SymbolNotFound { name: "foo".into() };
        assert!(err.recovery_suggestions().is_empty());
    }

    #[test]
    fn test_error_context_wraps_foreign_error() {
        let result: Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        let wrapped = result.context("loading cache");
        assert!(matches!(wrapped, Err(IndexError::General(msg)) if msg.contains("loading cache")));
    }
}
