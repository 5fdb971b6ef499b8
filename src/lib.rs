//! Polyglot code intelligence index: tree-sitter-driven symbol extraction,
//! cross-file call resolution, and dead-code analysis over seven languages.

pub mod classifier;
pub mod config;
pub mod error;
pub mod indexing;
pub mod io;
pub mod logging;
pub mod mcp;
pub mod parsing;
pub mod relationship;
pub mod resolution;
pub mod storage;
pub mod symbol;
pub mod types;
pub mod utils;

pub use config::Settings;
pub use error::{ErrorContext, IndexError, IndexResult};
pub use indexing::{BuildStats, FileRecord, SimpleIndexer};
pub use parsing::{Language, RustParser};
pub use relationship::{RelationKind, Relationship};
pub use resolution::ResolutionEngine;
pub use storage::DependencyGraph;
pub use symbol::SymbolDef;
pub use types::{CompactString, FileId, Range, SymbolId, SymbolKind};
