//! CLI entry point (spec.md §6): `<path> <command> [args]`, with `--json`
//! routing every command's answer through [`codebase_index::io::envelope::Envelope`].
//!
//! Grounded on the teacher's `main.rs` dispatch shape (parse, load config,
//! build/load the index, match on the subcommand) generalized from the
//! teacher's single-language Tantivy-backed index to this crate's
//! multi-table [`SimpleIndexer`] and [`ResolutionEngine`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use codebase_index::config::Settings;
use codebase_index::error::IndexError;
use codebase_index::io::envelope::{Envelope, EntityType, ResultCode};
use codebase_index::resolution::{GraphDirection, ResolutionEngine};
use codebase_index::types::FileId;
use codebase_index::{logging, SimpleIndexer};

#[derive(Parser)]
#[command(name = "codebase-index")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Polyglot code intelligence index over tree-sitter ASTs")]
struct Cli {
    /// Project root to index and query
    path: PathBuf,

    #[command(subcommand)]
    command: Commands,

    /// Emit a structured JSON envelope instead of human-readable text
    #[arg(long, global = true)]
    json: bool,
}

/// Shared file/result scoping flags (spec.md §6), flattened into every
/// command whose answer is a list of file-tagged items.
#[derive(Args, Clone, Default)]
struct ScopeFilters {
    /// Only include results whose file path contains this pattern
    #[arg(long = "file")]
    file: Option<String>,

    /// Only search within this subdirectory
    #[arg(long = "in")]
    in_dir: Option<String>,

    /// Exclude results whose file path contains this pattern
    #[arg(long)]
    exclude: Option<String>,

    /// Cap the number of results returned
    #[arg(long)]
    top: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or refresh the on-disk index
    Index {
        /// Clear the cache and reparse every file
        #[arg(long)]
        force: bool,
    },

    /// Find definitions by name
    Find {
        name: String,
        /// Require an exact name match instead of substring
        #[arg(long)]
        exact: bool,
        /// Include full type signature fields in the output
        #[arg(long = "with-types")]
        with_types: bool,
        #[command(flatten)]
        scope: ScopeFilters,
    },

    /// Raw, builtin-filtered call sites naming `name`
    Usages {
        name: String,
        /// No-op: usages are always drawn from call-expression AST nodes,
        /// never from comment or string text
        #[arg(long = "code-only")]
        code_only: bool,
        #[command(flatten)]
        scope: ScopeFilters,
    },

    /// Callers/callees for a function, or the method roster for a type
    Context {
        name: String,
        /// Also include one extra hop of transitive callees
        #[arg(long)]
        expand: bool,
    },

    /// Bounded call tree starting at `name`
    Trace {
        name: String,
        #[arg(long, default_value_t = 3)]
        depth: i64,
    },

    /// Reverse-reachable callers within the configured depth
    Impact { name: String },

    /// Definition plus its direct dependencies
    Smart { name: String },

    /// Definitions mentioned nowhere in the index
    Deadcode {
        /// Fold exported-only symbols into the dead-code candidate set too
        #[arg(long = "include-tests")]
        include_tests: bool,
        #[command(flatten)]
        scope: ScopeFilters,
    },

    /// Compare apparent call-site argument counts against declared params
    Verify { name: String },

    /// Bounded import-reachability tree for a file
    Graph {
        file: String,
        /// Walk incoming edges (files that import this one) instead of outgoing
        #[arg(long)]
        dependents: bool,
        #[arg(long, default_value_t = 3)]
        depth: i64,
    },

    /// Every import edge originating in a file
    Imports { file: String },

    /// Files whose imports resolve to a file
    Exporters { file: String },

    /// Every export recorded for a file
    Exports { file: String },

    /// Test functions whose body references `name`
    Tests { name: String },

    /// Type-like definitions (class/struct/interface/trait/enum/alias)
    Typedef { name: String },

    /// The first definition by name, flagged if ambiguous
    Resolve { name: String },

    /// Match stack-trace frames (read from stdin) back to indexed files
    Stacktrace,

    /// Run the JSON-RPC/MCP server over stdio (spec.md §6)
    Serve,
}

fn load_settings(root: &Path) -> Arc<Settings> {
    let config_path = root.join(codebase_index::config::local_dir_name()).join("settings.toml");
    let settings = if config_path.is_file() {
        Settings::load_from(&config_path).unwrap_or_else(|e| {
            eprintln!("Configuration error: {e}, using defaults");
            Settings::default()
        })
    } else {
        Settings::default()
    };
    Arc::new(settings)
}

fn open_index(root: &Path, force: bool) -> Result<SimpleIndexer, IndexError> {
    let settings = load_settings(root);
    let mut indexer = SimpleIndexer::new(root, settings);
    indexer.build(force)?;
    Ok(indexer)
}

/// Substring file-pattern scoping plus a result cap, applied uniformly to
/// every command whose answer is a list of `(path, item)` pairs.
fn apply_scope<T>(mut items: Vec<(String, T)>, scope: &ScopeFilters) -> Vec<T> {
    if let Some(pat) = &scope.file {
        items.retain(|(path, _)| path.contains(pat.as_str()));
    }
    if let Some(dir) = &scope.in_dir {
        items.retain(|(path, _)| path.starts_with(dir.as_str()));
    }
    if let Some(pat) = &scope.exclude {
        items.retain(|(path, _)| !path.contains(pat.as_str()));
    }
    if let Some(top) = scope.top {
        items.truncate(top);
    }
    items.into_iter().map(|(_, item)| item).collect()
}

/// Sets `meta.count` from the payload's length; every list-shaped command
/// goes through this so `--json` consumers never have to count `data` themselves.
fn counted<T>(envelope: Envelope<Vec<T>>) -> Envelope<Vec<T>> {
    let count = envelope.data.as_ref().map(Vec::len).unwrap_or(0);
    envelope.with_count(count)
}

fn emit<T: serde::Serialize>(json: bool, envelope: Envelope<T>, human: impl FnOnce(&T)) -> ! {
    if json {
        match envelope.to_json() {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("failed to serialize JSON envelope: {e}"),
        }
    } else {
        println!("{}", envelope.message);
        if let Some(data) = &envelope.data {
            human(data);
        }
        if let Some(hint) = &envelope.hint {
            println!("hint: {hint}");
        }
    }
    std::process::exit(envelope.exit_code as i32);
}

fn emit_empty(json: bool, envelope: Envelope<()>) -> ! {
    if json {
        match envelope.to_json() {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("failed to serialize JSON envelope: {e}"),
        }
    } else {
        println!("{}", envelope.message);
    }
    std::process::exit(envelope.exit_code as i32);
}

fn not_found(json: bool, what: &str, name: &str) -> ! {
    let envelope: Envelope<()> = Envelope::not_found(format!("{what} '{name}' not found"));
    emit_empty(json, envelope);
}

fn file_id_or_exit(json: bool, idx: &SimpleIndexer, relative_path: &str) -> FileId {
    match idx.file_by_relative_path(relative_path) {
        Some(record) => record.id,
        None => not_found(json, "file", relative_path),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let root = cli.path.canonicalize().unwrap_or(cli.path.clone());
    let settings = load_settings(&root);
    logging::init_with_config(&settings.logging);
    let json = cli.json;

    if let Commands::Index { force } = &cli.command {
        match open_index(&root, *force) {
            Ok(idx) => {
                let envelope = Envelope::success(serde_json::json!({
                    "files": idx.files().count(),
                    "symbols": idx.all_defs().count(),
                }))
                .with_message(format!("Indexed {} files", idx.files().count()));
                emit(json, envelope, |data| println!("{data:#}"));
            }
            Err(e) => {
                let envelope: Envelope<()> = Envelope::error(ResultCode::IndexError, e.to_string());
                emit_empty(json, envelope);
            }
        }
    }

    if let Commands::Serve = &cli.command {
        let idx = match open_index(&root, false) {
            Ok(idx) => idx,
            Err(e) => {
                let envelope: Envelope<()> = Envelope::error(ResultCode::IndexError, e.to_string());
                emit_empty(json, envelope);
            }
        };
        if let Err(e) = codebase_index::mcp::serve_stdio(idx).await {
            eprintln!("MCP server error: {e}");
            std::process::exit(1);
        }
        return;
    }

    let idx = match open_index(&root, false) {
        Ok(idx) => idx,
        Err(e) => {
            let envelope: Envelope<()> = Envelope::error(ResultCode::IndexError, e.to_string());
            emit_empty(json, envelope);
        }
    };
    let engine = ResolutionEngine::new(&idx, &idx.settings().resolution);

    match cli.command {
        Commands::Index { .. } => unreachable!("handled above"),

        Commands::Find { name, exact, with_types, scope } => {
            let defs: Vec<_> = idx
                .all_defs()
                .filter(|d| if exact { d.name.as_ref() == name } else { d.name.as_ref().contains(&name) })
                .cloned()
                .collect();
            if defs.is_empty() {
                not_found(json, "symbol", &name);
            }
            let tagged: Vec<_> = defs.into_iter().map(|d| (d.relative_path.to_string(), d)).collect();
            let results = apply_scope(tagged, &scope);
            let envelope = counted(Envelope::success(results).with_entity_type(EntityType::Symbol).with_query(name));
            emit(json, envelope, |data| {
                for d in data {
                    if with_types {
                        println!(
                            "{:?} {} {}:{} ({}) -> {}",
                            d.kind,
                            d.name,
                            d.relative_path,
                            d.range.start_line,
                            d.params,
                            d.return_type.as_deref().unwrap_or("?")
                        );
                    } else {
                        println!("{:?} {} {}:{}", d.kind, d.name, d.relative_path, d.range.start_line);
                    }
                }
            });
        }

        Commands::Usages { name, code_only: _, scope } => {
            let sites = engine.usages(&name);
            if sites.is_empty() {
                not_found(json, "usages of", &name);
            }
            let tagged: Vec<_> = sites.into_iter().map(|s| (s.file.clone(), s)).collect();
            let results = apply_scope(tagged, &scope);
            let envelope = counted(Envelope::success(results).with_entity_type(EntityType::Calls).with_query(name));
            emit(json, envelope, |data| {
                for s in data {
                    println!("{}:{}:{}", s.file, s.line, s.column);
                }
            });
        }

        Commands::Context { name, expand } => {
            match engine.context(&name) {
                None => not_found(json, "symbol", &name),
                Some(mut result) => {
                    if expand {
                        if let codebase_index::resolution::ContextResult::Function { callees, .. } = &mut result {
                            let extra: Vec<_> = callees
                                .iter()
                                .flat_map(|c| engine.find_callees(c.id, true).items)
                                .collect();
                            callees.extend(extra);
                        }
                    }
                    let envelope = Envelope::success(result).with_query(name);
                    emit(json, envelope, |data| println!("{data:#?}"));
                }
            }
        }

        Commands::Trace { name, depth } => match engine.trace(&name, depth) {
            None => not_found(json, "symbol", &name),
            Some(tree) => {
                let envelope = Envelope::success(tree)
                    .with_entity_type(EntityType::CallTree)
                    .with_query(name)
                    .with_depth(depth.max(0) as u32);
                emit(json, envelope, |data| println!("{data:#?}"));
            }
        },

        Commands::Impact { name } => match engine.impact(&name) {
            None => not_found(json, "symbol", &name),
            Some(result) => {
                let truncated = result.truncated;
                let envelope = Envelope::success(result).with_entity_type(EntityType::ImpactGraph).with_query(name).with_truncated(truncated);
                emit(json, envelope, |data| println!("{data:#?}"));
            }
        },

        Commands::Smart { name } => match engine.smart(&name) {
            None => not_found(json, "symbol", &name),
            Some(result) => {
                let envelope = Envelope::success(result).with_query(name);
                emit(json, envelope, |data| println!("{data:#?}"));
            }
        },

        Commands::Deadcode { include_tests, scope } => {
            let dead = engine.deadcode(include_tests);
            let tagged: Vec<_> = dead.into_iter().map(|d| (d.relative_path.to_string(), d)).collect();
            let results = apply_scope(tagged, &scope);
            let envelope = counted(Envelope::success(results).with_entity_type(EntityType::Symbol));
            emit(json, envelope, |data| {
                for d in data {
                    println!("{} {}:{}", d.name, d.relative_path, d.range.start_line);
                }
            });
        }

        Commands::Verify { name } => {
            let issues = engine.verify(&name);
            let mismatches = issues.iter().filter(|i| i.mismatch).count();
            let envelope = counted(Envelope::success(issues).with_query(name));
            emit(json, envelope, move |data| {
                for i in data {
                    let tag = if i.mismatch { "MISMATCH" } else if i.uncertain { "uncertain" } else { "ok" };
                    println!("{} {}:{} declared={} apparent={:?}", tag, i.caller_file, i.line, i.declared_params, i.apparent_args);
                }
                println!("{mismatches} mismatch(es)");
            });
        }

        Commands::Graph { file, dependents, depth } => {
            let file_id = file_id_or_exit(json, &idx, &file);
            let direction = if dependents { GraphDirection::Dependents } else { GraphDirection::Dependencies };
            match engine.graph(file_id, direction, depth) {
                None => not_found(json, "file", &file),
                Some(node) => {
                    let envelope = Envelope::success(node).with_depth(depth.max(0) as u32);
                    emit(json, envelope, |data| println!("{data:#?}"));
                }
            }
        }

        Commands::Imports { file } => {
            let file_id = file_id_or_exit(json, &idx, &file);
            let edges: Vec<_> = engine.imports(file_id).into_iter().cloned().collect();
            let envelope = counted(Envelope::success(edges));
            emit(json, envelope, |data| {
                for e in data {
                    println!("{} -> {:?}", e.module, e.imported_names);
                }
            });
        }

        Commands::Exporters { file } => {
            let file_id = file_id_or_exit(json, &idx, &file);
            let records: Vec<_> = engine.exporters(file_id).into_iter().map(|f| f.relative_path.to_string()).collect();
            let envelope = counted(Envelope::success(records));
            emit(json, envelope, |data| {
                for r in data {
                    println!("{r}");
                }
            });
        }

        Commands::Exports { file } => {
            let file_id = file_id_or_exit(json, &idx, &file);
            let records: Vec<_> = engine.file_exports(file_id).into_iter().cloned().collect();
            let envelope = counted(Envelope::success(records));
            emit(json, envelope, |data| {
                for e in data {
                    println!("{}", e.exported_name);
                }
            });
        }

        Commands::Tests { name } => {
            let defs = engine.tests(&name);
            let envelope = counted(Envelope::success(defs).with_query(name));
            emit(json, envelope, |data| {
                for d in data {
                    println!("{} {}:{}", d.name, d.relative_path, d.range.start_line);
                }
            });
        }

        Commands::Typedef { name } => {
            let defs = engine.typedef(&name);
            if defs.is_empty() {
                not_found(json, "type", &name);
            }
            let envelope = counted(Envelope::success(defs).with_query(name));
            emit(json, envelope, |data| {
                for d in data {
                    println!("{:?} {} {}:{}", d.kind, d.name, d.relative_path, d.range.start_line);
                }
            });
        }

        Commands::Resolve { name } => match engine.resolve_symbol(&name) {
            None => not_found(json, "symbol", &name),
            Some(resolved) => {
                let envelope = Envelope::success(resolved).with_query(name);
                emit(json, envelope, |data| println!("{data:#?}"));
            }
        },

        Commands::Stacktrace => {
            use std::io::Read;
            let mut text = String::new();
            if std::io::stdin().read_to_string(&mut text).is_err() {
                let envelope: Envelope<()> = Envelope::error(ResultCode::InvalidQuery, "failed to read stdin");
                emit_empty(json, envelope);
            }
            let frames = engine.stacktrace(&text);
            let envelope = counted(Envelope::success(frames));
            emit(json, envelope, |data| {
                for f in data {
                    println!("{} -> {:?}:{:?}", f.raw, f.file, f.line);
                }
            });
        }

        Commands::Serve => unreachable!("handled above"),
    }
}

#[cfg(test)]
mod tests {
    use super::Cli;
    use clap::CommandFactory;

    #[test]
    fn cli_surface_is_well_formed() {
        Cli::command().debug_assert();
    }
}
